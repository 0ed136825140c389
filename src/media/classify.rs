//! URL classification and the identifiers derived from image URLs.

use crate::content::ContentRecord;

/// Where an image referenced by a project lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaOrigin {
    /// Third-party CDN outside our control (hot-link protected, unstable).
    ExternalUnmanaged,
    /// Anything else; treated as already canonical.
    ManagedStore,
}

/// Classify an image URL by its host.
///
/// Only absolute URLs whose host contains one of `markers` are external;
/// unparseable or relative values pass through as canonical.
///
/// # Examples
/// ```
/// use portfolio_media::media::{classify, MediaOrigin};
///
/// let markers = vec!["cdninstagram.com".to_string()];
/// assert_eq!(
///     classify("https://scontent.cdninstagram.com/v/a.jpg", &markers),
///     MediaOrigin::ExternalUnmanaged
/// );
/// assert_eq!(
///     classify("https://res.cloudinary.com/demo/image/upload/a.jpg", &markers),
///     MediaOrigin::ManagedStore
/// );
/// ```
pub fn classify(url: &str, markers: &[String]) -> MediaOrigin {
    let host = match url::Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return MediaOrigin::ManagedStore,
        },
        Err(_) => return MediaOrigin::ManagedStore,
    };
    if markers
        .iter()
        .any(|m| !m.is_empty() && host.contains(&m.to_ascii_lowercase()))
    {
        MediaOrigin::ExternalUnmanaged
    } else {
        MediaOrigin::ManagedStore
    }
}

pub fn is_external(url: &str, markers: &[String]) -> bool {
    classify(url, markers) == MediaOrigin::ExternalUnmanaged
}

/// Media store id for the image at `index` (zero-based) of `record`.
/// Stable across runs so re-uploads overwrite instead of duplicating.
pub fn public_id_for(record: &ContentRecord, index: usize) -> String {
    format!("{}-image-{}", record.media_key(), index + 1)
}

/// Relative URL of this service's proxy for `url`.
pub fn proxy_url_for(proxy_path: &str, url: &str) -> String {
    format!("{}?url={}", proxy_path, urlencoding::encode(url))
}
