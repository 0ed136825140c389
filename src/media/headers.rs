//! Browser request signature for hot-link protected CDNs.
//!
//! The source CDN rejects requests that do not look like a desktop browser
//! loading an image cross-site, so every fetch (pre-flight and proxy) carries
//! the same header set.

use crate::config::FetchConfig;
use anyhow::{Context, Result};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, ORIGIN, PRAGMA,
    REFERER, USER_AGENT,
};

pub const IMAGE_ACCEPT: &str = "image/webp,image/apng,image/jpeg,image/png,image/*,*/*;q=0.8";

/// Build the header map attached to every upstream image request.
pub fn browser_headers(config: &FetchConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).context("Invalid FETCH_USER_AGENT")?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("image"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("no-cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("cross-site"),
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(&config.referer).context("Invalid FETCH_REFERER")?,
    );
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(&config.origin).context("Invalid FETCH_ORIGIN")?,
    );

    Ok(headers)
}
