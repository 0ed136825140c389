//! Remote image access: classification, browser-signature fetching and
//! rehosting into the managed media store.

pub mod classify;
pub mod fetcher;
pub mod headers;
pub mod rehoster;

pub use classify::{classify, is_external, proxy_url_for, public_id_for, MediaOrigin};
pub use fetcher::{FetchedImage, Fetcher, HttpFetcher, MAX_IMAGE_BYTES};
pub use rehoster::{CloudinaryRehoster, RehostOptions, RehostSource, RehostedAsset, Rehoster};
