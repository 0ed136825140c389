//! Process configuration, read from the environment (and `.env`) once at startup.

use crate::util::env::{env_flag, env_list, env_opt, env_parse, env_req, init_env};
use anyhow::{Context, Result};

/// Fixed output normalization applied to every rehosted image:
/// 1200x800 fill crop, automatic quality, then automatic delivery format.
pub const DEFAULT_TRANSFORMATION: &str = "w_1200,h_800,c_fill,q_auto/f_auto";

pub const DEFAULT_CDN_MARKERS: &[&str] = &["cdninstagram.com", "instagram.com"];

pub const DEFAULT_PROXY_PATH: &str = "/api/instagram-proxy";

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub media_store: MediaStoreConfig,
    pub fetch: FetchConfig,
    pub migration: MigrationConfig,
    pub throttle: ThrottleConfig,
}

impl Settings {
    /// Build every section from the environment. Only the media store
    /// credentials are mandatory.
    pub fn from_env() -> Result<Self> {
        init_env();
        Ok(Self {
            server: ServerConfig::from_env()?,
            auth: AuthConfig::from_env(),
            media_store: MediaStoreConfig::from_env()?,
            fetch: FetchConfig::from_env(),
            migration: MigrationConfig::from_env(),
            throttle: ThrottleConfig::from_env(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub public_base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_opt("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .trim()
            .parse()
            .context("Invalid API_PORT")?;
        let allowed_origins = env_list(
            "ALLOWED_ORIGINS",
            &["http://localhost:3000", "http://localhost:8080"],
        );
        let public_base_url =
            env_opt("SITE_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        Ok(Self {
            host,
            port,
            allowed_origins,
            public_base_url,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub cookie_name: String,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env_opt("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using the development secret");
            DEV_JWT_SECRET.to_string()
        });
        Self {
            jwt_secret,
            cookie_name: env_opt("SESSION_COOKIE").unwrap_or_else(|| "sb_token".to_string()),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

#[derive(Clone)]
pub struct MediaStoreConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub upload_folder: String,
    pub api_base: String,
    pub transformation: String,
}

impl MediaStoreConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cloud_name: env_req("CLOUDINARY_CLOUD_NAME")?,
            api_key: env_req("CLOUDINARY_API_KEY")?,
            api_secret: env_req("CLOUDINARY_API_SECRET")?,
            upload_folder: env_opt("CLOUDINARY_UPLOAD_FOLDER")
                .unwrap_or_else(|| "saththebuilder".to_string()),
            api_base: env_opt("CLOUDINARY_API_BASE")
                .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
            transformation: DEFAULT_TRANSFORMATION.to_string(),
        })
    }

    /// Presence report, safe to return to an admin or write to logs.
    pub fn presence(&self) -> serde_json::Value {
        serde_json::json!({
            "hasCloudName": !self.cloud_name.is_empty(),
            "hasApiKey": !self.api_key.is_empty(),
            "hasApiSecret": !self.api_secret.is_empty(),
            "uploadFolder": self.upload_folder,
            "cloudName": self.cloud_name,
        })
    }
}

impl std::fmt::Debug for MediaStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStoreConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("upload_folder", &self.upload_folder)
            .field("api_base", &self.api_base)
            .field("transformation", &self.transformation)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            referer: "https://www.instagram.com/".to_string(),
            origin: "https://www.instagram.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            user_agent: env_opt("FETCH_USER_AGENT").unwrap_or(d.user_agent),
            referer: env_opt("FETCH_REFERER").unwrap_or(d.referer),
            origin: env_opt("FETCH_ORIGIN").unwrap_or(d.origin),
            timeout_secs: env_parse("FETCH_TIMEOUT_SECS", d.timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Host fragments identifying external, unmanaged CDNs.
    pub cdn_markers: Vec<String>,
    /// Path of this service's proxy endpoint, used to build fallback URLs.
    pub proxy_path: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            cdn_markers: DEFAULT_CDN_MARKERS.iter().map(|s| s.to_string()).collect(),
            proxy_path: DEFAULT_PROXY_PATH.to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn from_env() -> Self {
        Self {
            cdn_markers: env_list("EXTERNAL_CDN_MARKERS", DEFAULT_CDN_MARKERS),
            proxy_path: DEFAULT_PROXY_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients by `Forwarded`/`X-Forwarded-For` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window_secs: 60,
            trust_forwarded: false,
        }
    }
}

impl ThrottleConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_requests: env_parse("PUBLIC_RATE_LIMIT", d.max_requests),
            window_secs: env_parse("PUBLIC_RATE_WINDOW_SECS", d.window_secs),
            trust_forwarded: env_flag("TRUST_PROXY_HEADERS", d.trust_forwarded),
        }
    }
}
