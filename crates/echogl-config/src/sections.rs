//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Application data directory (database and cover cache).
    /// Falls back to the per-user data directory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Library discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Additional Steam library directories to scan
    #[serde(default)]
    pub extra_library_dirs: Vec<PathBuf>,

    /// Run the catalog enrichment pass right after a scan
    #[serde(default = "default_true")]
    pub enrich_after_scan: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extra_library_dirs: Vec::new(),
            enrich_after_scan: true,
        }
    }
}

/// Cover cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverSettings {
    /// Primary Steam CDN
    #[serde(default = "default_cdn_base")]
    pub cdn_base: String,

    /// Legacy Steam CDN, used as the last detail candidate
    #[serde(default = "default_legacy_cdn_base")]
    pub legacy_cdn_base: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_cover_timeout")]
    pub timeout_secs: u64,

    /// Total candidate sweeps before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between sweeps in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Thumbnail width in pixels
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    /// Thumbnail height in pixels
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
}

impl CoverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            cdn_base: default_cdn_base(),
            legacy_cdn_base: default_legacy_cdn_base(),
            timeout_secs: default_cover_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
        }
    }
}

/// Catalog (IGDB) settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// OAuth client-credentials endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Catalog API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,

    /// Client id; usually supplied through `TWITCH_CLIENT_ID`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret; usually supplied through `TWITCH_CLIENT_SECRET`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl CatalogSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            api_url: default_api_url(),
            timeout_secs: default_catalog_timeout(),
            client_id: None,
            client_secret: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cdn_base() -> String {
    "https://cdn.akamai.steamstatic.com".to_string()
}

fn default_legacy_cdn_base() -> String {
    "https://steamcdn-a.akamaihd.net".to_string()
}

fn default_cover_timeout() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_thumbnail_width() -> u32 {
    180
}

fn default_thumbnail_height() -> u32 {
    270
}

fn default_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_api_url() -> String {
    "https://api.igdb.com/v4".to_string()
}

fn default_catalog_timeout() -> u64 {
    30
}
