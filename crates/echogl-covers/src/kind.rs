//! Cover kinds and their fetch policies

use echogl_config::CoverSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which cover image is wanted for a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverKind {
    /// Portrait grid image, resized to a fixed size
    Thumbnail,
    /// Wide hero image, kept at native resolution
    Detail,
}

/// Which CDN a candidate is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cdn {
    Primary,
    Legacy,
}

impl CoverKind {
    pub const ALL: [CoverKind; 2] = [CoverKind::Thumbnail, CoverKind::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverKind::Thumbnail => "thumbnail",
            CoverKind::Detail => "detail",
        }
    }

    /// Remote assets to try, in order
    fn sources(&self) -> &'static [(Cdn, &'static str)] {
        match self {
            CoverKind::Thumbnail => &[
                (Cdn::Primary, "library_600x900.jpg"),
                (Cdn::Primary, "capsule_231x87.jpg"),
            ],
            CoverKind::Detail => &[
                (Cdn::Primary, "library_hero.jpg"),
                (Cdn::Legacy, "header.jpg"),
            ],
        }
    }

    /// Ordered candidate URLs for a Steam app id
    pub fn candidate_urls(&self, app_id: u32, settings: &CoverSettings) -> Vec<String> {
        self.sources()
            .iter()
            .map(|(cdn, asset)| {
                let base = match cdn {
                    Cdn::Primary => &settings.cdn_base,
                    Cdn::Legacy => &settings.legacy_cdn_base,
                };
                format!("{}/steam/apps/{}/{}", base.trim_end_matches('/'), app_id, asset)
            })
            .collect()
    }

    /// Cache filename for a Steam app id
    pub fn file_name(&self, app_id: u32) -> String {
        format!("{}_{}.jpg", app_id, self.as_str())
    }

    /// Target size, or `None` to keep the native resolution
    pub fn resize_to(&self, settings: &CoverSettings) -> Option<(u32, u32)> {
        match self {
            CoverKind::Thumbnail => Some((settings.thumbnail_width, settings.thumbnail_height)),
            CoverKind::Detail => None,
        }
    }
}

impl fmt::Display for CoverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thumbnail" | "thumb" => Ok(CoverKind::Thumbnail),
            "detail" | "hero" => Ok(CoverKind::Detail),
            other => Err(format!("unknown cover kind: {other}")),
        }
    }
}
