//! Catalog response types

use serde::{Deserialize, Serialize};

/// OAuth bearer token for catalog queries
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "access_token")]
    value: String,

    /// Lifetime in seconds, as reported by the token endpoint
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_in: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Cover image reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogImage {
    #[serde(default)]
    pub url: Option<String>,
}

/// Genre or platform reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// A catalog game with the fields used for enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogGame {
    pub id: i64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub cover: Option<CatalogImage>,

    #[serde(default)]
    pub genres: Vec<NamedRef>,

    #[serde(default)]
    pub platforms: Vec<NamedRef>,
}

impl CatalogGame {
    /// Genre names joined with `", "`
    pub fn genre_list(&self) -> String {
        join_names(&self.genres)
    }

    /// Platform names joined with `", "`
    pub fn platform_list(&self) -> String {
        join_names(&self.platforms)
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.cover
            .as_ref()
            .and_then(|cover| cover.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

fn join_names(refs: &[NamedRef]) -> String {
    refs.iter()
        .filter_map(|r| r.name.as_deref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The `game` field of an external-game row: expanded, or a bare id when
/// the query did not ask for nested fields
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum GameRef {
    Expanded(CatalogGame),
    #[allow(dead_code)]
    Id(i64),
}

/// Row of the cross-reference table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExternalGame {
    #[serde(default)]
    pub game: Option<GameRef>,
}

impl ExternalGame {
    pub fn into_game(self) -> Option<CatalogGame> {
        match self.game? {
            GameRef::Expanded(game) => Some(game),
            GameRef::Id(_) => None,
        }
    }
}
