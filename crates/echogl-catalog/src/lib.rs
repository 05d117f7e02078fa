//! Game catalog client for EchoGL
//!
//! Two-step lookup against the IGDB API: a client-credentials token exchange,
//! then a cross-reference query by Steam app id with a free-text search as
//! fallback. Lookups never fail loudly; missing data is `None`.

mod client;
mod model;

pub use client::{CatalogClient, external_games_query, search_query};
pub use model::{AccessToken, CatalogGame, CatalogImage, NamedRef};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}
