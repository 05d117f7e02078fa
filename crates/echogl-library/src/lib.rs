//! Game library service for EchoGL
//!
//! Discovers installed Steam titles from on-disk manifests, keeps them in a
//! SQLite store, attaches catalog metadata and cover art, and exposes the
//! merged records to a viewer through [`GameLibrary`].

mod database;
mod locator;
mod manifest;
mod scanner;
mod service;

pub use database::{GameRecord, GameStore, MetadataUpdate, UpsertOutcome};
pub use locator::{LibraryLocator, LibraryRoot, parse_reg_query_output};
pub use manifest::{
    GameManifest, ManifestFields, NOT_FOUND, normalize_library_path, parse_library_folders,
    parse_manifest, read_library_folders, read_manifest,
};
pub use scanner::{EnrichReport, ScanOrchestrator, ScanOutcome, ScanPhase, ScanReport};
pub use service::{GameLibrary, LibraryEvent, SystemUrlOpener, UrlOpener, launch_url};

use std::path::PathBuf;
use thiserror::Error;

/// Steam application id
pub type AppId = u32;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Cannot read library root {path}: {source}")]
    Discovery {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Game not found: {0}")]
    GameNotFound(AppId),

    #[error("Catalog authentication failed")]
    Auth,

    #[error("No catalog credentials configured")]
    NoCredentials,

    #[error("Cannot {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: ScanPhase,
    },

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Cover error: {0}")]
    Cover(#[from] echogl_covers::CoverError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] echogl_catalog::CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
