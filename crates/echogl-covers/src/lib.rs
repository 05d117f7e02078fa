//! Cover art cache for EchoGL
//!
//! Resolves cover images for installed titles to local files. Steam covers
//! are keyed by app id and kind; catalog covers by a sanitized title.
//!
//! # Policy
//!
//! - A cached file is returned without touching the network
//! - Candidate URLs are tried in order, first success wins
//! - A failed sweep is retried a bounded number of times with a fixed delay
//! - Thumbnails are resized, detail images keep their native resolution
//! - Any failure yields no path; the cache is never left with a partial file

mod cache;
mod kind;
mod retry;

pub use cache::{CoverCache, normalize_remote_url, sanitize_title};
pub use kind::CoverKind;
pub use retry::RetryPolicy;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("No candidate URLs")]
    NoCandidates,

    #[error("Gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(image::ImageError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
