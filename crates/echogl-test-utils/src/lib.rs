//! EchoGL Test Utilities
//!
//! Shared fixtures for the workspace's integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use echogl_test_utils::{StubResponse, StubServer, jpeg_bytes};
//!
//! #[tokio::test]
//! async fn test_cover_fetch() {
//!     let server = StubServer::start().await.unwrap();
//!     server.get("/steam/apps/440/header.jpg", StubResponse::jpeg(jpeg_bytes(64, 32)));
//!     // point the client at server.base_url() ...
//!     assert_eq!(server.hits("/steam/apps/440/header.jpg"), 1);
//! }
//! ```

pub mod server;

pub use server::{RecordedRequest, StubResponse, StubServer};

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encode a solid-colour JPEG of the given size
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// Encode a solid-colour PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, format)
        .expect("in-memory image encoding");
    bytes.into_inner()
}
