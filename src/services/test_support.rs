//! Fixtures shared by unit tests
use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb};

use crate::models::StyleDefinition;
use crate::services::catalog::StyleCatalog;

/// Encodes a blank PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
    let mut out = Cursor::new(Vec::new());
    buffer.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Catalog of `count` styles named "Style 1", "Style 2", ...
pub fn numbered_catalog(count: usize) -> StyleCatalog {
    let styles = (1..=count)
        .map(|i| {
            StyleDefinition::new(
                format!("Style {}", i),
                format!("Description {}", i),
                &["sofa", "lamp"],
            )
        })
        .collect();
    StyleCatalog::new(styles).unwrap()
}
