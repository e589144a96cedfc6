use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A named interior-design aesthetic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleDefinition {
    /// Unique display name (e.g. "Japanese Zen")
    pub name: String,
    /// One or two sentences describing the look
    #[serde(default)]
    pub description: String,
    /// Ordered image-search keywords
    #[serde(rename = "search_keywords", alias = "keywords")]
    pub keywords: Vec<String>,
}

impl StyleDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Directory name of this style inside the image store
    pub fn dir_name(&self) -> String {
        style_dir_name(&self.name)
    }
}

/// "Japanese Zen" -> "japanese_zen"
pub fn style_dir_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

/// A cached style image, relative to the image store root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImageRef {
    /// Name of the style the image illustrates
    pub style: String,
    /// File name inside the style directory
    pub file_name: String,
}

impl ImageRef {
    pub fn new(style: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            file_name: file_name.into(),
        }
    }

    /// Absolute (or root-relative) location on disk
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(style_dir_name(&self.style)).join(&self.file_name)
    }

    /// URL under which the web shell serves the image
    pub fn url(&self) -> String {
        format!("/images/{}/{}", style_dir_name(&self.style), self.file_name)
    }
}

/// Cached images per style name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleImageSet {
    images: HashMap<String, Vec<ImageRef>>,
}

impl StyleImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the images recorded for a style; empty lists are dropped
    pub fn insert(&mut self, style: impl Into<String>, images: Vec<ImageRef>) {
        let style = style.into();
        if images.is_empty() {
            self.images.remove(&style);
        } else {
            self.images.insert(style, images);
        }
    }

    pub fn images_for(&self, style: &str) -> &[ImageRef] {
        self.images.get(style).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, style: &str) -> usize {
        self.images_for(style).len()
    }

    pub fn has_images(&self, style: &str) -> bool {
        self.count(style) > 0
    }

    pub fn total(&self) -> usize {
        self.images.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
