use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{ImageFormat, ImageReader};
use tokio::fs;

use crate::{
    error::{AppError, AppResult},
    models::{style_dir_name, ImageRef, StyleDefinition, StyleImageSet},
    services::catalog::StyleCatalog,
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
const DESCRIPTION_FILE: &str = "description.txt";

/// Format information sniffed from image bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Detects JPEG, PNG and WebP from magic bytes
pub fn sniff_image(bytes: &[u8]) -> Option<ImageKind> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some(ImageKind {
            mime_type: "image/jpeg",
            extension: "jpg",
        }),
        ImageFormat::Png => Some(ImageKind {
            mime_type: "image/png",
            extension: "png",
        }),
        ImageFormat::WebP => Some(ImageKind {
            mime_type: "image/webp",
            extension: "webp",
        }),
        _ => None,
    }
}

/// Reads width and height from the image header without decoding pixels
pub fn image_dimensions(bytes: &[u8]) -> AppResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| AppError::Parse(format!("Unreadable image: {}", e)))
}

/// Attribution details saved next to each downloaded photo
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub photographer: String,
    pub source: String,
    pub source_id: u64,
    pub page_url: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Attribution {
    fn render(&self) -> String {
        format!(
            "Photo by: {}\nSource: {} (ID: {})\nURL: {}\nSize: {}x{}\nDownloaded: {}\n",
            self.photographer,
            self.source,
            self.source_id,
            self.page_url.as_deref().unwrap_or("Unknown"),
            self.width,
            self.height,
            Utc::now().to_rfc3339(),
        )
    }
}

/// Local directory tree of style images
///
/// Layout: `<root>/styles.json` plus one `<root>/<style_dir>/` per style holding
/// images, their `.txt` attribution files and a `description.txt`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn style_dir(&self, style_name: &str) -> PathBuf {
        self.root.join(style_dir_name(style_name))
    }

    /// Images cached for a style, sorted by file name; empty when the directory is missing
    pub async fn list_images(&self, style_name: &str) -> AppResult<Vec<ImageRef>> {
        let dir = self.style_dir(style_name);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut file_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_image_file(&name) {
                file_names.push(name);
            }
        }
        file_names.sort();

        Ok(file_names
            .into_iter()
            .map(|name| ImageRef::new(style_name, name))
            .collect())
    }

    /// Builds the image set for every catalog style
    pub async fn scan(&self, catalog: &StyleCatalog) -> AppResult<StyleImageSet> {
        let mut set = StyleImageSet::new();
        for style in catalog.list_styles() {
            let images = self.list_images(&style.name).await?;
            if images.is_empty() {
                tracing::debug!(style = %style.name, "No cached images for style");
            }
            set.insert(style.name.clone(), images);
        }

        tracing::debug!(total = set.total(), "Scanned image store");
        Ok(set)
    }

    /// Creates the style directory and its description file if missing
    pub async fn ensure_style_dir(&self, style: &StyleDefinition) -> AppResult<PathBuf> {
        let dir = self.style_dir(&style.name);
        fs::create_dir_all(&dir).await?;

        let description_file = dir.join(DESCRIPTION_FILE);
        if !fs::try_exists(&description_file).await? {
            fs::write(&description_file, describe_style(style)).await?;
            tracing::debug!(style = %style.name, "Wrote style description");
        }

        Ok(dir)
    }

    /// Saves an image and its attribution sidecar
    pub async fn save_image(
        &self,
        style: &StyleDefinition,
        file_name: &str,
        bytes: &[u8],
        attribution: &Attribution,
    ) -> AppResult<ImageRef> {
        let dir = self.ensure_style_dir(style).await?;
        let path = dir.join(file_name);
        fs::write(&path, bytes).await?;
        fs::write(path.with_extension("txt"), attribution.render()).await?;

        Ok(ImageRef::new(style.name.clone(), file_name))
    }

    pub async fn read_image(&self, image: &ImageRef) -> AppResult<Vec<u8>> {
        let path = image.path(&self.root);
        fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("Image {} does not exist", path.display()))
            }
            _ => AppError::Io(e),
        })
    }

    /// Deletes an image and its attribution sidecar, if any
    pub async fn remove_image(&self, image: &ImageRef) -> AppResult<()> {
        let path = image.path(&self.root);
        fs::remove_file(&path).await?;

        let sidecar = path.with_extension("txt");
        if fs::try_exists(&sidecar).await? {
            fs::remove_file(&sidecar).await?;
        }

        tracing::info!(style = %image.style, file = %image.file_name, "Removed image");
        Ok(())
    }
}

fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn describe_style(style: &StyleDefinition) -> String {
    let description = if style.description.is_empty() {
        "No description provided"
    } else {
        style.description.as_str()
    };

    let mut text = format!("Style: {}\n\nDescription: {}\n\n", style.name, description);
    if !style.keywords.is_empty() {
        text.push_str("Keywords:\n");
        for keyword in &style.keywords {
            text.push_str(&format!("- {}\n", keyword));
        }
    }
    text
}
