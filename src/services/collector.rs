use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::{
    error::AppResult,
    models::{ImageRef, StyleDefinition},
    services::{
        catalog::StyleCatalog,
        image_store::{image_dimensions, sniff_image, Attribution, ImageStore},
        providers::{ImageSearchProvider, PhotoResult},
    },
};

/// Minimum width and height of a kept photo, in pixels
pub const MIN_IMAGE_SIZE: u32 = 400;
const SEARCH_PAGE_SIZE: usize = 30;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
/// Pause between styles in a full run, to stay under the search rate limit
const DEFAULT_STYLE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of collecting one style
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StyleCollection {
    pub style: String,
    pub images: usize,
    pub downloaded: usize,
    pub error: Option<String>,
}

/// Per-style results of a full collection run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CollectionReport {
    pub styles: Vec<StyleCollection>,
}

impl CollectionReport {
    pub fn total_images(&self) -> usize {
        self.styles.iter().map(|s| s.images).sum()
    }

    pub fn total_downloaded(&self) -> usize {
        self.styles.iter().map(|s| s.downloaded).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &StyleCollection> {
        self.styles.iter().filter(|s| s.error.is_some())
    }
}

/// The three search phrasings tried for each keyword, in order
fn search_queries(keyword: &str, style_name: &str) -> [String; 3] {
    [
        format!("{} {} interior", keyword, style_name),
        format!("{} {} room", style_name, keyword),
        format!("{} interior design {}", keyword, style_name),
    ]
}

fn keyword_slug(keyword: &str) -> String {
    keyword
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Photo ID encoded at the end of a stored file name (`<slug>_<id>.<ext>`)
fn photo_id_of(image: &ImageRef) -> Option<u64> {
    let stem = image.file_name.rsplit_once('.').map_or(image.file_name.as_str(), |(s, _)| s);
    stem.rsplit_once('_')?.1.parse().ok()
}

/// Downloads stock photos for catalog styles into the image store
pub struct ImageCollector {
    provider: Arc<dyn ImageSearchProvider>,
    store: ImageStore,
    max_retries: u32,
    retry_backoff: Duration,
    style_delay: Duration,
}

impl ImageCollector {
    pub fn new(provider: Arc<dyn ImageSearchProvider>, store: ImageStore, max_retries: u32) -> Self {
        Self {
            provider,
            store,
            max_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            style_delay: DEFAULT_STYLE_DELAY,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_style_delay(mut self, delay: Duration) -> Self {
        self.style_delay = delay;
        self
    }

    /// Runs `op`, retrying network failures up to `max_retries` times with linear backoff
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        operation = what,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                result => return result,
            }
        }
    }

    /// Ensures `count` images are cached for a style
    ///
    /// Images already on disk are reused, so a second run for the same style
    /// makes no network calls. Auth failures abort; other per-photo failures
    /// are logged and skipped.
    pub async fn collect_images(
        &self,
        style: &StyleDefinition,
        count: usize,
    ) -> AppResult<Vec<ImageRef>> {
        let mut images = self.store.list_images(&style.name).await?;
        if images.len() >= count {
            tracing::info!(
                style = %style.name,
                cached = images.len(),
                "Reusing cached images"
            );
            return Ok(images);
        }

        if style.keywords.is_empty() {
            tracing::warn!(style = %style.name, "No search keywords for style");
            return Ok(images);
        }

        self.store.ensure_style_dir(style).await?;

        let missing = count - images.len();
        let per_keyword = missing.div_ceil(style.keywords.len());
        let mut known_ids: HashSet<u64> = images.iter().filter_map(photo_id_of).collect();
        let mut downloaded = 0;

        tracing::info!(
            style = %style.name,
            cached = images.len(),
            missing,
            per_keyword,
            "Collecting images"
        );

        for keyword in &style.keywords {
            if downloaded >= missing {
                break;
            }
            let mut keyword_count = 0;

            for query in search_queries(keyword, &style.name) {
                let quota = per_keyword.min(missing - downloaded);
                if keyword_count >= quota {
                    break;
                }

                let mut photos = match self
                    .with_retries("search", || self.provider.search(&query, SEARCH_PAGE_SIZE))
                    .await
                {
                    Ok(photos) => photos,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        tracing::error!(error = %e, query = %query, "Image search failed");
                        continue;
                    }
                };

                if photos.is_empty() {
                    tracing::warn!(query = %query, "No photos found");
                    continue;
                }

                photos.shuffle(&mut rand::thread_rng());

                for photo in photos {
                    if keyword_count >= quota {
                        break;
                    }
                    if !known_ids.insert(photo.id) {
                        continue;
                    }
                    if let Some(image) = self.fetch_photo(style, keyword, &photo).await? {
                        images.push(image);
                        keyword_count += 1;
                        downloaded += 1;
                    }
                }

                // Move on to the next keyword once a phrasing produced something
                if keyword_count > 0 {
                    break;
                }
            }
        }

        if downloaded == 0 {
            tracing::warn!(style = %style.name, "Could not download any images");
        } else {
            tracing::info!(style = %style.name, downloaded, total = images.len(), "Style collected");
        }

        Ok(images)
    }

    /// Downloads and stores one photo; `Ok(None)` when it was unusable
    async fn fetch_photo(
        &self,
        style: &StyleDefinition,
        keyword: &str,
        photo: &PhotoResult,
    ) -> AppResult<Option<ImageRef>> {
        let bytes = match self
            .with_retries("download", || self.provider.download(&photo.image_url))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, url = %photo.image_url, "Image download failed");
                return Ok(None);
            }
        };

        let Some(kind) = sniff_image(&bytes) else {
            tracing::debug!(url = %photo.image_url, "Unsupported image format");
            return Ok(None);
        };

        let (width, height) = match image_dimensions(&bytes) {
            Ok(size) => size,
            Err(e) => {
                tracing::debug!(error = %e, url = %photo.image_url, "Unreadable image");
                return Ok(None);
            }
        };
        if width < MIN_IMAGE_SIZE || height < MIN_IMAGE_SIZE {
            tracing::debug!(width, height, url = %photo.image_url, "Image too small");
            return Ok(None);
        }

        let file_name = format!("{}_{}.{}", keyword_slug(keyword), photo.id, kind.extension);
        let attribution = Attribution {
            photographer: photo
                .photographer
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            source: self.provider.name().to_string(),
            source_id: photo.id,
            page_url: photo.page_url.clone(),
            width,
            height,
        };

        let image = self
            .store
            .save_image(style, &file_name, &bytes, &attribution)
            .await?;
        Ok(Some(image))
    }

    /// Collects every catalog style in turn
    ///
    /// Credentials are checked once up front. A style that fails with a
    /// transient error is recorded in the report and the run continues.
    pub async fn collect_all(&self, catalog: &StyleCatalog, count: usize) -> AppResult<CollectionReport> {
        self.with_retries("verify", || self.provider.verify()).await?;

        let mut report = CollectionReport::default();
        for (index, style) in catalog.list_styles().iter().enumerate() {
            if index > 0 && !self.style_delay.is_zero() {
                tokio::time::sleep(self.style_delay).await;
            }
            tracing::info!(
                style = %style.name,
                progress = format!("{}/{}", index + 1, catalog.len()),
                keywords = %style.keywords.join(", "),
                "Processing style"
            );

            let before = self.store.list_images(&style.name).await?.len();
            match self.collect_images(style, count).await {
                Ok(images) => report.styles.push(StyleCollection {
                    style: style.name.clone(),
                    images: images.len(),
                    downloaded: images.len().saturating_sub(before),
                    error: None,
                }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, style = %style.name, "Style collection failed");
                    report.styles.push(StyleCollection {
                        style: style.name.clone(),
                        images: before,
                        downloaded: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        tracing::info!(
            styles = report.styles.len(),
            images = report.total_images(),
            downloaded = report.total_downloaded(),
            "Collection complete"
        );

        Ok(report)
    }
}
