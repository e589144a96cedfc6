//! Pexels image-search provider
//!
//! API Flow:
//! 1. Search: /v1/search?query=..&per_page=..&orientation=landscape → photo list
//! 2. Download: GET photo.src.large → image bytes

use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::providers::{ImageSearchProvider, PhotoResult},
};

const SERVICE_NAME: &str = "Pexels";
const ORIENTATION: &str = "landscape";

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    photographer: Option<String>,
    src: PexelsPhotoSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsPhotoSrc {
    large: String,
}

impl From<PexelsPhoto> for PhotoResult {
    fn from(photo: PexelsPhoto) -> Self {
        PhotoResult {
            id: photo.id,
            image_url: photo.src.large,
            page_url: photo.url,
            photographer: photo.photographer,
        }
    }
}

#[derive(Clone)]
pub struct PexelsProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl PexelsProvider {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: config.pexels_api_key.clone(),
            api_url: config.pexels_api_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Maps a failed Pexels response to an error kind
///
/// Throttling, timeouts and 5xx stay retryable. Any other 4xx is permanent:
/// a dead photo link is `NotFound`, a rejected query is `InvalidInput`.
fn status_error(status: StatusCode, body: String) -> AppError {
    match AppError::from_status(SERVICE_NAME, status, body) {
        AppError::AiService(message) if status == StatusCode::NOT_FOUND => {
            AppError::NotFound(message)
        }
        AppError::AiService(message) => AppError::InvalidInput(message),
        other => other,
    }
}

async fn check_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

#[async_trait::async_trait]
impl ImageSearchProvider for PexelsProvider {
    async fn verify(&self) -> AppResult<()> {
        self.search("interior", 1).await.map(|_| ())?;
        tracing::info!(provider = SERVICE_NAME, "API key validated");
        Ok(())
    }

    async fn search(&self, query: &str, per_page: usize) -> AppResult<Vec<PhotoResult>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/v1/search", self.api_url);
        let per_page = per_page.to_string();
        let response = self
            .http_client
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", ORIENTATION),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let results: PexelsSearchResponse = response.json().await?;

        tracing::info!(
            query = %query,
            total_results = results.total_results,
            returned = results.photos.len(),
            provider = SERVICE_NAME,
            "Image search completed"
        );

        Ok(results.photos.into_iter().map(PhotoResult::from).collect())
    }

    async fn download(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;

        tracing::debug!(url = %url, bytes = bytes.len(), "Image downloaded");

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        SERVICE_NAME
    }
}
