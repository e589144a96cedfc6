//! External service abstractions
//!
//! Two kinds of vendor APIs back the assistant: a stock-photo search used to
//! fill the local style image store, and a multimodal chat model used for
//! recommendations, image curation and catalog generation. Each is a trait so
//! the services above can run against mocks in tests.

use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub mod openai;
pub mod pexels;

pub use openai::OpenAiProvider;
pub use pexels::PexelsProvider;

/// One photo returned by an image search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoResult {
    /// Provider-specific photo ID
    pub id: u64,
    /// Direct link to a large rendition of the image
    pub image_url: String,
    /// Human-facing page of the photo, for attribution
    pub page_url: Option<String>,
    pub photographer: Option<String>,
}

/// Trait for stock-photo search providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageSearchProvider: Send + Sync {
    /// Checks that the configured credentials are accepted
    async fn verify(&self) -> AppResult<()>;

    /// Search for photos matching a free-text query
    async fn search(&self, query: &str, per_page: usize) -> AppResult<Vec<PhotoResult>>;

    /// Fetch the raw bytes of a photo
    async fn download(&self, url: &str) -> AppResult<Vec<u8>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// Piece of a multimodal message
#[derive(Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl std::fmt::Debug for ContentPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentPart::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ContentPart::Image { mime_type, data } => f
                .debug_struct("Image")
                .field("mime_type", mime_type)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: ChatRole::User,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentPart::Text(text.into())])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn image_count(&self) -> usize {
        self.content
            .iter()
            .filter(|part| matches!(part, ContentPart::Image { .. }))
            .count()
    }
}

/// A single chat-completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Ask the model for a JSON object instead of free text
    pub json_response: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature: None,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Trait for multimodal chat models
///
/// Implementations send one request and return the text of the first choice.
/// They never retry; callers decide what a failure means.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> AppResult<String>;

    /// Model name for logging and debugging
    fn name(&self) -> String;
}
