use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("AI service error: {0}")]
    AiService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Parse(err.to_string());
        }
        if let Some(status) = err.status() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return AppError::Auth(err.to_string());
            }
        }
        AppError::Network(err.to_string())
    }
}

impl AppError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Network(_) => "network",
            AppError::Auth(_) => "auth",
            AppError::Parse(_) => "parse",
            AppError::AiService(_) => "ai_service",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Io(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }

    /// Only transient connectivity failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// Errors that need the user to fix their setup before anything else can run
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Auth(_))
    }

    /// Maps a non-success HTTP status from an external API to an error kind.
    ///
    /// Auth failures are fatal, throttling and server errors are transient.
    /// Everything else is reported as a failure of the named service.
    pub fn from_status(service: &str, status: StatusCode, detail: String) -> Self {
        let message = format!("{} returned status {}: {}", service, status, detail);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(message),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                AppError::Network(message)
            }
            s if s.is_server_error() => AppError::Network(message),
            _ => AppError::AiService(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Network(_)
            | AppError::Auth(_)
            | AppError::Parse(_)
            | AppError::AiService(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
