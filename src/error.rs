//! Error types for the `site_publisher` crate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// All errors that can occur while publishing or serving a site.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The site identifier does not match the DNS-label grammar.
    #[error("invalid site identifier {slug:?}: {reason}")]
    InvalidIdentifier { slug: String, reason: String },

    /// The submitted document is missing or is not a full HTML document.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// The request body could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No pointer exists for the requested site and mode.
    #[error("no published version for {site} ({mode})")]
    PointerMissing { site: String, mode: String },

    /// A pointer was found but its JSON is unreadable or lacks a snapshot URL.
    #[error("pointer at {path} is malformed: {reason}")]
    MalformedPointer { path: String, reason: String },

    /// The pointer references a snapshot that could not be fetched.
    #[error("snapshot {url} is unreachable: {reason}")]
    SnapshotUnreachable { url: String, reason: String },

    /// A storage backend failed to persist content.
    #[error("Storage write failed: {0}")]
    StoreWrite(Box<dyn std::error::Error + Send + Sync>),

    /// A storage backend failed to read or list content.
    #[error("Storage read failed: {0}")]
    StoreRead(Box<dyn std::error::Error + Send + Sync>),

    /// The builder configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),
}

impl PublishError {
    /// HTTP status returned to callers for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidContent(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PointerMissing { .. } => StatusCode::NOT_FOUND,
            Self::MalformedPointer { .. }
            | Self::SnapshotUnreachable { .. }
            | Self::StoreRead(_) => StatusCode::BAD_GATEWAY,
            Self::StoreWrite(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::InvalidContent(_) => "invalid_content",
            Self::BadRequest(_) => "bad_request",
            Self::PointerMissing { .. } => "not_found",
            Self::MalformedPointer { .. } => "malformed_pointer",
            Self::SnapshotUnreachable { .. } => "snapshot_unreachable",
            Self::StoreRead(_) => "upstream_unavailable",
            Self::StoreWrite(_) => "store_write_failed",
            Self::Config(_) => "internal",
        }
    }

    /// Message safe to show to a client.
    ///
    /// Validation messages are returned as-is; anything that may carry store
    /// paths, URLs or backend details is replaced by a generic sentence.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidIdentifier { .. } | Self::InvalidContent(_) | Self::BadRequest(_) => {
                self.to_string()
            }
            Self::PointerMissing { .. } => "site not found".into(),
            Self::MalformedPointer { .. } => "site metadata is invalid".into(),
            Self::SnapshotUnreachable { .. } => "version not available".into(),
            Self::StoreRead(_) => "storage is unavailable".into(),
            Self::StoreWrite(_) => "publish failed".into(),
            Self::Config(_) => "internal error".into(),
        }
    }
}

impl IntoResponse for PublishError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_GATEWAY {
            tracing::warn!("Upstream failure: {self}");
        } else if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::debug!("Rejected request: {self}");
        }
        let body = json!({
            "ok": false,
            "error": self.code(),
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// A type alias for `Result<T, PublishError>`.
pub type Result<T> = std::result::Result<T, PublishError>;
