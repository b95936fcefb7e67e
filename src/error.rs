//! Error types for feed operations.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for collaborator requests.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Classification attached to every reported failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    GetUserInfo,
    GetFeed,
    GetFeedNextPage,
    GetReactionsNextPage,
    GetNotificationCounts,
    UploadImage,
    AddActivity,
    DeleteActivity,
    AddReaction,
    DeleteReaction,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::GetUserInfo => "get-user-info",
            RequestKind::GetFeed => "get-feed",
            RequestKind::GetFeedNextPage => "get-feed-next-page",
            RequestKind::GetReactionsNextPage => "get-reactions-next-page",
            RequestKind::GetNotificationCounts => "get-notification-counts",
            RequestKind::UploadImage => "upload-image",
            RequestKind::AddActivity => "add-activity",
            RequestKind::DeleteActivity => "delete-activity",
            RequestKind::AddReaction => "add-reaction",
            RequestKind::DeleteReaction => "delete-reaction",
        }
    }

    /// Generic message used when the error carries no usable API detail.
    pub fn fallback_message(&self, context: &Value) -> String {
        let kind = context.get("kind").and_then(Value::as_str).unwrap_or("");
        let mut suffix = "";
        let what = match self {
            RequestKind::GetUserInfo => " when loading user info".to_string(),
            RequestKind::GetFeed => " when loading the feed".to_string(),
            RequestKind::GetFeedNextPage => " when loading the next page of the feed".to_string(),
            RequestKind::GetNotificationCounts => {
                " when loading your unread notification counts".to_string()
            }
            RequestKind::UploadImage => {
                suffix = " If it is, the image is probably too big";
                " when uploading your image".to_string()
            }
            RequestKind::AddActivity => " when submitting your post".to_string(),
            RequestKind::AddReaction => format!(" when submitting your {}", kind),
            RequestKind::DeleteReaction => format!(" when removing your {}", kind),
            RequestKind::GetReactionsNextPage | RequestKind::DeleteActivity => String::new(),
        };

        format!("Something went wrong{}. Is your internet working?{}", what, suffix)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human readable message for a reported failure.
///
/// API errors in the 4xx and 5xx range carry a server-written detail which is
/// shown verbatim. Everything else falls back to a per-kind message.
pub fn user_message(error: &FeedError, kind: RequestKind, context: &Value) -> String {
    match error {
        FeedError::Api { status, detail } if (400..600).contains(status) && !detail.is_empty() => {
            detail.clone()
        }
        _ => kind.fallback_message(context),
    }
}
