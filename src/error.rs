// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by the bot, the OAuth listener and the
//! storage layer.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Application error type.
///
/// The variants are the error classes callers act on: `NotFound` and
/// `InvalidInput` mean re-render or re-prompt, `ExternalTransient` means
/// "try again later" with state preserved, `ExternalRejected` forces a full
/// reconnection, and `Database`/`Internal` abort the operation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider unavailable: {0}")]
    ExternalTransient(String),

    #[error("Provider rejected credentials: {0}")]
    ExternalRejected(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures that may succeed if the same call is retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ExternalTransient(_))
    }

    /// True when the user has to authorize again from scratch.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, AppError::ExternalRejected(_))
    }

    /// Short, user-facing text for a chat reply.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "That item is no longer available. Here is the current list.",
            AppError::InvalidInput(_) => "Sorry, I couldn't understand that. Please try again.",
            AppError::ExternalTransient(_) => {
                "Google is not responding right now. Please try again later."
            }
            AppError::ExternalRejected(_) => {
                "Your Google Sheets access was revoked. Please use /connect_sheets to connect again."
            }
            AppError::Database(_) | AppError::Internal(_) => {
                "An error occurred. Please try again later."
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, details) = match &self {
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "Link expired",
                "This authorization link is invalid or has already been used. \
                 Go back to the bot and run /connect_sheets again.",
            ),
            AppError::InvalidInput(msg) => {
                tracing::debug!(error = %msg, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    "Invalid request",
                    "The authorization response was incomplete. \
                     Go back to the bot and run /connect_sheets again.",
                )
            }
            AppError::ExternalTransient(msg) => {
                tracing::warn!(error = %msg, "Provider unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "Google is not responding",
                    "Please try connecting again in a few minutes.",
                )
            }
            AppError::ExternalRejected(msg) => {
                tracing::warn!(error = %msg, "Provider rejected authorization");
                (
                    StatusCode::BAD_GATEWAY,
                    "Authorization rejected",
                    "Google rejected the authorization. \
                     Go back to the bot and run /connect_sheets again.",
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "Please try again later.",
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "Please try again later.",
                )
            }
        };

        (status, Html(render_page(title, details))).into_response()
    }
}

/// Render the small static page shown in the user's browser after the
/// OAuth redirect.
pub fn render_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{body}</p></body></html>"
    )
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(AppError::ExternalTransient("timeout".into()).is_retryable());
        assert!(!AppError::ExternalRejected("invalid_grant".into()).is_retryable());
        assert!(AppError::ExternalRejected("invalid_grant".into()).requires_reconnect());
        assert!(!AppError::NotFound("position 3".into()).requires_reconnect());
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::NotFound("state".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::ExternalTransient("timeout".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = AppError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
