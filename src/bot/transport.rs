// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telegram Bot API client.
//!
//! Handles:
//! - Sending and editing messages with inline keyboards
//! - Answering callback queries
//! - Long-polling for updates

use crate::bot::keyboard::InlineKeyboard;
use crate::bot::Update;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Outbound chat operations.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError>;

    /// Stop the client's spinner on a button, optionally with a toast.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), AppError>;
}

/// Source of inbound updates for the listener.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Updates with `update_id >= offset`, waiting up to the poll timeout.
    async fn fetch_updates(&self, offset: u64) -> Result<Vec<Update>, AppError>;
}

/// Telegram Bot API envelope.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Telegram Bot API client over `reqwest`.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    poll_timeout: Duration,
}

impl TelegramClient {
    const API_BASE: &'static str = "https://api.telegram.org";

    pub fn new(token: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", Self::API_BASE, token),
            request_timeout,
            poll_timeout: Duration::from_secs(30),
        })
    }

    /// Call a Bot API method and return its `result`.
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // Never include the URL: it carries the bot token.
                let e = e.without_url();
                AppError::ExternalTransient(format!("Telegram {} failed: {}", method, e))
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            AppError::ExternalTransient(format!(
                "Telegram {} returned unreadable body (HTTP {}): {}",
                method,
                status,
                e.without_url()
            ))
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => {
                let description = description.unwrap_or_else(|| format!("HTTP {}", status));
                if status.as_u16() == 429 || status.is_server_error() {
                    Err(AppError::ExternalTransient(description))
                } else {
                    Err(AppError::InvalidInput(description))
                }
            }
        }
    }

    /// Send with Markdown first and fall back to plain text when Telegram
    /// cannot parse the entities (exercise names often contain `_`).
    async fn call_with_fallback(&self, method: &str, mut body: Value) -> Result<(), AppError> {
        body["parse_mode"] = json!("Markdown");
        match self.call::<Value>(method, &body, self.request_timeout).await {
            Ok(_) => Ok(()),
            Err(AppError::InvalidInput(description)) if description.contains("parse entities") => {
                tracing::debug!(method, "Markdown rejected, resending as plain text");
                if let Some(object) = body.as_object_mut() {
                    object.remove("parse_mode");
                }
                self.call::<Value>(method, &body, self.request_timeout)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

fn message_body(chat_id: i64, text: &str, keyboard: Option<&InlineKeyboard>) -> Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": text,
        "disable_web_page_preview": true,
    });
    if let Some(keyboard) = keyboard {
        body["reply_markup"] = json!(keyboard);
    }
    body
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.call_with_fallback("sendMessage", message_body(chat_id, text, keyboard))
            .await
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        let mut body = message_body(chat_id, text, keyboard);
        body["message_id"] = json!(message_id);

        match self.call_with_fallback("editMessageText", body).await {
            // Re-rendering an unchanged list is not an error.
            Err(AppError::InvalidInput(description))
                if description.contains("message is not modified") =>
            {
                Ok(())
            }
            other => other,
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), AppError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call::<Value>("answerCallbackQuery", &body, self.request_timeout)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch_updates(&self, offset: u64) -> Result<Vec<Update>, AppError> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        // The HTTP timeout has to outlast the long poll.
        self.call("getUpdates", &body, self.poll_timeout + self.request_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::InlineButton;

    #[test]
    fn test_message_body() {
        let keyboard = InlineKeyboard::new(vec![vec![InlineButton::callback("Go", "get_exercises")]]);
        let body = message_body(42, "hello", Some(&keyboard));
        assert_eq!(body["chat_id"], 42);
        assert_eq!(body["text"], "hello");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "get_exercises"
        );

        let body = message_body(42, "plain", None);
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn test_api_envelope() {
        let ok: ApiResponse<Vec<Update>> =
            serde_json::from_str(r#"{"ok":true,"result":[{"update_id":3}]}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result.unwrap()[0].update_id, 3);

        let err: ApiResponse<Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#,
        )
        .unwrap();
        assert!(!err.ok);
        assert!(err.description.unwrap().contains("parse entities"));
    }
}
