// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth redirect endpoint.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{render_page, AppError, Result};
use crate::services::LinkOutcome;
use crate::AppState;

pub const CALLBACK_PATH: &str = "/auth/google/callback";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(CALLBACK_PATH, get(auth_callback))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - redeem the state, link the user's Google account.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>> {
    let token = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing state parameter".to_string()))?;

    // The user declined on Google's consent screen.
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        // Consume the state so the link cannot be replayed.
        let user_id = state.auth_states.redeem(&token).await?;
        tracing::info!(user_id = ?user_id, "Authorization declined");
        return Ok(Html(render_page(
            "Authorization cancelled",
            "Google Sheets was not connected. You can close this window and use \
             /connect_sheets in the bot to try again.",
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing code parameter".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let outcome = state.connection.complete_authorization(&token, &code).await?;

    let body = match outcome {
        LinkOutcome::SheetCreated { user_id, .. } => {
            tracing::info!(user_id, "OAuth successful, sheet created");
            "Authorization successful! A new workout tracker sheet has been created for you. \
             You can close this window and return to the Telegram bot."
        }
        LinkOutcome::AwaitingResourceId { user_id } => {
            tracing::info!(user_id, "OAuth successful, waiting for sheet ID");
            "Authorization successful! You can close this window and send the ID of your \
             Google Sheet to the Telegram bot."
        }
    };

    Ok(Html(render_page("Google Sheets connected", body)))
}
