// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth2 and Google Sheets clients.
//!
//! Handles:
//! - Authorization URL construction
//! - Code exchange and token refresh
//! - Workout sheet creation and formatting
//! - Row appends for workout logging
//!
//! Every call is bounded by the configured provider timeout. Failures are
//! classified for the caller: network errors, timeouts, 429 and 5xx are
//! `ExternalTransient`; `invalid_grant`, 401 and 403 are `ExternalRejected`.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const SHEET_TITLE: &str = "My Workout Tracker";
const TAB_TITLE: &str = "Workout Log";
pub const HEADER_ROW: [&str; 6] = ["Date", "Exercise", "Sets", "Reps", "Weight", "Notes"];

/// Tokens returned by a code exchange or a refresh.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent on most refreshes (Google does not rotate refresh tokens).
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds from now
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("rotated", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// OAuth2 authorization-code flow against the identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the user opens to grant access. `state` comes back on the redirect.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AppError>;
}

/// The spreadsheet calls the bot makes on a user's behalf.
#[async_trait]
pub trait SheetsProvider: Send + Sync {
    /// Create and format a new workout sheet. Returns the spreadsheet ID.
    async fn create_workout_sheet(&self, access_token: &str) -> Result<String, AppError>;

    async fn append_rows(
        &self,
        access_token: &str,
        sheet_id: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), AppError>;
}

/// Google API client over `reqwest`.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl GoogleClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            redirect_url,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(form)
            .send()
            .await
            .map_err(send_error)?;

        check_response_json(response).await
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        body: &impl Serialize,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(send_error)?;

        check_response_json(response).await
    }
}

#[async_trait]
impl OAuthProvider for GoogleClient {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode(SPREADSHEETS_SCOPE),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    #[serde(default)]
    sheets: Vec<CreatedSheet>,
}

#[derive(Deserialize)]
struct CreatedSheet {
    properties: CreatedSheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSheetProperties {
    #[serde(default)]
    sheet_id: i64,
}

#[async_trait]
impl SheetsProvider for GoogleClient {
    async fn create_workout_sheet(&self, access_token: &str) -> Result<String, AppError> {
        let created: CreatedSpreadsheet = self
            .post_json(
                SHEETS_BASE_URL,
                access_token,
                &json!({
                    "properties": { "title": SHEET_TITLE },
                    "sheets": [{ "properties": { "title": TAB_TITLE } }]
                }),
            )
            .await?;

        let tab_id = created
            .sheets
            .first()
            .map(|s| s.properties.sheet_id)
            .unwrap_or(0);

        let url = format!("{}/{}:batchUpdate", SHEETS_BASE_URL, created.spreadsheet_id);
        let _: serde_json::Value = self
            .post_json(&url, access_token, &format_requests(tab_id))
            .await?;

        tracing::info!(sheet_id = %created.spreadsheet_id, "Workout sheet created");
        Ok(created.spreadsheet_id)
    }

    async fn append_rows(
        &self,
        access_token: &str,
        sheet_id: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/{}/values/A1:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            SHEETS_BASE_URL,
            urlencoding::encode(sheet_id)
        );
        let _: serde_json::Value = self
            .post_json(&url, access_token, &json!({ "values": rows }))
            .await?;
        Ok(())
    }
}

/// Header row, bold grey header formatting and column auto-resize.
fn format_requests(tab_id: i64) -> serde_json::Value {
    let header_cells: Vec<serde_json::Value> = HEADER_ROW
        .iter()
        .map(|title| json!({ "userEnteredValue": { "stringValue": title } }))
        .collect();
    let header_range = json!({ "sheetId": tab_id, "startRowIndex": 0, "endRowIndex": 1 });

    json!({
        "requests": [
            {
                "updateCells": {
                    "rows": [{ "values": header_cells }],
                    "fields": "*",
                    "range": header_range
                }
            },
            {
                "repeatCell": {
                    "range": header_range,
                    "cell": {
                        "userEnteredFormat": {
                            "textFormat": { "bold": true },
                            "backgroundColor": { "red": 0.8, "green": 0.8, "blue": 0.8 }
                        }
                    },
                    "fields": "userEnteredFormat(textFormat,backgroundColor)"
                }
            },
            {
                "autoResizeDimensions": {
                    "dimensions": {
                        "sheetId": tab_id,
                        "dimension": "COLUMNS",
                        "startIndex": 0,
                        "endIndex": HEADER_ROW.len()
                    }
                }
            }
        ]
    })
}

fn send_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::ExternalTransient("Google request timed out".to_string())
    } else {
        AppError::ExternalTransient(format!("Google request failed: {}", e))
    }
}

/// Map an unsuccessful status and body to an error class.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> AppError {
    let code = status.as_u16();

    if body.contains("invalid_grant") || code == 401 || code == 403 {
        return AppError::ExternalRejected(format!("HTTP {}", status));
    }

    if code == 404 {
        return AppError::NotFound(format!("Google resource (HTTP {})", status));
    }

    if code == 429 {
        tracing::warn!("Google rate limit hit (429)");
    }

    AppError::ExternalTransient(format!("HTTP {}", status))
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, body = %body, "Google request failed");
        return Err(classify_failure(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::ExternalTransient(format!("JSON parse error: {}", e)))
}
