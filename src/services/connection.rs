// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sheets connection flow.
//!
//! Orchestrates auth states, the credential lifecycle and sheet creation to
//! turn "user asked to connect" into "user has a usable linked sheet".
//! Conversation state changes go through [`ConversationState::on`], and each
//! step runs under the user's account lock.

use crate::bot::transport::ChatTransport;
use crate::config::SheetProvisioning;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{ConversationState, FlowEvent};
use crate::services::auth_state::AuthStates;
use crate::services::google::{OAuthProvider, SheetsProvider};
use crate::services::locks::UserLocks;
use crate::services::tokens::{credential_from_grant, TokenLifecycle};
use std::sync::Arc;

/// Length of a Google spreadsheet ID.
const SHEET_ID_LEN: usize = 44;
const SHEET_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";

/// Where a user stands in the connection flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    AwaitingAuthorization,
    AwaitingResourceId,
    Linked { resource_id: Option<String> },
}

/// Result of a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Send this URL to the user.
    AuthorizationUrl(String),
    /// Already connected; offer reconnect or change-sheet instead.
    AlreadyLinked { resource_id: Option<String> },
}

/// Result of a redeemed authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    SheetCreated { user_id: u64, sheet_id: String },
    AwaitingResourceId { user_id: u64 },
}

/// One workout log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutEntry {
    pub exercise: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: String,
    pub notes: String,
}

impl WorkoutEntry {
    /// Parse `<exercise words> <sets> <reps> <weight> [notes...]`.
    ///
    /// Exercise names may contain numbers ("Leg Press 45"), so the split is
    /// at the last `<sets> <reps> <weight>` triple whose weight starts with a
    /// digit, or failing that the last triple with any weight.
    pub fn parse(input: &str) -> Option<Self> {
        let words: Vec<&str> = input.split_whitespace().collect();

        let triples: Vec<usize> = (1..words.len().saturating_sub(2))
            .filter(|&i| words[i].parse::<u32>().is_ok() && words[i + 1].parse::<u32>().is_ok())
            .collect();
        let start = triples
            .iter()
            .rev()
            .find(|&&i| words[i + 2].starts_with(|c: char| c.is_ascii_digit()))
            .or_else(|| triples.last())
            .copied()?;

        Some(Self {
            exercise: words[..start].join(" "),
            sets: words[start].parse().ok()?,
            reps: words[start + 1].parse().ok()?,
            weight: words[start + 2].to_string(),
            notes: words[start + 3..].join(" "),
        })
    }

    fn to_row(&self, date: chrono::NaiveDate) -> Vec<String> {
        vec![
            date.format("%Y-%m-%d").to_string(),
            self.exercise.clone(),
            self.sets.to_string(),
            self.reps.to_string(),
            self.weight.clone(),
            self.notes.clone(),
        ]
    }
}

/// Accept a bare spreadsheet ID or a full spreadsheet URL.
pub fn parse_sheet_id(input: &str) -> Option<String> {
    let input = input.trim();
    let candidate = match input.strip_prefix(SHEET_URL_PREFIX) {
        Some(rest) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
        None => input,
    };

    let valid = candidate.len() == SHEET_ID_LEN
        && candidate.starts_with('1')
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    valid.then(|| candidate.to_string())
}

pub fn sheet_url(sheet_id: &str) -> String {
    format!("{}{}", SHEET_URL_PREFIX, sheet_id)
}

/// Connection flow service.
#[derive(Clone)]
pub struct ConnectionFlow {
    store: Arc<dyn Store>,
    auth_states: AuthStates,
    tokens: TokenLifecycle,
    oauth: Arc<dyn OAuthProvider>,
    sheets: Arc<dyn SheetsProvider>,
    transport: Arc<dyn ChatTransport>,
    provisioning: SheetProvisioning,
    locks: UserLocks,
}

impl ConnectionFlow {
    pub fn new(
        store: Arc<dyn Store>,
        auth_states: AuthStates,
        tokens: TokenLifecycle,
        oauth: Arc<dyn OAuthProvider>,
        sheets: Arc<dyn SheetsProvider>,
        transport: Arc<dyn ChatTransport>,
        provisioning: SheetProvisioning,
    ) -> Self {
        Self {
            store,
            auth_states,
            tokens,
            oauth,
            sheets,
            transport,
            provisioning,
            locks: UserLocks::new(),
        }
    }

    pub fn tokens(&self) -> &TokenLifecycle {
        &self.tokens
    }

    pub async fn status(&self, user_id: u64) -> Result<ConnectionStatus, AppError> {
        match self.store.get_conversation_state(user_id).await? {
            ConversationState::AwaitingAuthorization => Ok(ConnectionStatus::AwaitingAuthorization),
            ConversationState::AwaitingResourceId => Ok(ConnectionStatus::AwaitingResourceId),
            ConversationState::Idle => match self.store.get_credential(user_id).await? {
                Some(credential) => Ok(ConnectionStatus::Linked {
                    resource_id: credential.resource_id,
                }),
                None => Ok(ConnectionStatus::Idle),
            },
        }
    }

    /// Begin authorization. Unless `force` is set, a user who is already
    /// linked gets [`StartOutcome::AlreadyLinked`] and nothing changes.
    pub async fn start(&self, user_id: u64, force: bool) -> Result<StartOutcome, AppError> {
        let _guard = self.locks.lock(user_id).await;

        if !force {
            if let Some(credential) = self.store.get_credential(user_id).await? {
                return Ok(StartOutcome::AlreadyLinked {
                    resource_id: credential.resource_id,
                });
            }
        }

        let current = self.store.get_conversation_state(user_id).await?;
        let next = current
            .on(FlowEvent::StartRequested)
            .ok_or_else(|| AppError::InvalidInput("Cannot start authorization now".to_string()))?;

        let token = self.auth_states.issue_state(user_id).await?;
        if let Err(e) = self.store.set_conversation_state(user_id, next).await {
            // Undo the issue so no usable state outlives the failed start.
            if let Err(cleanup) = self.store.take_auth_state(&token).await {
                tracing::error!(user_id, error = %cleanup, "Failed to drop auth state after error");
            }
            return Err(e);
        }

        tracing::info!(user_id, force, "Authorization started");
        Ok(StartOutcome::AuthorizationUrl(
            self.oauth.authorization_url(&token),
        ))
    }

    /// The "Reconnect" button: authorize again even though linked.
    pub async fn reconnect(&self, user_id: u64) -> Result<String, AppError> {
        match self.start(user_id, true).await? {
            StartOutcome::AuthorizationUrl(url) => Ok(url),
            StartOutcome::AlreadyLinked { .. } => Err(AppError::Internal(anyhow::anyhow!(
                "Forced start returned AlreadyLinked"
            ))),
        }
    }

    /// Handle the OAuth redirect.
    ///
    /// Unknown, expired or already used states, and states whose user is no
    /// longer waiting for authorization, fail with `NotFound` before any
    /// credential or conversation state is touched.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<LinkOutcome, AppError> {
        let user_id = self
            .auth_states
            .redeem(state)
            .await?
            .ok_or_else(|| AppError::NotFound("Authorization state".to_string()))?;

        let _guard = self.locks.lock(user_id).await;

        let needs_resource = self.provisioning == SheetProvisioning::Manual;
        let current = self.store.get_conversation_state(user_id).await?;
        let Some(next) = current.on(FlowEvent::Redeemed { needs_resource }) else {
            tracing::warn!(
                user_id,
                state = current.as_str(),
                "Authorization redeemed outside the connection flow"
            );
            return Err(AppError::NotFound("Authorization state".to_string()));
        };

        match self.link(user_id, code, next).await {
            Ok(outcome) => {
                self.notify(user_id, &link_message(&outcome)).await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Authorization failed");
                self.notify(user_id, connect_failure_message(&e)).await;
                Err(e)
            }
        }
    }

    /// Exchange the code, create the sheet if configured, then store the
    /// credential and next state in one write.
    async fn link(
        &self,
        user_id: u64,
        code: &str,
        next: ConversationState,
    ) -> Result<LinkOutcome, AppError> {
        let grant = self.oauth.exchange_code(code).await?;
        let mut credential = credential_from_grant(grant, chrono::Utc::now())?;

        let outcome = match self.provisioning {
            SheetProvisioning::Create => {
                let sheet_id = self
                    .sheets
                    .create_workout_sheet(&credential.access_token)
                    .await?;
                credential.resource_id = Some(sheet_id.clone());
                LinkOutcome::SheetCreated { user_id, sheet_id }
            }
            SheetProvisioning::Manual => LinkOutcome::AwaitingResourceId { user_id },
        };

        self.tokens.link(user_id, &credential, next).await?;
        Ok(outcome)
    }

    /// Free text while waiting for a sheet ID. Invalid input leaves the
    /// state unchanged.
    pub async fn submit_resource_id(&self, user_id: u64, input: &str) -> Result<String, AppError> {
        let _guard = self.locks.lock(user_id).await;

        let current = self.store.get_conversation_state(user_id).await?;
        let next = current
            .on(FlowEvent::ResourceAccepted)
            .ok_or_else(|| AppError::InvalidInput("Not waiting for a sheet ID".to_string()))?;

        let sheet_id = parse_sheet_id(input)
            .ok_or_else(|| AppError::InvalidInput("Malformed sheet ID".to_string()))?;

        self.tokens.set_resource_id(user_id, &sheet_id, next).await?;

        tracing::info!(user_id, "Sheet linked");
        Ok(sheet_id)
    }

    /// The "Change Sheet" button.
    pub async fn change_resource(&self, user_id: u64) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;

        if !self.tokens.exists(user_id).await? {
            return Err(AppError::NotFound(format!("Credential for user {}", user_id)));
        }

        let current = self.store.get_conversation_state(user_id).await?;
        let next = current
            .on(FlowEvent::ChangeResourceRequested)
            .ok_or_else(|| AppError::InvalidInput("Authorization in progress".to_string()))?;

        self.store.set_conversation_state(user_id, next).await
    }

    /// Return to idle and drop any pending authorization links.
    pub async fn cancel(&self, user_id: u64) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;

        let current = self.store.get_conversation_state(user_id).await?;
        let next = current.on(FlowEvent::Cancelled).unwrap_or_default();

        let revoked = self.auth_states.revoke_for_user(user_id).await?;
        self.store.set_conversation_state(user_id, next).await?;

        tracing::info!(user_id, revoked, from = current.as_str(), "Connection flow cancelled");
        Ok(())
    }

    /// Append one row to the linked sheet.
    ///
    /// Runs under the account lock: a rejected token clears the connection,
    /// and that must not land after a reconnect the user started meanwhile.
    pub async fn log_workout(&self, user_id: u64, entry: &WorkoutEntry) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;

        let credential = self.tokens.refresh_if_needed(user_id).await?;
        let sheet_id = credential
            .resource_id
            .ok_or_else(|| AppError::NotFound("Linked sheet".to_string()))?;

        let row = entry.to_row(chrono::Utc::now().date_naive());
        match self
            .sheets
            .append_rows(&credential.access_token, &sheet_id, vec![row])
            .await
        {
            Ok(()) => {
                tracing::info!(user_id, exercise = %entry.exercise, "Workout logged");
                Ok(())
            }
            Err(AppError::ExternalRejected(msg)) => {
                tracing::warn!(user_id, error = %msg, "Sheet access rejected, clearing connection");
                self.tokens.revoke(user_id).await?;
                Err(AppError::ExternalRejected(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort chat notification. Failures are logged only.
    async fn notify(&self, user_id: u64, text: &str) {
        if let Err(e) = self
            .transport
            .send_message(user_id as i64, text, None)
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to notify user");
        }
    }
}

fn link_message(outcome: &LinkOutcome) -> String {
    match outcome {
        LinkOutcome::SheetCreated { sheet_id, .. } => format!(
            "Google Sheets successfully connected! A new workout tracker sheet has been created \
             for you. You can access it here: {}",
            sheet_url(sheet_id)
        ),
        LinkOutcome::AwaitingResourceId { .. } => RESOURCE_ID_PROMPT.to_string(),
    }
}

fn connect_failure_message(error: &AppError) -> &'static str {
    match error {
        AppError::ExternalTransient(_) => {
            "Google is not responding right now. Please try /connect_sheets again in a few minutes."
        }
        _ => "Connecting Google Sheets failed. Please use /connect_sheets to try again.",
    }
}

pub const RESOURCE_ID_PROMPT: &str = "Google Sheets access granted! Now send me the ID of the \
    spreadsheet you want to use (or paste its URL). The ID should be 44 characters long and start \
    with '1'.";
