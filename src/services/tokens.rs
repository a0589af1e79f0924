// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google credential lifecycle: storage, expiry detection and refresh.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{ConversationState, Credential, StoredCredential};
use crate::services::google::{OAuthProvider, TokenGrant};
use crate::services::kms::{decrypt_tokens, encrypt_tokens, KmsService};
use crate::services::locks::UserLocks;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Manages the per-user Google credential.
///
/// This service encapsulates:
/// - Encryption of tokens at rest
/// - Refresh when the access token is expired (with an optional margin)
/// - Per-user locking so concurrent callers trigger at most one refresh
/// - Clearing the connection when Google rejects the refresh token
///
/// Every credential write goes through the per-user credential lock.
/// Clearing the connection also resets ConversationState, so callers that
/// can reach that path hold the connection flow's account lock.
#[derive(Clone)]
pub struct TokenLifecycle {
    store: Arc<dyn Store>,
    kms: KmsService,
    oauth: Arc<dyn OAuthProvider>,
    refresh_margin: Duration,
    locks: UserLocks,
}

impl TokenLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        kms: KmsService,
        oauth: Arc<dyn OAuthProvider>,
        refresh_margin: std::time::Duration,
    ) -> Self {
        Self {
            store,
            kms,
            oauth,
            refresh_margin: Duration::seconds(refresh_margin.as_secs() as i64),
            locks: UserLocks::new(),
        }
    }

    /// Upsert the credential.
    pub async fn store(&self, user_id: u64, credential: &Credential) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;
        let stored = self.seal(user_id, credential).await?;
        self.store.put_credential(user_id, &stored).await
    }

    /// Current credential, or `NotFound`.
    pub async fn get(&self, user_id: u64) -> Result<Credential, AppError> {
        match self.store.get_credential(user_id).await? {
            Some(stored) => self.open(user_id, &stored).await,
            None => Err(AppError::NotFound(format!("Credential for user {}", user_id))),
        }
    }

    /// True when the user has a stored credential.
    pub async fn exists(&self, user_id: u64) -> Result<bool, AppError> {
        Ok(self.store.get_credential(user_id).await?.is_some())
    }

    /// Store the credential and move the conversation to `next_state` in one
    /// atomic write.
    pub async fn link(
        &self,
        user_id: u64,
        credential: &Credential,
        next_state: ConversationState,
    ) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;
        let stored = self.seal(user_id, credential).await?;
        self.store
            .put_credential_and_state(user_id, &stored, next_state)
            .await?;

        tracing::info!(
            user_id,
            state = next_state.as_str(),
            has_resource = credential.resource_id.is_some(),
            "Credential linked"
        );
        Ok(())
    }

    /// Set the linked spreadsheet on the stored credential without touching
    /// the tokens, and move the conversation to `next_state` with it.
    pub async fn set_resource_id(
        &self,
        user_id: u64,
        resource_id: &str,
        next_state: ConversationState,
    ) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;
        let mut stored = self
            .store
            .get_credential(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Credential for user {}", user_id)))?;

        stored.resource_id = Some(resource_id.to_string());
        self.store
            .put_credential_and_state(user_id, &stored, next_state)
            .await
    }

    /// Delete the credential and reset the conversation state together.
    pub async fn revoke(&self, user_id: u64) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;
        self.store.clear_connection(user_id).await
    }

    /// Refresh the access token if it is expired at "now" plus the margin.
    ///
    /// Returns the credential in effect afterwards. When no refresh is due
    /// nothing is written.
    pub async fn refresh_if_needed(&self, user_id: u64) -> Result<Credential, AppError> {
        // Held for the whole exchange. A second caller waits here and then
        // sees the first caller's result on re-read.
        let _guard = self.locks.lock(user_id).await;

        let stored = self
            .store
            .get_credential(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Credential for user {}", user_id)))?;
        let current = self.open(user_id, &stored).await?;

        if !current.is_expired(Utc::now(), self.refresh_margin) {
            return Ok(current);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let grant = match self.oauth.refresh(&current.refresh_token).await {
            Ok(grant) => grant,
            Err(AppError::ExternalRejected(msg)) => {
                tracing::warn!(user_id, error = %msg, "Refresh token rejected, clearing connection");
                self.store.clear_connection(user_id).await?;
                return Err(AppError::ExternalRejected(msg));
            }
            Err(e) => return Err(e),
        };

        let refreshed = apply_grant(&current, grant, Utc::now());
        let sealed = self.seal(user_id, &refreshed).await?;
        self.store.put_credential(user_id, &sealed).await?;

        tracing::info!(user_id, "Access token refreshed");
        Ok(refreshed)
    }

    /// Plaintext access token, refreshed first if needed.
    pub async fn valid_access_token(&self, user_id: u64) -> Result<String, AppError> {
        Ok(self.refresh_if_needed(user_id).await?.access_token)
    }

    async fn seal(&self, user_id: u64, credential: &Credential) -> Result<StoredCredential, AppError> {
        let (access_token_encrypted, refresh_token_encrypted) = encrypt_tokens(
            &self.kms,
            &credential.access_token,
            &credential.refresh_token,
            user_id,
        )
        .await?;

        Ok(StoredCredential {
            access_token_encrypted,
            refresh_token_encrypted,
            token_type: credential.token_type.clone(),
            expires_at: format_utc_rfc3339(credential.expiry),
            resource_id: credential.resource_id.clone(),
        })
    }

    async fn open(&self, user_id: u64, stored: &StoredCredential) -> Result<Credential, AppError> {
        let (access_token, refresh_token) = decrypt_tokens(
            &self.kms,
            &stored.access_token_encrypted,
            &stored.refresh_token_encrypted,
            user_id,
        )
        .await?;

        let expiry = parse_utc_rfc3339(&stored.expires_at).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to parse expiry: {}",
                stored.expires_at
            ))
        })?;

        Ok(Credential {
            access_token,
            refresh_token,
            token_type: stored.token_type.clone(),
            expiry,
            resource_id: stored.resource_id.clone(),
        })
    }
}

/// Build a credential from a fresh code exchange.
pub fn credential_from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Result<Credential, AppError> {
    let refresh_token = grant.refresh_token.ok_or_else(|| {
        AppError::ExternalRejected("Google did not return a refresh token".to_string())
    })?;

    Ok(Credential {
        access_token: grant.access_token,
        refresh_token,
        token_type: grant.token_type,
        expiry: now + Duration::seconds(grant.expires_in),
        resource_id: None,
    })
}

/// Merge a refresh response into the current credential. The refresh token
/// and the linked sheet are kept unless Google rotated the token.
fn apply_grant(current: &Credential, grant: TokenGrant, now: DateTime<Utc>) -> Credential {
    Credential {
        access_token: grant.access_token,
        refresh_token: grant
            .refresh_token
            .unwrap_or_else(|| current.refresh_token.clone()),
        token_type: grant.token_type,
        expiry: now + Duration::seconds(grant.expires_in),
        resource_id: current.resource_id.clone(),
    }
}
