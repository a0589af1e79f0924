// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth `state` correlation.
//!
//! The authorization redirect arrives on the HTTP listener, not in the chat,
//! so the only thing tying it back to a chat user is the `state` parameter.
//! Tokens are random, single-use and expire after a fixed window.

use crate::db::Store;
use crate::error::AppError;
use crate::models::PendingAuthState;
use crate::time_utils::format_utc_rfc3339;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use std::time::Duration;

/// Number of random bytes in a state token (256 bits).
const STATE_TOKEN_BYTES: usize = 32;

/// Issues and redeems OAuth state tokens.
#[derive(Clone)]
pub struct AuthStates {
    store: Arc<dyn Store>,
    ttl: chrono::Duration,
    rng: SystemRandom,
}

impl AuthStates {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            store,
            ttl: chrono::Duration::seconds(ttl.as_secs() as i64),
            rng: SystemRandom::new(),
        }
    }

    /// Generate a new state token and record it as pending for `user_id`.
    pub async fn issue_state(&self, user_id: u64) -> Result<String, AppError> {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("OS random source failed")))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let state = PendingAuthState::new(token.clone(), user_id, chrono::Utc::now());
        self.store.put_auth_state(&state).await?;

        tracing::debug!(user_id, "Auth state issued");
        Ok(token)
    }

    /// Consume `token` and return the user it was issued to.
    ///
    /// The token is deleted as soon as it is found, whether or not it turns
    /// out to be expired, so a second call always returns `None`.
    pub async fn redeem(&self, token: &str) -> Result<Option<u64>, AppError> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(state) = self.store.take_auth_state(token).await? else {
            tracing::info!("Unknown or already redeemed auth state");
            return Ok(None);
        };

        if state.is_expired(chrono::Utc::now(), self.ttl) {
            tracing::info!(user_id = state.user_id, "Expired auth state redeemed");
            return Ok(None);
        }

        tracing::debug!(user_id = state.user_id, "Auth state redeemed");
        Ok(Some(state.user_id))
    }

    /// Delete every pending state older than the TTL.
    pub async fn purge_expired(&self) -> Result<usize, AppError> {
        let cutoff = format_utc_rfc3339(chrono::Utc::now() - self.ttl);
        let removed = self.store.purge_auth_states(&cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired auth states");
        }
        Ok(removed)
    }

    /// Delete all pending states of one user.
    pub async fn revoke_for_user(&self, user_id: u64) -> Result<usize, AppError> {
        self.store.delete_auth_states_for_user(user_id).await
    }
}
