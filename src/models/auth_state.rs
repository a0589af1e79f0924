//! Pending OAuth state tokens.

use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issued, not yet redeemed, authorization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthState {
    /// Opaque token sent as the OAuth `state` parameter (also the document ID)
    pub token: String,
    pub user_id: u64,
    /// When the state was issued (RFC 3339, whole seconds, `Z` suffix so the
    /// strings order the same way as the instants)
    pub created_at: String,
}

impl PendingAuthState {
    pub fn new(token: String, user_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            token,
            user_id,
            created_at: format_utc_rfc3339(now),
        }
    }

    /// True once the state is older than `ttl` at `now`. A state whose
    /// timestamp cannot be parsed counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match parse_utc_rfc3339(&self.created_at) {
            Some(created_at) => created_at + ttl <= now,
            None => true,
        }
    }
}
