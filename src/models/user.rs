//! User and credential models for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat user, keyed by the platform-assigned ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Telegram user ID (also used as document ID)
    pub user_id: u64,
    /// When the user first interacted with the bot
    pub created_at: String,
}

/// Google credential as stored (tokens encrypted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    pub token_type: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Linked spreadsheet ID, once known
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// Decrypted Google credential used in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expiry: DateTime<Utc>,
    pub resource_id: Option<String>,
}

impl Credential {
    /// True when the access token is expired at `now`, counting `margin`
    /// as already expired.
    pub fn is_expired(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expiry <= now + margin
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("resource_id", &self.resource_id)
            .finish_non_exhaustive()
    }
}
