//! Database layer.
//!
//! [`Store`] is the row-store seam the services depend on. Firestore is the
//! production backend; [`MemoryStore`] backs local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    ConversationState, ExerciseSession, PendingAuthState, StoredCredential, User,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// One document per user holding the ordered exercise list
    pub const SESSIONS: &str = "exercise_sessions";
    pub const CREDENTIALS: &str = "credentials";
    pub const CONVERSATION_STATES: &str = "conversation_states";
    /// Pending OAuth states (keyed by token)
    pub const AUTH_STATES: &str = "auth_states";
}

/// Durable storage used by the services.
///
/// Every method is a single atomic write or read. Methods that touch more
/// than one document (`put_credential_and_state`, `clear_connection`) apply
/// all of their writes or none.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    /// Create the user if absent. Returns `true` when a new user was created.
    async fn ensure_user(&self, user_id: u64) -> Result<bool, AppError>;

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError>;

    // ─── Exercise Sessions ───────────────────────────────────────

    async fn get_session(&self, user_id: u64) -> Result<Option<ExerciseSession>, AppError>;

    /// Replace the whole session document.
    async fn put_session(&self, session: &ExerciseSession) -> Result<(), AppError>;

    // ─── Credentials ─────────────────────────────────────────────

    async fn get_credential(&self, user_id: u64) -> Result<Option<StoredCredential>, AppError>;

    async fn put_credential(
        &self,
        user_id: u64,
        credential: &StoredCredential,
    ) -> Result<(), AppError>;

    /// Store a credential and a conversation state together.
    async fn put_credential_and_state(
        &self,
        user_id: u64,
        credential: &StoredCredential,
        state: ConversationState,
    ) -> Result<(), AppError>;

    /// Delete the credential and reset the conversation state to idle.
    async fn clear_connection(&self, user_id: u64) -> Result<(), AppError>;

    // ─── Conversation State ──────────────────────────────────────

    /// Current state; `Idle` when none was ever stored.
    async fn get_conversation_state(&self, user_id: u64) -> Result<ConversationState, AppError>;

    async fn set_conversation_state(
        &self,
        user_id: u64,
        state: ConversationState,
    ) -> Result<(), AppError>;

    // ─── Auth States ─────────────────────────────────────────────

    async fn put_auth_state(&self, state: &PendingAuthState) -> Result<(), AppError>;

    /// Look up and delete a state in one step. Of two concurrent calls with
    /// the same token at most one gets `Some`.
    async fn take_auth_state(&self, token: &str) -> Result<Option<PendingAuthState>, AppError>;

    /// Delete every pending state of one user. Returns the number removed.
    async fn delete_auth_states_for_user(&self, user_id: u64) -> Result<usize, AppError>;

    /// Delete states created strictly before `cutoff` (RFC 3339, `Z` suffix).
    async fn purge_auth_states(&self, cutoff: &str) -> Result<usize, AppError>;
}
