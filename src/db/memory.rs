// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for local development and tests.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{
    ConversationRecord, ConversationState, ExerciseSession, PendingAuthState, StoredCredential,
    User,
};
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-local store built on `DashMap`.
///
/// Multi-document writes lock the credential entry first and the
/// conversation entry second; every path takes them in that order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Tables>,
}

#[derive(Default)]
struct Tables {
    users: DashMap<u64, User>,
    sessions: DashMap<u64, ExerciseSession>,
    credentials: DashMap<u64, StoredCredential>,
    conversation_states: DashMap<u64, ConversationRecord>,
    auth_states: DashMap<String, PendingAuthState>,
    /// When set, every call fails as if the backend were down.
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage (tests).
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of pending auth states (tests and diagnostics).
    pub fn pending_auth_states(&self) -> usize {
        self.inner.auth_states.len()
    }

    fn check_online(&self) -> Result<(), AppError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Database not connected (offline mode)".to_string(),
            ));
        }
        Ok(())
    }

    fn conversation_record(user_id: u64, state: ConversationState) -> ConversationRecord {
        ConversationRecord {
            user_id,
            state,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ensure_user(&self, user_id: u64) -> Result<bool, AppError> {
        self.check_online()?;
        let mut created = false;
        self.inner.users.entry(user_id).or_insert_with(|| {
            created = true;
            User {
                user_id,
                created_at: format_utc_rfc3339(chrono::Utc::now()),
            }
        });
        Ok(created)
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.check_online()?;
        Ok(self.inner.users.get(&user_id).map(|u| u.clone()))
    }

    async fn get_session(&self, user_id: u64) -> Result<Option<ExerciseSession>, AppError> {
        self.check_online()?;
        Ok(self.inner.sessions.get(&user_id).map(|s| s.clone()))
    }

    async fn put_session(&self, session: &ExerciseSession) -> Result<(), AppError> {
        self.check_online()?;
        self.inner.sessions.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn get_credential(&self, user_id: u64) -> Result<Option<StoredCredential>, AppError> {
        self.check_online()?;
        Ok(self.inner.credentials.get(&user_id).map(|c| c.clone()))
    }

    async fn put_credential(
        &self,
        user_id: u64,
        credential: &StoredCredential,
    ) -> Result<(), AppError> {
        self.check_online()?;
        self.inner.credentials.insert(user_id, credential.clone());
        Ok(())
    }

    async fn put_credential_and_state(
        &self,
        user_id: u64,
        credential: &StoredCredential,
        state: ConversationState,
    ) -> Result<(), AppError> {
        self.check_online()?;
        let _guard = self.inner.credentials.entry(user_id).insert(credential.clone());
        self.inner
            .conversation_states
            .insert(user_id, Self::conversation_record(user_id, state));
        Ok(())
    }

    async fn clear_connection(&self, user_id: u64) -> Result<(), AppError> {
        self.check_online()?;
        let entry = self.inner.credentials.entry(user_id);
        self.inner.conversation_states.insert(
            user_id,
            Self::conversation_record(user_id, ConversationState::Idle),
        );
        if let Entry::Occupied(occupied) = entry {
            occupied.remove();
        }
        Ok(())
    }

    async fn get_conversation_state(&self, user_id: u64) -> Result<ConversationState, AppError> {
        self.check_online()?;
        Ok(self
            .inner
            .conversation_states
            .get(&user_id)
            .map(|r| r.state)
            .unwrap_or_default())
    }

    async fn set_conversation_state(
        &self,
        user_id: u64,
        state: ConversationState,
    ) -> Result<(), AppError> {
        self.check_online()?;
        self.inner
            .conversation_states
            .insert(user_id, Self::conversation_record(user_id, state));
        Ok(())
    }

    async fn put_auth_state(&self, state: &PendingAuthState) -> Result<(), AppError> {
        self.check_online()?;
        self.inner
            .auth_states
            .insert(state.token.clone(), state.clone());
        Ok(())
    }

    async fn take_auth_state(&self, token: &str) -> Result<Option<PendingAuthState>, AppError> {
        self.check_online()?;
        Ok(self.inner.auth_states.remove(token).map(|(_, state)| state))
    }

    async fn delete_auth_states_for_user(&self, user_id: u64) -> Result<usize, AppError> {
        self.check_online()?;
        let mut removed = 0;
        self.inner.auth_states.retain(|_, state| {
            let keep = state.user_id != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn purge_auth_states(&self, cutoff: &str) -> Result<usize, AppError> {
        self.check_online()?;
        let cutoff = parse_utc_rfc3339(cutoff)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid cutoff: {}", cutoff)))?;

        let mut removed = 0;
        self.inner.auth_states.retain(|_, state| {
            let keep = parse_utc_rfc3339(&state.created_at).is_some_and(|t| t >= cutoff);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
