// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user "today's exercises" list.
//!
//! Handles:
//! - Replacing the whole list when new exercises are dealt
//! - Position-addressed remove/replace driven by inline buttons
//! - Stable-ID addressing resolved to the current position under the lock
//!
//! Every read-modify-write for one user runs under that user's session lock,
//! and the list is written back as one document.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Exercise, ExerciseSession, SessionEntry};
use crate::services::catalog::ExerciseCatalog;
use crate::services::locks::UserLocks;
use crate::time_utils::format_utc_rfc3339;
use std::sync::Arc;

/// Exercise session service.
#[derive(Clone)]
pub struct ExerciseSessions {
    store: Arc<dyn Store>,
    catalog: Arc<ExerciseCatalog>,
    locks: UserLocks,
}

impl ExerciseSessions {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<ExerciseCatalog>) -> Self {
        Self {
            store,
            catalog,
            locks: UserLocks::new(),
        }
    }

    /// Discard the current list and install `exercises` in order.
    pub async fn replace_all(&self, user_id: u64, exercises: &[Exercise]) -> Result<(), AppError> {
        let _guard = self.locks.lock(user_id).await;

        let session = ExerciseSession {
            user_id,
            entries: exercises.iter().map(SessionEntry::from).collect(),
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };
        self.store.put_session(&session).await?;

        tracing::debug!(user_id, count = exercises.len(), "Session replaced");
        Ok(())
    }

    /// Current list in order. Empty when the user has no session.
    pub async fn get_all(&self, user_id: u64) -> Result<Vec<Exercise>, AppError> {
        let entries = self.load_entries(user_id).await?;
        Ok(entries.iter().map(|entry| self.resolve(entry)).collect())
    }

    /// Remove the exercise at `position`; later ones shift down by one.
    /// Returns the removed exercise.
    pub async fn remove_at(&self, user_id: u64, position: usize) -> Result<Exercise, AppError> {
        let _guard = self.locks.lock(user_id).await;
        self.remove_locked(user_id, position).await
    }

    /// Overwrite the exercise at `position`. Returns the one it replaced.
    pub async fn replace_at(
        &self,
        user_id: u64,
        position: usize,
        exercise: &Exercise,
    ) -> Result<Exercise, AppError> {
        let _guard = self.locks.lock(user_id).await;
        self.replace_locked(user_id, position, exercise).await
    }

    /// Current position of the first entry with `exercise_id`.
    pub async fn position_of(&self, user_id: u64, exercise_id: &str) -> Result<usize, AppError> {
        let entries = self.load_entries(user_id).await?;
        find_position(&entries, exercise_id)
    }

    pub async fn remove_by_id(&self, user_id: u64, exercise_id: &str) -> Result<Exercise, AppError> {
        let _guard = self.locks.lock(user_id).await;
        let position = find_position(&self.load_entries(user_id).await?, exercise_id)?;
        self.remove_locked(user_id, position).await
    }

    pub async fn replace_by_id(
        &self,
        user_id: u64,
        exercise_id: &str,
        exercise: &Exercise,
    ) -> Result<Exercise, AppError> {
        let _guard = self.locks.lock(user_id).await;
        let position = find_position(&self.load_entries(user_id).await?, exercise_id)?;
        self.replace_locked(user_id, position, exercise).await
    }

    // ─── Internals (caller holds the session lock) ───────────────

    async fn remove_locked(&self, user_id: u64, position: usize) -> Result<Exercise, AppError> {
        let mut entries = self.load_entries(user_id).await?;
        check_position(&entries, position)?;

        let removed = entries.remove(position);
        self.save(user_id, entries).await?;

        tracing::debug!(user_id, position, exercise_id = %removed.exercise_id, "Exercise removed");
        Ok(self.resolve(&removed))
    }

    async fn replace_locked(
        &self,
        user_id: u64,
        position: usize,
        exercise: &Exercise,
    ) -> Result<Exercise, AppError> {
        let mut entries = self.load_entries(user_id).await?;
        check_position(&entries, position)?;

        let old = std::mem::replace(&mut entries[position], SessionEntry::from(exercise));
        self.save(user_id, entries).await?;

        tracing::debug!(
            user_id,
            position,
            old = %old.exercise_id,
            new = %exercise.id,
            "Exercise replaced"
        );
        Ok(self.resolve(&old))
    }

    async fn load_entries(&self, user_id: u64) -> Result<Vec<SessionEntry>, AppError> {
        Ok(self
            .store
            .get_session(user_id)
            .await?
            .map(|s| s.entries)
            .unwrap_or_default())
    }

    async fn save(&self, user_id: u64, entries: Vec<SessionEntry>) -> Result<(), AppError> {
        let session = ExerciseSession {
            user_id,
            entries,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };
        self.store.put_session(&session).await
    }

    fn resolve(&self, entry: &SessionEntry) -> Exercise {
        self.catalog
            .lookup_by_id(&entry.exercise_id)
            .cloned()
            .unwrap_or_else(|| Exercise::from_entry(entry))
    }
}

fn check_position(entries: &[SessionEntry], position: usize) -> Result<(), AppError> {
    if position >= entries.len() {
        return Err(AppError::NotFound(format!(
            "Position {} (session has {} exercises)",
            position,
            entries.len()
        )));
    }
    Ok(())
}

fn find_position(entries: &[SessionEntry], exercise_id: &str) -> Result<usize, AppError> {
    entries
        .iter()
        .position(|e| e.exercise_id == exercise_id)
        .ok_or_else(|| AppError::NotFound(format!("Exercise {} not in session", exercise_id)))
}
