// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the [`Store`] operations for:
//! - Users (create-if-absent)
//! - Exercise sessions (one document per user)
//! - Credentials (encrypted OAuth tokens)
//! - Conversation states
//! - Auth states (pending OAuth `state` tokens)

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{
    ConversationRecord, ConversationState, ExerciseSession, PendingAuthState, StoredCredential,
    User,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    pub fn new_offline() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    fn conversation_record(user_id: u64, state: ConversationState) -> ConversationRecord {
        ConversationRecord {
            user_id,
            state,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        }
    }

    /// Delete a single document only if it still exists.
    ///
    /// Returns `false` when the document was already gone, which is how two
    /// racing deletes of the same document are told apart.
    async fn delete_if_exists(&self, collection: &str, doc_id: &str) -> Result<bool, AppError> {
        let result = self
            .get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .precondition(firestore::FirestoreWritePrecondition::Exists(true))
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(FirestoreError::DataNotFoundError(_)) | Err(FirestoreError::DataConflictError(_)) => {
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn ensure_user(&self, user_id: u64) -> Result<bool, AppError> {
        let user = User {
            user_id,
            created_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        // Insert fails with a conflict when the document already exists.
        let result: Result<User, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(user_id.to_string())
            .object(&user)
            .execute()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(user_id, "New user created");
                Ok(true)
            }
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Session Operations ──────────────────────────────────────

    async fn get_session(&self, user_id: u64) -> Result<Option<ExerciseSession>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_session(&self, session: &ExerciseSession) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(session.user_id.to_string())
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    async fn get_credential(&self, user_id: u64) -> Result<Option<StoredCredential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_credential(
        &self,
        user_id: u64,
        credential: &StoredCredential,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(user_id.to_string())
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn put_credential_and_state(
        &self,
        user_id: u64,
        credential: &StoredCredential,
        state: ConversationState,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let record = Self::conversation_record(user_id, state);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(user_id.to_string())
            .object(credential)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add credential to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::CONVERSATION_STATES)
            .document_id(user_id.to_string())
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add state to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    async fn clear_connection(&self, user_id: u64) -> Result<(), AppError> {
        let client = self.get_client()?;
        let record = Self::conversation_record(user_id, ConversationState::Idle);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .delete()
            .from(collections::CREDENTIALS)
            .document_id(user_id.to_string())
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::CONVERSATION_STATES)
            .document_id(user_id.to_string())
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add state to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id, "Connection cleared");
        Ok(())
    }

    // ─── Conversation State Operations ───────────────────────────

    async fn get_conversation_state(&self, user_id: u64) -> Result<ConversationState, AppError> {
        let record: Option<ConversationRecord> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CONVERSATION_STATES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(record.map(|r| r.state).unwrap_or_default())
    }

    async fn set_conversation_state(
        &self,
        user_id: u64,
        state: ConversationState,
    ) -> Result<(), AppError> {
        let record = Self::conversation_record(user_id, state);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONVERSATION_STATES)
            .document_id(user_id.to_string())
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Auth State Operations ───────────────────────────────────

    async fn put_auth_state(&self, state: &PendingAuthState) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::AUTH_STATES)
            .document_id(&state.token)
            .object(state)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn take_auth_state(&self, token: &str) -> Result<Option<PendingAuthState>, AppError> {
        let state: Option<PendingAuthState> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::AUTH_STATES)
            .obj()
            .one(token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(state) = state else {
            return Ok(None);
        };

        // Only the caller whose delete succeeds owns the redemption.
        if self.delete_if_exists(collections::AUTH_STATES, token).await? {
            Ok(Some(state))
        } else {
            tracing::warn!(user_id = state.user_id, "Auth state redeemed concurrently");
            Ok(None)
        }
    }

    async fn delete_auth_states_for_user(&self, user_id: u64) -> Result<usize, AppError> {
        let states: Vec<PendingAuthState> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::AUTH_STATES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.batch_delete(&states, collections::AUTH_STATES, |state: &PendingAuthState| {
            state.token.clone()
        })
        .await?;

        Ok(states.len())
    }

    async fn purge_auth_states(&self, cutoff: &str) -> Result<usize, AppError> {
        let cutoff = cutoff.to_string();
        let expired: Vec<PendingAuthState> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::AUTH_STATES)
            .filter(move |q| q.for_all([q.field("created_at").less_than(cutoff.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // States can be redeemed while we purge, so each delete stands alone.
        let removed = stream::iter(expired)
            .map(|state| async move {
                self.delete_if_exists(collections::AUTH_STATES, &state.token)
                    .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>, AppError>>()?
            .into_iter()
            .filter(|deleted| *deleted)
            .count();

        Ok(removed)
    }
}
