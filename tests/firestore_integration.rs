// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with: FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test
//!
//! The emulator provides a clean state for each test run.

use chrono::{Duration, Utc};
use gym_buddy::db::Store;
use gym_buddy::models::{
    ConversationState, ExerciseSession, PendingAuthState, SessionEntry, StoredCredential,
};
use gym_buddy::time_utils::format_utc_rfc3339;

mod common;
use common::test_db;

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

fn stored_credential(resource_id: Option<&str>) -> StoredCredential {
    StoredCredential {
        access_token_encrypted: "YWNjZXNz".to_string(),
        refresh_token_encrypted: "cmVmcmVzaA".to_string(),
        token_type: "Bearer".to_string(),
        expires_at: format_utc_rfc3339(Utc::now() + Duration::hours(1)),
        resource_id: resource_id.map(String::from),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER AND SESSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_ensure_user_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get_user(user_id).await.unwrap().is_none());
    assert!(db.ensure_user(user_id).await.unwrap());
    assert!(!db.ensure_user(user_id).await.unwrap());
    assert_eq!(db.get_user(user_id).await.unwrap().unwrap().user_id, user_id);
}

#[tokio::test]
async fn test_session_round_trip_keeps_order() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let entries: Vec<SessionEntry> = ["Deadlift", "Barbell_Squat", "Bench_Press"]
        .iter()
        .map(|id| SessionEntry {
            exercise_id: id.to_string(),
            name: id.replace('_', " "),
            category: "strength".to_string(),
        })
        .collect();
    let session = ExerciseSession {
        user_id,
        entries: entries.clone(),
        updated_at: format_utc_rfc3339(Utc::now()),
    };

    db.put_session(&session).await.unwrap();
    let loaded = db.get_session(user_id).await.unwrap().unwrap();
    assert_eq!(loaded.entries, entries);
}

// ═══════════════════════════════════════════════════════════════════════════
// CONNECTION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_credential_and_state_written_together() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert_eq!(
        db.get_conversation_state(user_id).await.unwrap(),
        ConversationState::Idle
    );

    db.put_credential_and_state(
        user_id,
        &stored_credential(None),
        ConversationState::AwaitingResourceId,
    )
    .await
    .unwrap();

    assert!(db.get_credential(user_id).await.unwrap().is_some());
    assert_eq!(
        db.get_conversation_state(user_id).await.unwrap(),
        ConversationState::AwaitingResourceId
    );

    db.clear_connection(user_id).await.unwrap();
    assert!(db.get_credential(user_id).await.unwrap().is_none());
    assert_eq!(
        db.get_conversation_state(user_id).await.unwrap(),
        ConversationState::Idle
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTH STATE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_take_auth_state_once() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let token = format!("token-{}", user_id);

    db.put_auth_state(&PendingAuthState::new(token.clone(), user_id, Utc::now()))
        .await
        .unwrap();

    let (a, b) = tokio::join!(db.take_auth_state(&token), db.take_auth_state(&token));
    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|s| s.is_some())
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_auth_state_cleanup() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let old = format!("old-{}", user_id);
    let fresh = format!("fresh-{}", user_id);

    db.put_auth_state(&PendingAuthState::new(
        old.clone(),
        user_id,
        Utc::now() - Duration::hours(2),
    ))
    .await
    .unwrap();
    db.put_auth_state(&PendingAuthState::new(fresh.clone(), user_id, Utc::now()))
        .await
        .unwrap();

    let cutoff = format_utc_rfc3339(Utc::now() - Duration::hours(1));
    assert!(db.purge_auth_states(&cutoff).await.unwrap() >= 1);
    assert!(db.take_auth_state(&old).await.unwrap().is_none());

    assert_eq!(db.delete_auth_states_for_user(user_id).await.unwrap(), 1);
    assert!(db.take_auth_state(&fresh).await.unwrap().is_none());
}
