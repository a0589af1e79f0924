// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Long-poll listener tests with a scripted update source.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use gym_buddy::bot::listener::Listener;
use gym_buddy::bot::{CallbackQuery, Message, Update, UpdateSource};
use gym_buddy::error::AppError;
use gym_buddy::services::{ConnectionStatus, LinkOutcome};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

mod common;
use common::{button, create_test_app, state_from_url, text_message, Outcome, SHEET_ID};

/// Hands out prepared batches, then empty polls.
#[derive(Default)]
struct ScriptedSource {
    batches: Mutex<VecDeque<Result<Vec<Update>, AppError>>>,
    offsets: Mutex<Vec<u64>>,
}

impl ScriptedSource {
    fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn fetch_updates(&self, offset: u64) -> Result<Vec<Update>, AppError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }
}

fn message_update(update_id: u64, message: Message) -> Update {
    Update {
        update_id,
        message: Some(message),
        callback_query: None,
    }
}

fn callback_update(update_id: u64, query: CallbackQuery) -> Update {
    Update {
        update_id,
        message: None,
        callback_query: Some(query),
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_listener_dispatches_and_advances_offset() {
    let app = create_test_app();
    let source = Arc::new(ScriptedSource::default());
    source.batches.lock().unwrap().extend([
        Ok(vec![
            message_update(5, text_message(1, "/start")),
            message_update(6, text_message(2, "/start")),
        ]),
        Ok(vec![message_update(7, text_message(3, "/help"))]),
    ]);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = Listener::new(source.clone(), app.state.router.clone());
    let handle = tokio::spawn(listener.run(shutdown_rx));

    wait_for(|| source.offsets().contains(&8)).await;
    shutdown_tx.send(true).unwrap();
    let dispatched = handle.await.unwrap();

    assert_eq!(dispatched, 3);
    let offsets = source.offsets();
    assert_eq!(&offsets[..3], &[0, 7, 8]);

    let mut chats: Vec<i64> = app.transport.sent().iter().map(|m| m.chat_id).collect();
    chats.sort_unstable();
    assert_eq!(chats, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_listener_stops_promptly_while_backing_off() {
    let app = create_test_app();
    let source = Arc::new(ScriptedSource::default());
    source
        .batches
        .lock()
        .unwrap()
        .push_back(Err(AppError::ExternalTransient("network down".to_string())));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Listener::new(source.clone(), app.state.router.clone()).run(shutdown_rx));

    wait_for(|| !source.offsets().is_empty()).await;
    shutdown_tx.send(true).unwrap();

    // Well under the fetch-error backoff.
    let dispatched = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("listener did not stop")
        .unwrap();
    assert_eq!(dispatched, 0);
    assert_eq!(source.offsets(), vec![0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_user_updates_run_in_arrival_order() {
    let app = create_test_app();
    app.seed_credential(5, -ChronoDuration::minutes(1), Some(SHEET_ID))
        .await;
    app.oauth.set_refresh(Outcome::Rejected);
    app.oauth.set_refresh_delay(Duration::from_millis(200));

    // User 5 logs a workout (slow, then rejected) and presses Reconnect right
    // after. User 6 is unrelated.
    let source = Arc::new(ScriptedSource::default());
    source.batches.lock().unwrap().push_back(Ok(vec![
        message_update(1, text_message(5, "/log Squat 3 10 60")),
        callback_update(2, button(5, "reconnect_sheets")),
        message_update(3, text_message(6, "/start")),
    ]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Listener::new(source.clone(), app.state.router.clone()).run(shutdown_rx));

    wait_for(|| app.transport.sent().len() == 3).await;
    shutdown_tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 3);

    let sent = app.transport.sent();
    // The other user is not held up behind the slow refresh.
    assert_eq!(sent[0].chat_id, 6);
    assert_eq!(sent[1].chat_id, 5);
    assert!(sent[1].text.contains("access was revoked"));
    assert_eq!(sent[2].chat_id, 5);
    assert!(sent[2].text.contains("authorize access"));

    assert_eq!(
        app.state.connection.status(5).await.unwrap(),
        ConnectionStatus::AwaitingAuthorization
    );

    // The link sent last is still good.
    let url = sent[2].keyboard.as_ref().unwrap().inline_keyboard[0][0]
        .url
        .clone()
        .unwrap();
    let outcome = app
        .state
        .connection
        .complete_authorization(&state_from_url(&url), "fresh")
        .await
        .unwrap();
    assert!(matches!(outcome, LinkOutcome::SheetCreated { user_id: 5, .. }));
}
