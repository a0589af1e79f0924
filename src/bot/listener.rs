// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Long-poll listener.
//!
//! Fetches updates and hands them to the router. Different users are served
//! concurrently, but one user's updates run one at a time in arrival order:
//! each new task waits for the task of that user's previous update. On
//! shutdown the listener stops fetching and waits for in-flight updates.

use crate::bot::router::CallbackRouter;
use crate::bot::transport::UpdateSource;
use crate::bot::Update;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct Listener {
    source: Arc<dyn UpdateSource>,
    router: Arc<CallbackRouter>,
}

/// Last dispatched task per sender. Updates without a sender share one chain.
type Tails = HashMap<Option<u64>, JoinHandle<()>>;

impl Listener {
    pub fn new(source: Arc<dyn UpdateSource>, router: Arc<CallbackRouter>) -> Self {
        Self { source, router }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    /// Returns the number of updates dispatched.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut offset = 0u64;
        let mut dispatched = 0usize;
        let mut tails = Tails::new();

        tracing::info!("Bot listener started");

        while !*shutdown.borrow() {
            let batch = tokio::select! {
                _ = shutdown.changed() => break,
                batch = self.source.fetch_updates(offset) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id.saturating_add(1));
                        dispatched += 1;
                        self.dispatch(&mut tails, update);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch updates, backing off");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }

            // A finished tail has no successor waiting on it.
            tails.retain(|_, handle| !handle.is_finished());
        }

        tracing::info!(in_flight = tails.len(), "Bot listener stopping, draining handlers");
        // Each tail waits for its predecessors, so the tails cover everything.
        for (sender, handle) in tails.drain() {
            if let Err(e) = handle.await {
                tracing::error!(sender = ?sender, error = %e, "Update handler panicked");
            }
        }

        tracing::info!(dispatched, "Bot listener stopped");
        dispatched
    }

    /// Spawn the handler for `update` behind the sender's previous update.
    fn dispatch(&self, tails: &mut Tails, update: Update) {
        let sender = update.sender_id();
        let previous = tails.remove(&sender);
        let router = self.router.clone();

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::error!(sender = ?sender, error = %e, "Update handler panicked");
                }
            }
            router.handle_update(update).await;
        });

        tails.insert(sender, handle);
    }
}
