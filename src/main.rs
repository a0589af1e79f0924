// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gym Buddy bot server
//!
//! Runs the Telegram long-poll listener, the HTTP server for the Google
//! OAuth redirect, and the expired auth-state purge under one runtime.

use gym_buddy::{
    bot::{listener::Listener, TelegramClient},
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, Store},
    services::{AuthStates, ExerciseCatalog, GoogleClient, KmsService},
    AppState, Collaborators,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Gym Buddy");

    // Storage backend
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; all state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Load the exercise catalog
    tracing::info!(path = %config.exercises_path, "Loading exercise catalog");
    let catalog = ExerciseCatalog::load_from_file(&config.exercises_path)?;
    tracing::info!(count = catalog.len(), "Exercise catalog loaded");

    // Token encryption
    let kms = match config.kms_key_name.as_deref() {
        Some(key_name) => {
            KmsService::new(&config.gcp_project_id, &config.gcp_region, key_name).await?
        }
        None => {
            tracing::warn!("KMS_KEY_NAME not set; tokens are stored base64-encoded only");
            KmsService::local()
        }
    };

    let google = Arc::new(GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.oauth_redirect_url.clone(),
        config.provider_timeout,
    )?);
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_token,
        config.provider_timeout,
    )?);

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        Collaborators {
            store,
            catalog: Arc::new(catalog),
            kms,
            oauth: google.clone(),
            sheets: google,
            transport: telegram.clone(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Purge expired auth states in the background
    let purge = tokio::spawn(purge_auth_states(
        state.auth_states.clone(),
        config.auth_state_purge_interval,
        shutdown_rx.clone(),
    ));

    // Telegram listener
    let listener = tokio::spawn(Listener::new(telegram, state.router.clone()).run(shutdown_rx.clone()));

    // HTTP server for the OAuth redirect
    let app = gym_buddy::routes::create_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    let mut server_shutdown = shutdown_rx;
    let server = tokio::spawn(async move {
        axum::serve(tcp, app)
            .with_graceful_shutdown(async move { stop_requested(&mut server_shutdown).await })
            .await
    });

    shutdown_signal().await;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    let (listener, server, purge) = tokio::join!(listener, server, purge);
    listener?;
    server??;
    purge?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Periodically delete auth states older than the TTL.
async fn purge_auth_states(
    auth_states: AuthStates,
    every: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_requested(&mut shutdown) => break,
            _ = interval.tick() => {
                if let Err(e) = auth_states.purge_expired().await {
                    tracing::warn!(error = %e, "Auth state purge failed");
                }
            }
        }
    }
}

/// Resolve once shutdown is signalled. The `watch::Ref` from `wait_for` is
/// not `Send`, so it is dropped here rather than held by the caller.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        tracing::debug!("Shutdown sender dropped");
    }
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gym_buddy=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
