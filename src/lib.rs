// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gym Buddy: a Telegram bot that hands out daily exercises and logs
//! workouts to a linked Google Sheet.
//!
//! This crate provides the per-user exercise session, the correlation of
//! out-of-band OAuth redirects back to chat users, and the credential
//! lifecycle behind the sheet connection.

pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use bot::{CallbackRouter, ChatTransport};
use config::Config;
use db::Store;
use services::{
    AuthStates, ConnectionFlow, ExerciseCatalog, ExerciseSessions, KmsService, OAuthProvider,
    SheetsProvider, TokenLifecycle,
};
use std::sync::Arc;

/// External collaborators the application is wired with.
pub struct Collaborators {
    pub store: Arc<dyn Store>,
    pub catalog: Arc<ExerciseCatalog>,
    pub kms: KmsService,
    pub oauth: Arc<dyn OAuthProvider>,
    pub sheets: Arc<dyn SheetsProvider>,
    pub transport: Arc<dyn ChatTransport>,
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub auth_states: AuthStates,
    pub sessions: ExerciseSessions,
    pub connection: ConnectionFlow,
    pub router: Arc<CallbackRouter>,
}

impl AppState {
    pub fn new(config: Config, deps: Collaborators) -> Self {
        let auth_states = AuthStates::new(deps.store.clone(), config.auth_state_ttl);
        let tokens = TokenLifecycle::new(
            deps.store.clone(),
            deps.kms,
            deps.oauth.clone(),
            config.token_refresh_margin,
        );
        let sessions = ExerciseSessions::new(deps.store.clone(), deps.catalog.clone());
        let connection = ConnectionFlow::new(
            deps.store.clone(),
            auth_states.clone(),
            tokens,
            deps.oauth,
            deps.sheets,
            deps.transport.clone(),
            config.sheet_provisioning,
        );
        let router = Arc::new(CallbackRouter::new(
            deps.store.clone(),
            deps.catalog,
            sessions.clone(),
            connection.clone(),
            deps.transport,
            config.id_scheme,
            config.exercises_per_day,
        ));

        Self {
            config,
            store: deps.store,
            auth_states,
            sessions,
            connection,
            router,
        }
    }
}
