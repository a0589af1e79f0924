// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth_state;
pub mod catalog;
pub mod connection;
pub mod google;
pub mod kms;
pub mod locks;
pub mod session;
pub mod tokens;

pub use auth_state::AuthStates;
pub use catalog::ExerciseCatalog;
pub use connection::{ConnectionFlow, ConnectionStatus, LinkOutcome, StartOutcome, WorkoutEntry};
pub use google::{GoogleClient, OAuthProvider, SheetsProvider, TokenGrant};
pub use kms::KmsService;
pub use session::ExerciseSessions;
pub use tokens::TokenLifecycle;
