// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod auth_state;
pub mod conversation;
pub mod exercise;
pub mod user;

pub use auth_state::PendingAuthState;
pub use conversation::{ConversationRecord, ConversationState, FlowEvent};
pub use exercise::{Exercise, ExerciseSession, SessionEntry};
pub use user::{Credential, StoredCredential, User};
