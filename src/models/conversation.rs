// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user conversation state and the sheet-connection transitions.

use serde::{Deserialize, Serialize};

/// Tag gating how the next plain-text message from a user is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    /// An authorization link was sent; waiting for the OAuth redirect.
    AwaitingAuthorization,
    /// Authorized; waiting for the user to paste a spreadsheet ID.
    AwaitingResourceId,
}

/// Events that move the connection flow between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// `/connect_sheets` or the "Reconnect" button.
    StartRequested,
    /// The OAuth redirect was redeemed. `needs_resource` is set when the
    /// sheet ID must come from the user.
    Redeemed { needs_resource: bool },
    /// A valid sheet ID was received.
    ResourceAccepted,
    /// The "Change Sheet" button.
    ChangeResourceRequested,
    Cancelled,
}

impl ConversationState {
    /// Next state for `event`, or `None` when the event is not valid here.
    pub fn on(self, event: FlowEvent) -> Option<ConversationState> {
        use ConversationState::*;

        match (self, event) {
            (_, FlowEvent::Cancelled) => Some(Idle),
            (_, FlowEvent::StartRequested) => Some(AwaitingAuthorization),
            (AwaitingAuthorization, FlowEvent::Redeemed { needs_resource: false }) => Some(Idle),
            (AwaitingAuthorization, FlowEvent::Redeemed { needs_resource: true }) => {
                Some(AwaitingResourceId)
            }
            (AwaitingResourceId, FlowEvent::ResourceAccepted) => Some(Idle),
            (Idle | AwaitingResourceId, FlowEvent::ChangeResourceRequested) => {
                Some(AwaitingResourceId)
            }
            _ => None,
        }
    }

    /// Storage tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingAuthorization => "awaiting_authorization",
            ConversationState::AwaitingResourceId => "awaiting_resource_id",
        }
    }
}

/// Stored conversation state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: u64,
    pub state: ConversationState,
    pub updated_at: String,
}
