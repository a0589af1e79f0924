// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telegram bot: update types, transport, keyboards, action routing and the
//! long-poll listener.

pub mod actions;
pub mod keyboard;
pub mod listener;
pub mod router;
pub mod transport;

pub use actions::{CallbackAction, ExerciseRef};
pub use keyboard::{InlineButton, InlineKeyboard};
pub use router::CallbackRouter;
pub use transport::{ChatTransport, TelegramClient, UpdateSource};

use serde::Deserialize;

/// One item from `getUpdates`. Only the fields the bot reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: u64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// The user who sent this update, if any.
    pub fn sender_id(&self) -> Option<u64> {
        match (&self.callback_query, &self.message) {
            (Some(query), _) => Some(query.from.id),
            (None, Some(message)) => message.from.as_ref().map(|f| f.id),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<Sender>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// An inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    /// The message carrying the keyboard. Absent when it is too old.
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 10,
                "callback_query": {
                    "id": "cb1",
                    "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                    "message": {
                        "message_id": 5,
                        "chat": {"id": 42, "type": "private"},
                        "date": 0,
                        "text": "Here are your exercises"
                    },
                    "chat_instance": "x",
                    "data": "remove_exercise_Barbell_Squat"
                }
            }"#,
        )
        .unwrap();

        let query = update.callback_query.clone().unwrap();
        assert_eq!(query.from.id, 42);
        assert_eq!(query.message.unwrap().message_id, 5);
        assert_eq!(query.data.as_deref(), Some("remove_exercise_Barbell_Squat"));
        assert!(update.message.is_none());
        assert_eq!(update.sender_id(), Some(42));
    }

    #[test]
    fn test_sender_id_of_message_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 11,
                "message": {
                    "message_id": 6,
                    "from": {"id": 7, "is_bot": false, "first_name": "Bo"},
                    "chat": {"id": 7, "type": "private"},
                    "date": 0,
                    "text": "/start"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(update.sender_id(), Some(7));

        let empty: Update = serde_json::from_str(r#"{"update_id": 12}"#).unwrap();
        assert_eq!(empty.sender_id(), None);
    }
}
