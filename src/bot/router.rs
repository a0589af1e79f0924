// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Update dispatch: inline buttons, slash commands and free text.
//!
//! Every button press invokes at most one session or connection operation,
//! re-renders, and answers the callback query exactly once.

use crate::bot::actions::{CallbackAction, ExerciseRef};
use crate::bot::keyboard::{self, Rendered};
use crate::bot::transport::ChatTransport;
use crate::bot::{CallbackQuery, Message, Update};
use crate::config::IdScheme;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{ConversationState, Exercise};
use crate::services::connection::sheet_url;
use crate::services::{
    ConnectionFlow, ExerciseCatalog, ExerciseSessions, StartOutcome, WorkoutEntry,
};
use std::sync::Arc;

const NOT_CONNECTED: &str =
    "You haven't connected a Google Sheet yet. Use /connect_sheets first.";

const LOG_USAGE: &str = "Usage: /log <exercise> <sets> <reps> <weight> [notes]\n\
    Example: /log Barbell Squat 3 10 60kg felt strong";

/// Where a callback came from.
struct CallbackContext {
    user_id: u64,
    chat_id: i64,
    /// Message carrying the pressed keyboard, if Telegram still has it.
    message_id: Option<i64>,
}

/// Dispatches chat updates to the services.
#[derive(Clone)]
pub struct CallbackRouter {
    store: Arc<dyn Store>,
    catalog: Arc<ExerciseCatalog>,
    sessions: ExerciseSessions,
    connection: ConnectionFlow,
    transport: Arc<dyn ChatTransport>,
    id_scheme: IdScheme,
    exercises_per_day: usize,
}

impl CallbackRouter {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<ExerciseCatalog>,
        sessions: ExerciseSessions,
        connection: ConnectionFlow,
        transport: Arc<dyn ChatTransport>,
        id_scheme: IdScheme,
        exercises_per_day: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            sessions,
            connection,
            transport,
            id_scheme,
            exercises_per_day,
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(query) = update.callback_query {
            self.handle_callback(&query).await;
        } else if let Some(message) = update.message {
            self.handle_message(&message).await;
        } else {
            tracing::debug!(update_id = update.update_id, "Ignoring update without payload");
        }
    }

    // ─── Callbacks ───────────────────────────────────────────────

    pub async fn handle_callback(&self, query: &CallbackQuery) {
        let user_id = query.from.id;
        let data = query.data.as_deref().unwrap_or_default();

        let action = match CallbackAction::parse(data, self.id_scheme) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Dropping malformed callback");
                self.answer(query, None).await;
                return;
            }
        };

        let ctx = CallbackContext {
            user_id,
            chat_id: query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(user_id as i64),
            message_id: query.message.as_ref().map(|m| m.message_id),
        };

        tracing::info!(user_id, action = action.name(), "Callback received");

        if let Err(e) = self.store.ensure_user(user_id).await {
            tracing::error!(user_id, error = %e, "Failed to ensure user");
            self.answer(query, Some(e.user_message())).await;
            return;
        }

        match self.dispatch(&ctx, action).await {
            Ok(toast) => self.answer(query, toast).await,
            Err(AppError::NotFound(what)) if is_session_action(data) => {
                // Stale button: show what is there now.
                tracing::info!(user_id, what = %what, "Stale exercise button");
                self.answer(query, Some(AppError::NotFound(what).user_message()))
                    .await;
                if let Err(e) = self.show_session(&ctx).await {
                    tracing::error!(user_id, error = %e, "Failed to re-render session");
                }
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, action = data, "Callback failed");
                self.answer(query, Some(e.user_message())).await;
            }
        }
    }

    /// Run one action. Returns the toast text for the callback answer.
    async fn dispatch(
        &self,
        ctx: &CallbackContext,
        action: CallbackAction,
    ) -> Result<Option<&'static str>, AppError> {
        match action {
            CallbackAction::GetExercises => {
                let exercises = self.catalog.random_sample(self.exercises_per_day);
                self.sessions.replace_all(ctx.user_id, &exercises).await?;
                let rendered = keyboard::render_session(&exercises, self.id_scheme);
                self.send(ctx.chat_id, &rendered).await?;
                Ok(Some("Exercises loaded"))
            }
            CallbackAction::ExerciseInfo(reference) => {
                let exercises = self.sessions.get_all(ctx.user_id).await?;
                let exercise = find_exercise(&exercises, &reference)?;
                self.show(ctx, &keyboard::render_exercise_info(exercise))
                    .await?;
                Ok(None)
            }
            CallbackAction::RemoveExercise(reference) => {
                match reference {
                    ExerciseRef::Position(p) => self.sessions.remove_at(ctx.user_id, p).await?,
                    ExerciseRef::Id(id) => self.sessions.remove_by_id(ctx.user_id, &id).await?,
                };
                self.show_session(ctx).await?;
                Ok(Some("Exercise removed"))
            }
            CallbackAction::ReplaceExercise(reference) => {
                let current = self.sessions.get_all(ctx.user_id).await?;
                let exclude: Vec<&str> = current.iter().map(|e| e.id.as_str()).collect();
                let replacement = self
                    .catalog
                    .random_excluding(&exclude)
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Exercise catalog is empty")))?;

                match reference {
                    ExerciseRef::Position(p) => {
                        self.sessions
                            .replace_at(ctx.user_id, p, &replacement)
                            .await?
                    }
                    ExerciseRef::Id(id) => {
                        self.sessions
                            .replace_by_id(ctx.user_id, &id, &replacement)
                            .await?
                    }
                };
                self.show_session(ctx).await?;
                Ok(Some("Exercise replaced"))
            }
            CallbackAction::BackToExercises => {
                self.show_session(ctx).await?;
                Ok(None)
            }
            CallbackAction::ConnectSheets => {
                self.connect(ctx.user_id, ctx.chat_id, false).await?;
                Ok(None)
            }
            CallbackAction::ReconnectSheets => {
                self.connect(ctx.user_id, ctx.chat_id, true).await?;
                Ok(None)
            }
            CallbackAction::ChangeSheet => {
                match self.connection.change_resource(ctx.user_id).await {
                    Ok(()) => {}
                    Err(AppError::NotFound(_)) => {
                        self.send_text(ctx.chat_id, NOT_CONNECTED).await?;
                        return Ok(Some("Not connected"));
                    }
                    Err(e) => return Err(e),
                }
                self.send_text(
                    ctx.chat_id,
                    "Please send me the ID (or URL) of the Google Sheet you want to use.",
                )
                .await?;
                Ok(None)
            }
            CallbackAction::Cancel => {
                self.connection.cancel(ctx.user_id).await?;
                self.send(ctx.chat_id, &keyboard::main_menu()).await?;
                Ok(Some("Cancelled"))
            }
        }
    }

    async fn show_session(&self, ctx: &CallbackContext) -> Result<(), AppError> {
        let exercises = self.sessions.get_all(ctx.user_id).await?;
        self.show(ctx, &keyboard::render_session(&exercises, self.id_scheme))
            .await
    }

    /// Edit the message carrying the keyboard, or send a new one when it is
    /// gone.
    async fn show(&self, ctx: &CallbackContext, rendered: &Rendered) -> Result<(), AppError> {
        match ctx.message_id {
            Some(message_id) => {
                self.transport
                    .edit_message(
                        ctx.chat_id,
                        message_id,
                        &rendered.text,
                        rendered.keyboard.as_ref(),
                    )
                    .await
            }
            None => self.send(ctx.chat_id, rendered).await,
        }
    }

    async fn answer(&self, query: &CallbackQuery, text: Option<&str>) {
        if let Err(e) = self.transport.answer_callback(&query.id, text).await {
            tracing::warn!(user_id = query.from.id, error = %e, "Failed to answer callback");
        }
    }

    // ─── Messages ────────────────────────────────────────────────

    pub async fn handle_message(&self, message: &Message) {
        let Some(user_id) = message.from.as_ref().map(|f| f.id) else {
            return;
        };
        let Some(text) = message.text.as_deref().map(str::trim) else {
            return;
        };
        let chat_id = message.chat.id;

        if let Err(e) = self.store.ensure_user(user_id).await {
            tracing::error!(user_id, error = %e, "Failed to ensure user");
            self.reply(chat_id, e.user_message()).await;
            return;
        }

        let result = if text.starts_with('/') {
            self.handle_command(user_id, chat_id, text).await
        } else {
            self.handle_text(user_id, chat_id, text).await
        };

        if let Err(e) = result {
            tracing::warn!(user_id, error = %e, "Message handling failed");
            self.reply(chat_id, e.user_message()).await;
        }
    }

    async fn handle_command(&self, user_id: u64, chat_id: i64, text: &str) -> Result<(), AppError> {
        let (command, args) = match text.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (text, ""),
        };
        // "/start@GymBuddyBot" in group chats.
        let command = command.split('@').next().unwrap_or(command);

        tracing::info!(user_id, command, "Command received");

        match command {
            "/start" | "/help" => self.send(chat_id, &keyboard::main_menu()).await,
            "/connect_sheets" | "/connect" => self.connect(user_id, chat_id, false).await,
            "/cancel" => {
                self.connection.cancel(user_id).await?;
                self.send(chat_id, &keyboard::main_menu()).await
            }
            "/log" => self.log_workout(user_id, chat_id, args).await,
            _ => {
                self.send_text(
                    chat_id,
                    "Unknown command. Use /help to see the available commands.",
                )
                .await
            }
        }
    }

    async fn handle_text(&self, user_id: u64, chat_id: i64, text: &str) -> Result<(), AppError> {
        match self.store.get_conversation_state(user_id).await? {
            ConversationState::AwaitingResourceId => {
                match self.connection.submit_resource_id(user_id, text).await {
                    Ok(sheet_id) => {
                        self.send_text(
                            chat_id,
                            &format!(
                                "Great! Your Google Sheet has been successfully connected: {}\n\
                                 You can now use /log to write to your sheet.",
                                sheet_url(&sheet_id)
                            ),
                        )
                        .await
                    }
                    Err(AppError::InvalidInput(_)) => {
                        self.send_text(
                            chat_id,
                            "That doesn't look like a valid Google Sheet ID. Please try again. \
                             The ID should be 44 characters long and start with '1'.",
                        )
                        .await
                    }
                    Err(e) => Err(e),
                }
            }
            ConversationState::AwaitingAuthorization => {
                self.send_text(
                    chat_id,
                    "Please finish authorizing in your browser using the link I sent, \
                     or use /cancel to stop.",
                )
                .await
            }
            ConversationState::Idle => {
                self.send_text(
                    chat_id,
                    "I'm not sure how to process that message. Use /help to see what I can do.",
                )
                .await
            }
        }
    }

    async fn connect(&self, user_id: u64, chat_id: i64, force: bool) -> Result<(), AppError> {
        match self.connection.start(user_id, force).await? {
            StartOutcome::AuthorizationUrl(url) => {
                self.send(chat_id, &keyboard::authorization_prompt(&url))
                    .await
            }
            StartOutcome::AlreadyLinked { resource_id } => {
                self.send(chat_id, &keyboard::already_linked(resource_id.as_deref()))
                    .await
            }
        }
    }

    async fn log_workout(&self, user_id: u64, chat_id: i64, args: &str) -> Result<(), AppError> {
        let Some(entry) = WorkoutEntry::parse(args) else {
            return self.send_text(chat_id, LOG_USAGE).await;
        };

        match self.connection.log_workout(user_id, &entry).await {
            Ok(()) => {
                self.send_text(
                    chat_id,
                    &format!(
                        "Logged {}: {} x {} @ {}",
                        entry.exercise, entry.sets, entry.reps, entry.weight
                    ),
                )
                .await
            }
            Err(AppError::NotFound(_)) => self.send_text(chat_id, NOT_CONNECTED).await,
            Err(e) => Err(e),
        }
    }

    // ─── Sending ─────────────────────────────────────────────────

    async fn send(&self, chat_id: i64, rendered: &Rendered) -> Result<(), AppError> {
        self.transport
            .send_message(chat_id, &rendered.text, rendered.keyboard.as_ref())
            .await
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        self.transport.send_message(chat_id, text, None).await
    }

    /// Send and only log failures.
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.send_text(chat_id, text).await {
            tracing::warn!(chat_id, error = %e, "Failed to send reply");
        }
    }
}

fn is_session_action(data: &str) -> bool {
    data.starts_with("exercise_info_")
        || data.starts_with("remove_exercise_")
        || data.starts_with("replace_exercise_")
}

fn find_exercise<'a>(
    exercises: &'a [Exercise],
    reference: &ExerciseRef,
) -> Result<&'a Exercise, AppError> {
    let found = match reference {
        ExerciseRef::Position(p) => exercises.get(*p),
        ExerciseRef::Id(id) => exercises.iter().find(|e| &e.id == id),
    };
    found.ok_or_else(|| AppError::NotFound(format!("Exercise {:?}", reference)))
}
