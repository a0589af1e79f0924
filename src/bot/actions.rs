// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inline button payloads.
//!
//! Payloads are `<action>` or `<action>_<ref>`. Exercise IDs contain
//! underscores, so `<ref>` is everything after the action prefix.

use crate::config::IdScheme;

/// Telegram limit on `callback_data`, in bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

const EXERCISE_INFO: &str = "exercise_info_";
const REMOVE_EXERCISE: &str = "remove_exercise_";
const REPLACE_EXERCISE: &str = "replace_exercise_";
/// Marks a position reference inside the stable-ID scheme.
const POSITION_MARKER: char = '@';

/// How a button points at a session entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExerciseRef {
    /// 0-based position at render time.
    Position(usize),
    /// Stable catalog ID.
    Id(String),
}

impl ExerciseRef {
    /// Reference for the entry at `position` under `scheme`.
    ///
    /// Under the stable-ID scheme an ID too long for the payload limit falls
    /// back to a marked position.
    pub fn for_entry(scheme: IdScheme, position: usize, exercise_id: &str) -> Self {
        match scheme {
            IdScheme::Position => ExerciseRef::Position(position),
            IdScheme::ExerciseId
                if REPLACE_EXERCISE.len() + exercise_id.len() <= MAX_CALLBACK_DATA
                    && !exercise_id.is_empty()
                    && !exercise_id.starts_with(POSITION_MARKER) =>
            {
                ExerciseRef::Id(exercise_id.to_string())
            }
            IdScheme::ExerciseId => ExerciseRef::Position(position),
        }
    }

    fn parse(param: &str, scheme: IdScheme) -> Option<Self> {
        match scheme {
            IdScheme::Position => param.parse().ok().map(ExerciseRef::Position),
            IdScheme::ExerciseId => match param.strip_prefix(POSITION_MARKER) {
                Some(position) => position.parse().ok().map(ExerciseRef::Position),
                None if !param.is_empty() => Some(ExerciseRef::Id(param.to_string())),
                None => None,
            },
        }
    }

    fn encode(&self, scheme: IdScheme) -> String {
        match (self, scheme) {
            (ExerciseRef::Position(p), IdScheme::Position) => p.to_string(),
            (ExerciseRef::Position(p), IdScheme::ExerciseId) => format!("{}{}", POSITION_MARKER, p),
            (ExerciseRef::Id(id), _) => id.clone(),
        }
    }
}

/// A parsed inline button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    GetExercises,
    ExerciseInfo(ExerciseRef),
    RemoveExercise(ExerciseRef),
    ReplaceExercise(ExerciseRef),
    BackToExercises,
    ConnectSheets,
    ReconnectSheets,
    ChangeSheet,
    Cancel,
}

impl CallbackAction {
    pub fn parse(data: &str, scheme: IdScheme) -> Result<Self, ActionError> {
        match data {
            "get_exercises" => return Ok(CallbackAction::GetExercises),
            "back_to_exercises" => return Ok(CallbackAction::BackToExercises),
            "connect_sheets" => return Ok(CallbackAction::ConnectSheets),
            "reconnect_sheets" => return Ok(CallbackAction::ReconnectSheets),
            "change_sheet" => return Ok(CallbackAction::ChangeSheet),
            "cancel" => return Ok(CallbackAction::Cancel),
            _ => {}
        }

        let (prefix, build): (&str, fn(ExerciseRef) -> CallbackAction) =
            if data.starts_with(EXERCISE_INFO) {
                (EXERCISE_INFO, CallbackAction::ExerciseInfo)
            } else if data.starts_with(REMOVE_EXERCISE) {
                (REMOVE_EXERCISE, CallbackAction::RemoveExercise)
            } else if data.starts_with(REPLACE_EXERCISE) {
                (REPLACE_EXERCISE, CallbackAction::ReplaceExercise)
            } else {
                return Err(ActionError::Unknown(data.to_string()));
            };

        let param = &data[prefix.len()..];
        ExerciseRef::parse(param, scheme)
            .map(build)
            .ok_or_else(|| ActionError::MalformedRef(data.to_string()))
    }

    pub fn encode(&self, scheme: IdScheme) -> String {
        match self {
            CallbackAction::GetExercises => "get_exercises".to_string(),
            CallbackAction::ExerciseInfo(r) => format!("{}{}", EXERCISE_INFO, r.encode(scheme)),
            CallbackAction::RemoveExercise(r) => format!("{}{}", REMOVE_EXERCISE, r.encode(scheme)),
            CallbackAction::ReplaceExercise(r) => {
                format!("{}{}", REPLACE_EXERCISE, r.encode(scheme))
            }
            CallbackAction::BackToExercises => "back_to_exercises".to_string(),
            CallbackAction::ConnectSheets => "connect_sheets".to_string(),
            CallbackAction::ReconnectSheets => "reconnect_sheets".to_string(),
            CallbackAction::ChangeSheet => "change_sheet".to_string(),
            CallbackAction::Cancel => "cancel".to_string(),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CallbackAction::GetExercises => "get_exercises",
            CallbackAction::ExerciseInfo(_) => "exercise_info",
            CallbackAction::RemoveExercise(_) => "remove_exercise",
            CallbackAction::ReplaceExercise(_) => "replace_exercise",
            CallbackAction::BackToExercises => "back_to_exercises",
            CallbackAction::ConnectSheets => "connect_sheets",
            CallbackAction::ReconnectSheets => "reconnect_sheets",
            CallbackAction::ChangeSheet => "change_sheet",
            CallbackAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    Unknown(String),

    #[error("Malformed exercise reference: {0}")]
    MalformedRef(String),
}
