//! Inline keyboards and message rendering.

use crate::bot::actions::{CallbackAction, ExerciseRef};
use crate::config::IdScheme;
use crate::models::Exercise;
use crate::services::connection::sheet_url;
use serde::Serialize;

/// Telegram `InlineKeyboardMarkup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

/// Telegram `InlineKeyboardButton`; exactly one of `callback_data` and
/// `url` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self {
            inline_keyboard: rows,
        }
    }

    /// All callback payloads, row by row.
    pub fn callback_data(&self) -> Vec<&str> {
        self.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| b.callback_data.as_deref())
            .collect()
    }
}

/// A message body plus its keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

pub const HELP_TEXT: &str = "Welcome to the GymBuddy Bot! Here are the available commands:\n\n\
    /connect_sheets - Connect or manage your Google Sheets\n\
    /log <exercise> <sets> <reps> <weight> [notes] - Log a set to your sheet\n\
    /help - Show available commands\n\
    /cancel - Cancel current operation and return to main menu";

pub fn main_menu() -> Rendered {
    Rendered {
        text: HELP_TEXT.to_string(),
        keyboard: Some(InlineKeyboard::new(vec![vec![InlineButton::callback(
            "Get today's exercises",
            CallbackAction::GetExercises.encode(IdScheme::Position),
        )]])),
    }
}

/// Today's list with one info button and a remove/replace pair per entry.
pub fn render_session(exercises: &[Exercise], scheme: IdScheme) -> Rendered {
    if exercises.is_empty() {
        return Rendered {
            text: "You have no exercises left for today.".to_string(),
            keyboard: Some(InlineKeyboard::new(vec![vec![InlineButton::callback(
                "Get new exercises",
                CallbackAction::GetExercises.encode(scheme),
            )]])),
        };
    }

    let mut text = String::from("Here are your exercises for today:\n\n");
    let mut rows = Vec::with_capacity(exercises.len() * 2);

    for (i, exercise) in exercises.iter().enumerate() {
        text.push_str(&format!("{}. {} ({})\n", i + 1, exercise.name, exercise.category));

        let reference = ExerciseRef::for_entry(scheme, i, &exercise.id);
        rows.push(vec![InlineButton::callback(
            format!("{}. {}", i + 1, exercise.name),
            CallbackAction::ExerciseInfo(reference.clone()).encode(scheme),
        )]);
        rows.push(vec![
            InlineButton::callback(
                format!("Remove {}", i + 1),
                CallbackAction::RemoveExercise(reference.clone()).encode(scheme),
            ),
            InlineButton::callback(
                format!("Replace {}", i + 1),
                CallbackAction::ReplaceExercise(reference).encode(scheme),
            ),
        ]);
    }

    Rendered {
        text,
        keyboard: Some(InlineKeyboard::new(rows)),
    }
}

pub fn render_exercise_info(exercise: &Exercise) -> Rendered {
    let mut text = format!("*{}*\n\n", exercise.name);

    let details = [
        ("Category", Some(exercise.category.as_str())),
        ("Level", Some(exercise.level.as_str())),
        ("Force", exercise.force.as_deref()),
        ("Mechanic", exercise.mechanic.as_deref()),
        ("Equipment", exercise.equipment.as_deref()),
    ];
    for (label, value) in details {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            text.push_str(&format!("{}: {}\n", label, value));
        }
    }

    if !exercise.primary_muscles.is_empty() {
        text.push_str(&format!(
            "Primary muscles: {}\n",
            exercise.primary_muscles.join(", ")
        ));
    }
    if !exercise.secondary_muscles.is_empty() {
        text.push_str(&format!(
            "Secondary muscles: {}\n",
            exercise.secondary_muscles.join(", ")
        ));
    }

    if !exercise.instructions.is_empty() {
        text.push_str("\nInstructions:\n");
        for (i, step) in exercise.instructions.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, step));
        }
    }

    Rendered {
        text,
        keyboard: Some(InlineKeyboard::new(vec![vec![InlineButton::callback(
            "Back to exercises",
            CallbackAction::BackToExercises.encode(IdScheme::Position),
        )]])),
    }
}

pub fn authorization_prompt(url: &str) -> Rendered {
    Rendered {
        text: "Please click the button below to authorize access to your Google Sheets. \
               After authorization, you'll be redirected to a page with further instructions."
            .to_string(),
        keyboard: Some(InlineKeyboard::new(vec![
            vec![InlineButton::link("Authorize Google Sheets", url)],
            vec![InlineButton::callback(
                "Cancel",
                CallbackAction::Cancel.encode(IdScheme::Position),
            )],
        ])),
    }
}

pub fn already_linked(resource_id: Option<&str>) -> Rendered {
    let mut text =
        "You're already connected to Google Sheets. What would you like to do?".to_string();
    if let Some(id) = resource_id {
        text.push_str(&format!("\n\nCurrent sheet: {}", sheet_url(id)));
    }

    Rendered {
        text,
        keyboard: Some(InlineKeyboard::new(vec![vec![
            InlineButton::callback(
                "Reconnect",
                CallbackAction::ReconnectSheets.encode(IdScheme::Position),
            ),
            InlineButton::callback(
                "Change Sheet",
                CallbackAction::ChangeSheet.encode(IdScheme::Position),
            ),
        ]])),
    }
}
