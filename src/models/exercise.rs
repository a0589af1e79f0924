//! Exercise catalog records and the per-user session that references them.

use serde::{Deserialize, Serialize};

/// One exercise from the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Stable catalog ID (e.g. `Barbell_Squat`)
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub force: Option<String>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub mechanic: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub primary_muscles: Vec<String>,
    #[serde(default)]
    pub secondary_muscles: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Exercise {
    /// Rebuild a minimal exercise from a session snapshot when the catalog
    /// no longer knows the ID.
    pub fn from_entry(entry: &SessionEntry) -> Self {
        Self {
            id: entry.exercise_id.clone(),
            name: entry.name.clone(),
            force: None,
            level: String::new(),
            mechanic: None,
            equipment: None,
            primary_muscles: Vec::new(),
            secondary_muscles: Vec::new(),
            instructions: Vec::new(),
            category: entry.category.clone(),
            images: Vec::new(),
        }
    }
}

/// One position in a user's session.
///
/// Name and category are copied from the catalog so the list still renders
/// if the catalog changes under a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub exercise_id: String,
    pub name: String,
    pub category: String,
}

impl From<&Exercise> for SessionEntry {
    fn from(exercise: &Exercise) -> Self {
        Self {
            exercise_id: exercise.id.clone(),
            name: exercise.name.clone(),
            category: exercise.category.clone(),
        }
    }
}

/// A user's ordered list of today's exercises, stored as a single document.
///
/// The index in `entries` is the position exposed to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSession {
    pub user_id: u64,
    pub entries: Vec<SessionEntry>,
    /// Last write (ISO 8601)
    pub updated_at: String,
}
