// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise catalog loading and random sampling.

use crate::models::Exercise;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only exercise catalog, loaded once at startup.
#[derive(Default, Clone)]
pub struct ExerciseCatalog {
    exercises: Vec<Exercise>,
    by_id: HashMap<String, usize>,
}

impl ExerciseCatalog {
    /// Load the catalog from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load the catalog from a JSON object keyed by exercise ID.
    ///
    /// An entry with an empty `id` takes its key as the ID.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, Exercise> = serde_json::from_str(json_data)
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        let mut exercises: Vec<Exercise> = raw
            .into_iter()
            .map(|(key, mut exercise)| {
                if exercise.id.is_empty() {
                    exercise.id = key;
                }
                exercise
            })
            .collect();
        exercises.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self::from_exercises(exercises))
    }

    /// Build a catalog from an in-memory list. Later duplicates of an ID are
    /// dropped.
    pub fn from_exercises(exercises: Vec<Exercise>) -> Self {
        let mut catalog = Self::default();
        for exercise in exercises {
            if catalog.by_id.contains_key(&exercise.id) {
                tracing::warn!(id = %exercise.id, "Duplicate exercise ID in catalog");
                continue;
            }
            catalog
                .by_id
                .insert(exercise.id.clone(), catalog.exercises.len());
            catalog.exercises.push(exercise);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Exercise> {
        self.by_id.get(id).map(|&index| &self.exercises[index])
    }

    /// Up to `count` distinct exercises in random order.
    pub fn random_sample(&self, count: usize) -> Vec<Exercise> {
        let mut rng = rand::thread_rng();
        self.exercises
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect()
    }

    /// One random exercise whose ID is not in `exclude`, falling back to any
    /// exercise when every ID is excluded.
    pub fn random_excluding(&self, exclude: &[&str]) -> Option<Exercise> {
        let mut rng = rand::thread_rng();
        let candidates: Vec<&Exercise> = self
            .exercises
            .iter()
            .filter(|e| !exclude.contains(&e.id.as_str()))
            .collect();

        match candidates.choose(&mut rng) {
            Some(exercise) => Some((*exercise).clone()),
            None => self.exercises.choose(&mut rng).cloned(),
        }
    }
}

/// Errors that can occur when loading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse exercise catalog: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "Barbell_Squat": {
            "id": "Barbell_Squat",
            "name": "Barbell Squat",
            "force": "push",
            "level": "beginner",
            "mechanic": "compound",
            "equipment": "barbell",
            "primaryMuscles": ["quadriceps"],
            "secondaryMuscles": ["glutes"],
            "instructions": ["Squat down."],
            "category": "strength",
            "images": ["Barbell_Squat/0.jpg"]
        },
        "Plank": {
            "name": "Plank",
            "force": null,
            "level": "beginner",
            "mechanic": null,
            "equipment": null,
            "primaryMuscles": ["abdominals"],
            "secondaryMuscles": [],
            "instructions": [],
            "category": "strength",
            "images": []
        }
    }"#;

    #[test]
    fn test_load_from_json() {
        let catalog = ExerciseCatalog::load_from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let squat = catalog.lookup_by_id("Barbell_Squat").unwrap();
        assert_eq!(squat.primary_muscles, vec!["quadriceps"]);
        assert_eq!(squat.mechanic.as_deref(), Some("compound"));

        // Key is used when the record has no id.
        assert_eq!(catalog.lookup_by_id("Plank").unwrap().name, "Plank");
        assert!(catalog.lookup_by_id("Nope").is_none());
    }

    #[test]
    fn test_random_sample_is_distinct_and_bounded() {
        let catalog = ExerciseCatalog::load_from_json(CATALOG).unwrap();

        let sample = catalog.random_sample(5);
        assert_eq!(sample.len(), 2);
        assert_ne!(sample[0].id, sample[1].id);

        assert_eq!(catalog.random_sample(1).len(), 1);
        assert!(ExerciseCatalog::default().random_sample(3).is_empty());
    }

    #[test]
    fn test_random_excluding() {
        let catalog = ExerciseCatalog::load_from_json(CATALOG).unwrap();
        for _ in 0..10 {
            let picked = catalog.random_excluding(&["Plank"]).unwrap();
            assert_eq!(picked.id, "Barbell_Squat");
        }
        assert!(catalog
            .random_excluding(&["Plank", "Barbell_Squat"])
            .is_some());
        assert!(ExerciseCatalog::default().random_excluding(&[]).is_none());
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/exercises.json");
        let catalog = ExerciseCatalog::load_from_file(path).unwrap();
        assert!(catalog.len() >= 5);
        assert!(catalog.lookup_by_id("Barbell_Squat").is_some());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ExerciseCatalog::load_from_json("[1, 2]"),
            Err(CatalogError::ParseError(_))
        ));
    }
}
