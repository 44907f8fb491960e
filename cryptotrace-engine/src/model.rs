//! Learner progress record
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{CHAPTER_COMPLETION_MINUTES, MAX_SCORE, PLACEHOLDER_MODULE_ID};

/// Which score map a module score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Quiz,
    Simulation,
}

impl std::fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiz => write!(f, "quiz"),
            Self::Simulation => write!(f, "simulation"),
        }
    }
}

/// The learner's progress. This is the only mutable aggregate in the engine;
/// every other fact is derived from it plus the static catalog.
///
/// Collections that behave as sets are kept as vectors so the stored JSON
/// preserves completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub completed_chapters: Vec<String>,
    #[serde(default, deserialize_with = "lenient_scores")]
    pub quiz_scores: BTreeMap<String, u8>,
    #[serde(default, deserialize_with = "lenient_scores")]
    pub simulation_scores: BTreeMap<String, u8>,
    #[serde(default)]
    pub completed_exercises: Vec<String>,
    #[serde(default)]
    pub time_spent: BTreeMap<String, u32>,
    #[serde(default)]
    pub earned_badges: Vec<String>,
    /// Carried so stored records round-trip; no rule reads or writes it.
    #[serde(default)]
    pub failed_attempts: BTreeMap<String, u32>,
    #[serde(default)]
    pub last_accessed: String,
}

impl ProgressRecord {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Rejects the empty id and the literal `"undefined"` an unset module
    /// id used to serialize to.
    #[must_use]
    pub fn is_valid_module_id(module_id: &str) -> bool {
        let trimmed = module_id.trim();
        !trimmed.is_empty() && trimmed != PLACEHOLDER_MODULE_ID
    }

    #[must_use]
    pub const fn scores(&self, kind: ScoreKind) -> &BTreeMap<String, u8> {
        match kind {
            ScoreKind::Quiz => &self.quiz_scores,
            ScoreKind::Simulation => &self.simulation_scores,
        }
    }

    fn scores_mut(&mut self, kind: ScoreKind) -> &mut BTreeMap<String, u8> {
        match kind {
            ScoreKind::Quiz => &mut self.quiz_scores,
            ScoreKind::Simulation => &mut self.simulation_scores,
        }
    }

    #[must_use]
    pub fn score(&self, kind: ScoreKind, module_id: &str) -> Option<u8> {
        self.scores(kind).get(module_id).copied()
    }

    /// Stores `score` only if it beats the current best for the module.
    /// Returns whether the record changed.
    pub fn record_best_score(&mut self, kind: ScoreKind, module_id: &str, score: u8) -> bool {
        if !Self::is_valid_module_id(module_id) {
            log::warn!("ignoring {kind} score {score} for invalid module id {module_id:?}");
            return false;
        }
        let score = if score > MAX_SCORE {
            log::warn!("clamping {kind} score {score} for {module_id} to {MAX_SCORE}");
            MAX_SCORE
        } else {
            score
        };
        let scores = self.scores_mut(kind);
        match scores.get(module_id) {
            Some(&current) if current >= score => false,
            _ => {
                scores.insert(module_id.to_string(), score);
                true
            }
        }
    }

    /// Marks a chapter complete and credits its fixed study time once.
    pub fn complete_chapter(&mut self, chapter_id: &str) -> bool {
        if chapter_id.trim().is_empty() || self.has_completed_chapter(chapter_id) {
            return false;
        }
        self.completed_chapters.push(chapter_id.to_string());
        let minutes = self.time_spent.entry(chapter_id.to_string()).or_insert(0);
        *minutes = minutes.saturating_add(CHAPTER_COMPLETION_MINUTES);
        true
    }

    pub fn complete_exercise(&mut self, exercise_id: &str) -> bool {
        if exercise_id.trim().is_empty() || self.has_completed_exercise(exercise_id) {
            return false;
        }
        self.completed_exercises.push(exercise_id.to_string());
        true
    }

    /// Badges are never removed once inserted.
    pub fn insert_badge(&mut self, badge_id: &str) -> bool {
        if self.has_badge(badge_id) {
            return false;
        }
        self.earned_badges.push(badge_id.to_string());
        true
    }

    #[must_use]
    pub fn has_completed_chapter(&self, chapter_id: &str) -> bool {
        self.completed_chapters.iter().any(|c| c == chapter_id)
    }

    #[must_use]
    pub fn has_completed_exercise(&self, exercise_id: &str) -> bool {
        self.completed_exercises.iter().any(|e| e == exercise_id)
    }

    #[must_use]
    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.earned_badges.iter().any(|b| b == badge_id)
    }

    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.time_spent
            .values()
            .fold(0u32, |acc, minutes| acc.saturating_add(*minutes))
    }
}

/// Converts a JSON number into a percent score, rounding fractions and
/// clamping into `0..=100`. Anything that is not a number yields `None`.
#[must_use]
pub fn score_from_value(value: &Value) -> Option<u8> {
    if let Some(n) = value.as_u64() {
        return Some(n.min(u64::from(MAX_SCORE)) as u8);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }
    let f = value.as_f64()?;
    if !f.is_finite() {
        return None;
    }
    Some(f.round().clamp(0.0, f64::from(MAX_SCORE)) as u8)
}

/// Reads a score map out of an arbitrary JSON value, dropping entries with
/// invalid module ids or non-numeric scores.
#[must_use]
pub fn scores_from_value(value: &Value) -> BTreeMap<String, u8> {
    let Some(map) = value.as_object() else {
        if !value.is_null() {
            log::warn!("expected a score map, found {value}");
        }
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(module_id, raw)| {
            if !ProgressRecord::is_valid_module_id(module_id) {
                log::warn!("dropping stored score for invalid module id {module_id:?}");
                return None;
            }
            let score = score_from_value(raw);
            if score.is_none() {
                log::warn!("dropping non-numeric score {raw} for {module_id}");
            }
            score.map(|s| (module_id.clone(), s))
        })
        .collect()
}

fn lenient_scores<'de, D>(deserializer: D) -> Result<BTreeMap<String, u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scores_from_value(&value))
}
