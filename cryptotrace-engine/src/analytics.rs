//! Learner engagement analytics.
//!
//! A second persisted blob, independent of the progress record: a bounded
//! list of sessions with their events plus a running engagement score. The
//! blob is read once when the tracker opens and rewritten on every event.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    ANALYTICS_STORAGE_KEY, ENGAGEMENT_BADGE_EARNED, ENGAGEMENT_CHAPTER_COMPLETED,
    ENGAGEMENT_EXERCISE_COMPLETED, ENGAGEMENT_PAGE_VIEW, ENGAGEMENT_QUIZ_SUBMITTED,
    ENGAGEMENT_SIMULATION_SCORED, MAX_TRACKED_SESSIONS,
};
use crate::storage::{KeyValueStore, load_json_or_default, save_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalyticsEvent {
    PageView { page: String },
    ChapterCompleted { chapter_id: String },
    QuizSubmitted { module_id: String, score: u8 },
    SimulationScored { module_id: String, score: u8 },
    ExerciseCompleted { exercise_id: String },
    BadgeEarned { badge_id: String },
}

impl AnalyticsEvent {
    /// Key used in `eventCounts`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PageView { .. } => "pageView",
            Self::ChapterCompleted { .. } => "chapterCompleted",
            Self::QuizSubmitted { .. } => "quizSubmitted",
            Self::SimulationScored { .. } => "simulationScored",
            Self::ExerciseCompleted { .. } => "exerciseCompleted",
            Self::BadgeEarned { .. } => "badgeEarned",
        }
    }

    #[must_use]
    pub const fn weight(&self) -> u32 {
        match self {
            Self::PageView { .. } => ENGAGEMENT_PAGE_VIEW,
            Self::ChapterCompleted { .. } => ENGAGEMENT_CHAPTER_COMPLETED,
            Self::QuizSubmitted { .. } => ENGAGEMENT_QUIZ_SUBMITTED,
            Self::SimulationScored { .. } => ENGAGEMENT_SIMULATION_SCORED,
            Self::ExerciseCompleted { .. } => ENGAGEMENT_EXERCISE_COMPLETED,
            Self::BadgeEarned { .. } => ENGAGEMENT_BADGE_EARNED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEvent {
    pub at: String,
    #[serde(flatten)]
    pub event: AnalyticsEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: String,
    #[serde(default)]
    pub last_event_at: String,
    #[serde(default)]
    pub events: Vec<TrackedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsState {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub engagement_score: u32,
    #[serde(default)]
    pub event_counts: BTreeMap<String, u32>,
}

impl AnalyticsState {
    #[must_use]
    pub fn current_session(&self) -> Option<&SessionRecord> {
        self.sessions.last()
    }

    #[must_use]
    pub fn count(&self, event_name: &str) -> u32 {
        self.event_counts.get(event_name).copied().unwrap_or(0)
    }
}

pub struct AnalyticsTracker<S: KeyValueStore> {
    storage: S,
    state: AnalyticsState,
    session_open: bool,
}

impl<S: KeyValueStore> AnalyticsTracker<S> {
    pub fn load(storage: S) -> Self {
        let state = load_json_or_default(&storage, ANALYTICS_STORAGE_KEY);
        Self {
            storage,
            state,
            session_open: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AnalyticsState {
        &self.state
    }

    #[must_use]
    pub const fn engagement_score(&self) -> u32 {
        self.state.engagement_score
    }

    pub fn start_session(&mut self) -> String {
        self.start_session_at(Utc::now())
    }

    /// Open a new session stamped `now`. The oldest sessions are dropped once
    /// the list exceeds its cap.
    pub fn start_session_at(&mut self, now: DateTime<Utc>) -> String {
        let id = format!("session-{}", now.timestamp_millis());
        let stamp = now.to_rfc3339();
        self.state.sessions.push(SessionRecord {
            id: id.clone(),
            started_at: stamp.clone(),
            last_event_at: stamp,
            events: Vec::new(),
        });
        let overflow = self.state.sessions.len().saturating_sub(MAX_TRACKED_SESSIONS);
        if overflow > 0 {
            self.state.sessions.drain(..overflow);
        }
        self.session_open = true;
        self.persist();
        log::debug!("analytics session {id} started");
        id
    }

    pub fn track(&mut self, event: AnalyticsEvent) {
        self.track_at(event, Utc::now());
    }

    /// Record `event` in the current session, opening one if this tracker
    /// has not started a session yet.
    pub fn track_at(&mut self, event: AnalyticsEvent, now: DateTime<Utc>) {
        if !self.session_open {
            self.start_session_at(now);
        }
        let stamp = now.to_rfc3339();
        self.state.engagement_score = self.state.engagement_score.saturating_add(event.weight());
        *self
            .state
            .event_counts
            .entry(event.name().to_string())
            .or_insert(0) += 1;
        if let Some(session) = self.state.sessions.last_mut() {
            session.last_event_at.clone_from(&stamp);
            session.events.push(TrackedEvent { at: stamp, event });
        }
        self.persist();
    }

    pub fn reset(&mut self) {
        self.state = AnalyticsState::default();
        self.session_open = false;
        if let Err(err) = self.storage.remove(ANALYTICS_STORAGE_KEY) {
            log::error!("failed to clear analytics: {err}");
        }
    }

    fn persist(&self) {
        save_json(&self.storage, ANALYTICS_STORAGE_KEY, &self.state);
    }
}
