//! JavaScript-facing handle over the progress store.
//!
//! The presentation layer owns one `ProgressHandle` for the page lifetime and
//! calls into it on every learner action; it re-renders from the returned
//! views rather than from any shared global state.

use cryptotrace_engine::model::score_from_value;
use cryptotrace_engine::{
    AnalyticsEvent, AnalyticsTracker, CatalogLoader, Identity, ProgressRecord, ProgressStore,
    ProgressUpdate, QuizAttempt, QuizQuestion, SYNC_CONFIG_NAME, SyncConfig, open_store,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::loader::WebCatalogLoader;
use crate::remote::{self, FetchRemote};
use crate::storage::LocalStore;

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

fn parse_identity(email: &str) -> Result<Identity, JsValue> {
    Identity::parse(email).ok_or_else(|| js_err(format!("not an email address: {email:?}")))
}

fn sync_config() -> Result<SyncConfig, JsValue> {
    WebCatalogLoader
        .load_config(SYNC_CONFIG_NAME)
        .map_err(js_err)
}

fn score_from_js(score: f64) -> Option<u8> {
    let parsed = score_from_value(&serde_json::Value::from(score));
    if parsed.is_none() {
        log::warn!("ignoring non-numeric score {score}");
    }
    parsed
}

#[wasm_bindgen]
pub struct ProgressHandle {
    store: ProgressStore<LocalStore, FetchRemote>,
    analytics: AnalyticsTracker<LocalStore>,
    active_quiz: Option<(String, QuizAttempt)>,
}

#[wasm_bindgen]
impl ProgressHandle {
    /// Open the store over `localStorage` and start an analytics session.
    ///
    /// # Errors
    /// Returns an error if the bundled catalog or config is invalid.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsValue> {
        let remote = FetchRemote::new(sync_config()?);
        let store = open_store(&WebCatalogLoader, LocalStore, remote)
            .map_err(|err| js_err(format!("{err:#}")))?;
        let mut analytics = AnalyticsTracker::load(LocalStore);
        analytics.start_session();
        Ok(Self {
            store,
            analytics,
            active_quiz: None,
        })
    }

    /// Current progress record as a plain object.
    ///
    /// # Errors
    /// Returns an error if the record cannot be converted.
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(self.store.record())
    }

    /// The course catalog as a plain object.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be converted.
    pub fn catalog(&self) -> Result<JsValue, JsValue> {
        to_js(self.store.catalog())
    }

    #[wasm_bindgen(js_name = updateQuizScore)]
    pub fn update_quiz_score(&mut self, module_id: &str, score: f64) -> Result<JsValue, JsValue> {
        let Some(score) = score_from_js(score) else {
            return to_js(&ProgressUpdate::default());
        };
        let update = self.store.update_quiz_score(module_id, score);
        if ProgressRecord::is_valid_module_id(module_id) {
            self.analytics.track(AnalyticsEvent::QuizSubmitted {
                module_id: module_id.to_string(),
                score,
            });
        }
        self.finish(&update)
    }

    #[wasm_bindgen(js_name = updateSimulationScore)]
    pub fn update_simulation_score(
        &mut self,
        module_id: &str,
        score: f64,
    ) -> Result<JsValue, JsValue> {
        let Some(score) = score_from_js(score) else {
            return to_js(&ProgressUpdate::default());
        };
        let update = self.store.update_simulation_score(module_id, score);
        if ProgressRecord::is_valid_module_id(module_id) {
            self.analytics.track(AnalyticsEvent::SimulationScored {
                module_id: module_id.to_string(),
                score,
            });
        }
        self.finish(&update)
    }

    #[wasm_bindgen(js_name = completeChapter)]
    pub fn complete_chapter(&mut self, chapter_id: &str) -> Result<JsValue, JsValue> {
        let update = self.store.complete_chapter(chapter_id);
        if update.changed {
            self.analytics.track(AnalyticsEvent::ChapterCompleted {
                chapter_id: chapter_id.to_string(),
            });
        }
        self.finish(&update)
    }

    #[wasm_bindgen(js_name = completeExercise)]
    pub fn complete_exercise(&mut self, exercise_id: &str) -> Result<JsValue, JsValue> {
        let update = self.store.complete_exercise(exercise_id);
        if update.changed {
            self.analytics.track(AnalyticsEvent::ExerciseCompleted {
                exercise_id: exercise_id.to_string(),
            });
        }
        self.finish(&update)
    }

    /// Begin a quiz attempt, replacing any unfinished one.
    ///
    /// # Errors
    /// Returns an error if `questions` is not a list of quiz questions.
    #[wasm_bindgen(js_name = startQuiz)]
    pub fn start_quiz(&mut self, module_id: &str, questions: JsValue) -> Result<(), JsValue> {
        let questions: Vec<QuizQuestion> =
            serde_wasm_bindgen::from_value(questions).map_err(js_err)?;
        self.active_quiz = Some((module_id.to_string(), QuizAttempt::new(questions)));
        Ok(())
    }

    /// Lock in an answer. Returns whether every question is now answered.
    ///
    /// # Errors
    /// Returns an error if no quiz is running, the indices are out of range,
    /// or the question was already answered.
    #[wasm_bindgen(js_name = selectAnswer)]
    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<bool, JsValue> {
        let (_, attempt) = self
            .active_quiz
            .as_mut()
            .ok_or_else(|| js_err("no quiz in progress"))?;
        attempt.select(question, option).map_err(js_err)?;
        Ok(attempt.is_complete())
    }

    /// Report the running attempt's score and end it.
    ///
    /// # Errors
    /// Returns an error if no quiz is running or it is not fully answered.
    #[wasm_bindgen(js_name = submitQuiz)]
    pub fn submit_quiz(&mut self) -> Result<JsValue, JsValue> {
        let (module_id, mut attempt) = self
            .active_quiz
            .take()
            .ok_or_else(|| js_err("no quiz in progress"))?;
        if !attempt.is_complete() {
            self.active_quiz = Some((module_id, attempt));
            return Err(js_err("quiz has unanswered questions"));
        }
        self.submit_attempt(&module_id, &mut attempt)
    }

    /// Score a quiz from the host's own selection list (`-1` for unset).
    /// Incomplete attempts report nothing.
    ///
    /// # Errors
    /// Returns an error if the questions or selections are malformed.
    #[wasm_bindgen(js_name = submitQuizSelections)]
    pub fn submit_quiz_selections(
        &mut self,
        module_id: &str,
        questions: JsValue,
        selections: Vec<i32>,
    ) -> Result<JsValue, JsValue> {
        let questions: Vec<QuizQuestion> =
            serde_wasm_bindgen::from_value(questions).map_err(js_err)?;
        let mut attempt = QuizAttempt::from_raw_selections(questions, &selections).map_err(js_err)?;
        self.submit_attempt(module_id, &mut attempt)
    }

    /// Sign in (`email`) or out (`undefined`). Returns whether sync is on.
    #[wasm_bindgen(js_name = setIdentity)]
    pub fn set_identity(&mut self, email: Option<String>) -> bool {
        self.store.set_identity(email.as_deref())
    }

    #[must_use]
    pub fn identity(&self) -> Option<String> {
        self.store.identity().map(|id| id.email().to_string())
    }

    /// Merge a server record (see `fetchRemoteRecord`) into local progress.
    ///
    /// # Errors
    /// Returns an error if `remote` is not a progress record.
    pub fn reconcile(&mut self, email: &str, remote: JsValue) -> Result<JsValue, JsValue> {
        let remote: ProgressRecord = serde_wasm_bindgen::from_value(remote).map_err(js_err)?;
        let update = self.store.reconcile_with_remote(email, &remote);
        self.finish(&update)
    }

    /// Replace local progress with a server record.
    ///
    /// # Errors
    /// Returns an error if `remote` is not a progress record.
    #[wasm_bindgen(js_name = replaceWithRemote)]
    pub fn replace_with_remote(&mut self, remote: JsValue) -> Result<JsValue, JsValue> {
        let remote: ProgressRecord = serde_wasm_bindgen::from_value(remote).map_err(js_err)?;
        let update = self.store.replace_with_remote(remote);
        self.finish(&update)
    }

    /// Wipe progress and analytics.
    pub fn reset(&mut self) {
        self.store.reset();
        self.analytics.reset();
        self.active_quiz = None;
    }

    #[wasm_bindgen(js_name = completionPercent)]
    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        self.store.completion_percent()
    }

    #[wasm_bindgen(js_name = isCourseComplete)]
    #[must_use]
    pub fn is_course_complete(&self) -> bool {
        self.store.is_course_complete()
    }

    #[wasm_bindgen(js_name = averageScore)]
    #[must_use]
    pub fn average_score(&self) -> Option<u8> {
        self.store.average_score()
    }

    #[wasm_bindgen(js_name = badgeProgress)]
    #[must_use]
    pub fn badge_progress(&self, badge_id: &str) -> Option<u8> {
        self.store.badge_progress(badge_id)
    }

    #[wasm_bindgen(js_name = eligibleCertificates)]
    #[must_use]
    pub fn eligible_certificates(&self) -> Vec<String> {
        self.store
            .eligible_certificates()
            .into_iter()
            .map(|cert| cert.id.clone())
            .collect()
    }

    #[wasm_bindgen(js_name = completedMilestones)]
    #[must_use]
    pub fn completed_milestones(&self) -> Vec<String> {
        self.store
            .completed_milestones()
            .into_iter()
            .map(|milestone| milestone.id.clone())
            .collect()
    }

    #[wasm_bindgen(js_name = totalPoints)]
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.store.total_points()
    }

    #[wasm_bindgen(js_name = nextChapter)]
    #[must_use]
    pub fn next_chapter(&self, chapter_id: &str) -> Option<String> {
        self.store
            .catalog()
            .next_chapter(chapter_id)
            .map(|chapter| chapter.id.clone())
    }

    #[wasm_bindgen(js_name = previousChapter)]
    #[must_use]
    pub fn previous_chapter(&self, chapter_id: &str) -> Option<String> {
        self.store
            .catalog()
            .previous_chapter(chapter_id)
            .map(|chapter| chapter.id.clone())
    }

    #[wasm_bindgen(js_name = trackPageView)]
    pub fn track_page_view(&mut self, page: &str) {
        self.analytics.track(AnalyticsEvent::PageView {
            page: page.to_string(),
        });
    }

    #[wasm_bindgen(js_name = engagementScore)]
    #[must_use]
    pub fn engagement_score(&self) -> u32 {
        self.analytics.engagement_score()
    }

    /// Analytics blob as a plain object.
    ///
    /// # Errors
    /// Returns an error if the state cannot be converted.
    pub fn analytics(&self) -> Result<JsValue, JsValue> {
        to_js(self.analytics.state())
    }

    #[wasm_bindgen(js_name = exportJson)]
    #[must_use]
    pub fn export_json(&self) -> String {
        self.store.export_json()
    }

    fn submit_attempt(
        &mut self,
        module_id: &str,
        attempt: &mut QuizAttempt,
    ) -> Result<JsValue, JsValue> {
        let score = attempt.final_score();
        let update = self.store.submit_quiz(module_id, attempt);
        if let Some(score) = score
            && ProgressRecord::is_valid_module_id(module_id)
        {
            self.analytics.track(AnalyticsEvent::QuizSubmitted {
                module_id: module_id.to_string(),
                score,
            });
        }
        self.finish(&update)
    }

    fn finish(&mut self, update: &ProgressUpdate) -> Result<JsValue, JsValue> {
        for badge_id in &update.new_badges {
            self.analytics.track(AnalyticsEvent::BadgeEarned {
                badge_id: badge_id.clone(),
            });
        }
        to_js(update)
    }
}

/// Load the learner's progress from the server.
///
/// # Errors
/// Rejects if the email is malformed or no progress bucket could be read.
#[wasm_bindgen(js_name = fetchRemoteRecord)]
pub async fn fetch_remote_record(email: String) -> Result<JsValue, JsValue> {
    let identity = parse_identity(&email)?;
    let record = remote::fetch_remote_record(&sync_config()?, &identity)
        .await
        .map_err(js_err)?;
    to_js(&record)
}

/// Ask the server whether the learner has completed the course.
///
/// # Errors
/// Rejects if the email is malformed or the request fails.
#[wasm_bindgen(js_name = fetchCompletion)]
pub async fn fetch_completion(email: String) -> Result<JsValue, JsValue> {
    let identity = parse_identity(&email)?;
    let status = remote::fetch_completion(&sync_config()?, &identity)
        .await
        .map_err(js_err)?;
    to_js(&status)
}
