//! Progress store: the single writer of the learner's progress record.
//!
//! Every mutation runs the same sequence: apply the change, run the badge
//! auto-award pass, persist locally, then (when a learner is signed in) push
//! the record and changed badge progress to the remote collaborator and
//! request the course certificate the first time the course is complete.
//! Local persistence is synchronous; remote calls are detached and can fail
//! without affecting local state.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::{Catalog, Certificate, Milestone};
use crate::config::SyncConfig;
use crate::constants::PROGRESS_STORAGE_KEY;
use crate::eligibility::{
    average_score, award_badges, badge_progress_percent, completed_milestones,
    eligible_certificates, is_course_complete, overall_completion_percent,
};
use crate::identity::Identity;
use crate::merge::reconcile;
use crate::model::{ProgressRecord, ScoreKind};
use crate::quiz::QuizAttempt;
use crate::remote::{CertificateRequest, ProgressRemote, badge_telemetry_request, sync_requests};
use crate::storage::{KeyValueStore, load_json_or_default, save_json};

/// What a store operation changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Whether the record changed at all.
    pub changed: bool,
    /// Badges added by the auto-award pass.
    pub new_badges: Vec<String>,
    /// Whether this operation made the course complete.
    pub course_completed: bool,
}

impl ProgressUpdate {
    const fn unchanged() -> Self {
        Self {
            changed: false,
            new_badges: Vec::new(),
            course_completed: false,
        }
    }
}

pub struct ProgressStore<S, R>
where
    S: KeyValueStore,
    R: ProgressRemote,
{
    storage: S,
    remote: R,
    catalog: Catalog,
    config: SyncConfig,
    record: ProgressRecord,
    identity: Option<Identity>,
    certificate_requested: bool,
}

impl<S, R> ProgressStore<S, R>
where
    S: KeyValueStore,
    R: ProgressRemote,
{
    /// Open the store over previously persisted progress, or an empty record
    /// when nothing usable is stored.
    pub fn load(storage: S, remote: R, catalog: Catalog, config: SyncConfig) -> Self {
        let record = Self::load_record(&storage);
        Self {
            storage,
            remote,
            catalog,
            config,
            record,
            identity: None,
            certificate_requested: false,
        }
    }

    /// Read the persisted record. Missing or corrupt data yields the empty
    /// record.
    pub fn load_record(storage: &S) -> ProgressRecord {
        load_json_or_default(storage, PROGRESS_STORAGE_KEY)
    }

    #[must_use]
    pub const fn record(&self) -> &ProgressRecord {
        &self.record
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Sign a learner in (or out with `None`). A malformed email is logged
    /// and leaves the store signed out. Returns whether an identity is set.
    pub fn set_identity(&mut self, email: Option<&str>) -> bool {
        let next = email.and_then(|raw| {
            let parsed = Identity::parse(raw);
            if parsed.is_none() {
                log::warn!("ignoring malformed identity {raw:?}; remote sync disabled");
            }
            parsed
        });
        if next != self.identity {
            self.certificate_requested = false;
        }
        self.identity = next;
        self.maybe_request_certificate();
        self.identity.is_some()
    }

    pub fn update_quiz_score(&mut self, module_id: &str, score: u8) -> ProgressUpdate {
        self.apply(|record| record.record_best_score(ScoreKind::Quiz, module_id, score))
    }

    pub fn update_simulation_score(&mut self, module_id: &str, score: u8) -> ProgressUpdate {
        self.apply(|record| record.record_best_score(ScoreKind::Simulation, module_id, score))
    }

    pub fn complete_chapter(&mut self, chapter_id: &str) -> ProgressUpdate {
        self.apply(|record| record.complete_chapter(chapter_id))
    }

    pub fn complete_exercise(&mut self, exercise_id: &str) -> ProgressUpdate {
        self.apply(|record| record.complete_exercise(exercise_id))
    }

    /// Report a finished quiz attempt. The attempt hands out its score only
    /// once, so resubmitting the same attempt is a no-op.
    pub fn submit_quiz(&mut self, module_id: &str, attempt: &mut QuizAttempt) -> ProgressUpdate {
        if !ProgressRecord::is_valid_module_id(module_id) {
            log::warn!("ignoring quiz submission for invalid module id {module_id:?}");
            return ProgressUpdate::unchanged();
        }
        match attempt.take_score() {
            Some(score) => self.update_quiz_score(module_id, score),
            None => ProgressUpdate::unchanged(),
        }
    }

    /// Run the auto-award pass on its own. Idempotent.
    pub fn award_badges(&mut self) -> ProgressUpdate {
        self.apply(|_| false)
    }

    /// Wipe progress in memory and in local storage.
    pub fn reset(&mut self) {
        self.record = ProgressRecord::empty();
        self.certificate_requested = false;
        if let Err(err) = self.storage.remove(PROGRESS_STORAGE_KEY) {
            log::error!("failed to clear stored progress: {err}");
        }
        log::info!("progress reset");
    }

    /// Merge server progress for `email` into the local record (see
    /// [`crate::merge`]). Re-running with the same remote record changes
    /// nothing.
    pub fn reconcile_with_remote(&mut self, email: &str, remote: &ProgressRecord) -> ProgressUpdate {
        if !self.set_identity(Some(email)) {
            return ProgressUpdate::unchanged();
        }
        let merged = reconcile(&self.record, remote);
        self.apply_untouched(|record| {
            if *record == merged {
                false
            } else {
                *record = merged;
                true
            }
        })
    }

    /// Discard local progress and adopt the server's record, as when a new
    /// access grant supersedes whatever this browser had.
    pub fn replace_with_remote(&mut self, remote: ProgressRecord) -> ProgressUpdate {
        self.reset();
        self.apply_untouched(|record| {
            *record = remote;
            true
        })
    }

    /// Push the full record to the remote store, if signed in.
    pub fn push(&self) {
        let Some(identity) = &self.identity else {
            log::debug!("not signed in; skipping remote push");
            return;
        };
        for request in sync_requests(identity.email(), &self.record) {
            self.remote.save(request);
        }
    }

    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        overall_completion_percent(&self.record, &self.catalog.chapters)
    }

    #[must_use]
    pub fn is_course_complete(&self) -> bool {
        is_course_complete(&self.record, &self.catalog.chapters, self.catalog.badges())
    }

    #[must_use]
    pub fn average_score(&self) -> Option<u8> {
        average_score(&self.record)
    }

    #[must_use]
    pub fn badge_progress(&self, badge_id: &str) -> Option<u8> {
        self.catalog
            .badge(badge_id)
            .map(|badge| badge_progress_percent(&self.record, badge))
    }

    #[must_use]
    pub fn eligible_certificates(&self) -> Vec<&Certificate> {
        eligible_certificates(&self.record, &self.catalog.certificates)
    }

    #[must_use]
    pub fn completed_milestones(&self) -> Vec<&Milestone> {
        completed_milestones(&self.record, &self.catalog.milestones)
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.catalog.total_points(&self.record.earned_badges)
    }

    /// Pretty-printed record for the learner's data export.
    #[must_use]
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.record).unwrap_or_else(|err| {
            log::error!("failed to export progress: {err}");
            String::from("{}")
        })
    }

    fn badge_percentages(&self) -> BTreeMap<String, u8> {
        self.catalog
            .badges()
            .map(|badge| (badge.id.clone(), badge_progress_percent(&self.record, badge)))
            .collect()
    }

    fn apply(&mut self, mutate: impl FnOnce(&mut ProgressRecord) -> bool) -> ProgressUpdate {
        self.commit(mutate, true)
    }

    fn apply_untouched(&mut self, mutate: impl FnOnce(&mut ProgressRecord) -> bool) -> ProgressUpdate {
        self.commit(mutate, false)
    }

    fn commit(
        &mut self,
        mutate: impl FnOnce(&mut ProgressRecord) -> bool,
        touch: bool,
    ) -> ProgressUpdate {
        let badges_before = self.badge_percentages();
        let was_complete = self.is_course_complete();

        let mutated = mutate(&mut self.record);
        let new_badges = award_badges(&mut self.record, self.catalog.badges());
        if !mutated && new_badges.is_empty() {
            return ProgressUpdate::unchanged();
        }
        for id in &new_badges {
            log::info!("badge earned: {id}");
        }
        if touch {
            self.record.last_accessed = chrono::Utc::now().to_rfc3339();
        }

        save_json(&self.storage, PROGRESS_STORAGE_KEY, &self.record);
        self.push();
        self.push_badge_telemetry(&badges_before);

        let course_completed = !was_complete && self.is_course_complete();
        if course_completed {
            log::info!("course complete");
        }
        self.maybe_request_certificate();

        ProgressUpdate {
            changed: true,
            new_badges,
            course_completed,
        }
    }

    fn push_badge_telemetry(&self, before: &BTreeMap<String, u8>) {
        let Some(identity) = &self.identity else {
            return;
        };
        for (badge_id, percent) in self.badge_percentages() {
            if before.get(&badge_id) != Some(&percent) {
                self.remote
                    .save(badge_telemetry_request(identity.email(), &badge_id, percent));
            }
        }
    }

    fn maybe_request_certificate(&mut self) {
        if self.certificate_requested || !self.is_course_complete() {
            return;
        }
        let Some(identity) = &self.identity else {
            return;
        };
        let request = CertificateRequest {
            email: identity.email().to_string(),
            course_name: self.config.course_name.clone(),
            score: self.average_score().unwrap_or(0),
        };
        log::info!("requesting certificate for {}", request.email);
        self.remote.request_certificate(request);
        self.certificate_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Badge, BadgeTier, Chapter, ChapterIcon, Requirement};
    use crate::remote::{RecordingRemote, RemoteCall};
    use crate::storage::MemoryStore;

    fn catalog() -> Catalog {
        Catalog {
            chapters: vec![Chapter {
                id: "intro".into(),
                title: "Introduction".into(),
                description: String::new(),
                icon: ChapterIcon::BookOpen,
                badges: vec![Badge {
                    id: "b1".into(),
                    name: "First Trace".into(),
                    description: String::new(),
                    tier: BadgeTier::Bronze,
                    points: 10,
                    requirements: vec![
                        Requirement::quiz("intro", 80),
                        Requirement::simulation("intro", 50),
                    ],
                }],
            }],
            ..Catalog::empty()
        }
    }

    fn open(storage: &MemoryStore, remote: &RecordingRemote) -> ProgressStore<MemoryStore, RecordingRemote> {
        ProgressStore::load(
            storage.clone(),
            remote.clone(),
            catalog(),
            SyncConfig::default(),
        )
    }

    #[test]
    fn mutations_write_through_to_storage() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        assert!(store.update_quiz_score("intro", 85).changed);
        assert!(!store.record().last_accessed.is_empty());

        let reopened = open(&storage, &remote);
        assert_eq!(reopened.record(), store.record());
    }

    #[test]
    fn no_remote_calls_without_identity() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.complete_chapter("intro");
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn signed_in_mutation_pushes_buckets_and_badge_telemetry() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        assert!(store.set_identity(Some("Ana@Example.com")));
        store.update_quiz_score("intro", 90);

        let ids: Vec<String> = remote.saves().into_iter().map(|s| s.module_id).collect();
        assert_eq!(ids, vec!["overall", "quizzes", "simulations", "badge_b1"]);
        assert_eq!(remote.saves()[0].email, "ana@example.com");
        assert_eq!(remote.saves()[3].progress["progress"], 50);
    }

    #[test]
    fn unchanged_update_is_silent() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.set_identity(Some("ana@example.com"));
        store.update_quiz_score("intro", 90);
        remote.clear();
        assert_eq!(store.update_quiz_score("intro", 70), ProgressUpdate::default());
        assert_eq!(store.update_quiz_score("undefined", 99), ProgressUpdate::default());
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn certificate_is_requested_once_when_course_completes() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.set_identity(Some("ana@example.com"));
        store.update_quiz_score("intro", 90);
        store.complete_chapter("intro");
        assert!(remote.certificate_requests().is_empty());

        let update = store.update_simulation_score("intro", 70);
        assert_eq!(update.new_badges, vec!["b1"]);
        assert!(update.course_completed);
        let requests = remote.certificate_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].score, 80);
        assert_eq!(requests[0].course_name, SyncConfig::default().course_name);

        store.update_simulation_score("intro", 95);
        assert_eq!(remote.certificate_requests().len(), 1);
    }

    #[test]
    fn signing_in_after_completion_requests_certificate() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.update_quiz_score("intro", 90);
        store.update_simulation_score("intro", 90);
        store.complete_chapter("intro");
        assert!(store.is_course_complete());
        assert!(remote.calls().is_empty());

        store.set_identity(Some("ana@example.com"));
        assert!(matches!(remote.calls().as_slice(), [RemoteCall::Certificate(_)]));
    }

    #[test]
    fn malformed_identity_disables_sync() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        assert!(!store.set_identity(Some("undefined")));
        store.complete_chapter("intro");
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn reset_clears_memory_and_storage() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.complete_chapter("intro");
        assert!(storage.contains(PROGRESS_STORAGE_KEY));
        store.reset();
        assert!(store.record().is_empty());
        assert!(!storage.contains(PROGRESS_STORAGE_KEY));
    }

    #[test]
    fn corrupt_storage_loads_empty_record() {
        let storage = MemoryStore::new();
        storage.insert_raw(PROGRESS_STORAGE_KEY, "\u{0}garbage");
        let store = open(&storage, &RecordingRemote::new());
        assert!(store.record().is_empty());
    }

    #[test]
    fn reconcile_merges_awards_and_is_idempotent() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.update_quiz_score("intro", 85);

        let mut server = ProgressRecord::empty();
        server.simulation_scores.insert("intro".into(), 60);
        server.completed_chapters.push("intro".into());

        let update = store.reconcile_with_remote("ana@example.com", &server);
        assert!(update.changed);
        assert_eq!(update.new_badges, vec!["b1"]);
        assert!(store.record().has_completed_chapter("intro"));

        let calls = remote.calls().len();
        let again = store.reconcile_with_remote("ana@example.com", &server);
        assert!(!again.changed);
        assert_eq!(remote.calls().len(), calls);
    }

    #[test]
    fn reconcile_with_bad_identity_is_ignored() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        let mut server = ProgressRecord::empty();
        server.completed_chapters.push("intro".into());
        assert!(!store.reconcile_with_remote("", &server).changed);
        assert!(store.record().is_empty());
    }

    #[test]
    fn replace_with_remote_drops_local_only_progress() {
        let storage = MemoryStore::new();
        let remote = RecordingRemote::new();
        let mut store = open(&storage, &remote);
        store.complete_exercise("local-only");

        let mut server = ProgressRecord::empty();
        server.completed_chapters.push("intro".into());
        store.replace_with_remote(server.clone());
        assert_eq!(store.record(), &server);
        assert_eq!(ProgressStore::<MemoryStore, RecordingRemote>::load_record(&storage), server);
    }

    #[test]
    fn submit_quiz_reports_score_once() {
        use crate::quiz::QuizQuestion;
        let storage = MemoryStore::new();
        let mut store = open(&storage, &RecordingRemote::new());
        let question = QuizQuestion {
            prompt: String::new(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 1,
        };
        let mut attempt =
            QuizAttempt::from_raw_selections(vec![question.clone(), question], &[1, 0]).unwrap();
        assert!(store.submit_quiz("intro", &mut attempt).changed);
        assert_eq!(store.record().score(ScoreKind::Quiz, "intro"), Some(50));
        assert!(!store.submit_quiz("intro", &mut attempt).changed);
    }

    #[test]
    fn derived_views_follow_the_record() {
        let storage = MemoryStore::new();
        let mut store = open(&storage, &RecordingRemote::new());
        assert_eq!(store.completion_percent(), 0);
        assert_eq!(store.badge_progress("b1"), Some(0));
        assert_eq!(store.badge_progress("ghost"), None);
        store.update_quiz_score("intro", 80);
        assert_eq!(store.badge_progress("b1"), Some(50));
        store.complete_chapter("intro");
        assert_eq!(store.completion_percent(), 100);
        assert_eq!(store.total_points(), 0);
        assert!(store.export_json().contains("\"quizScores\""));
    }
}
