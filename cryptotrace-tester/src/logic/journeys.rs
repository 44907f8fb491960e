//! Scripted learner journeys run against an in-memory progress store.
//!
//! Every journey is deterministic for a given seed so a failing iteration
//! can be replayed with `--seeds`.

use anyhow::{Context, Result, ensure};
use cryptotrace_engine::constants::{ANALYTICS_STORAGE_KEY, PROGRESS_STORAGE_KEY};
use cryptotrace_engine::{
    AnalyticsTracker, Badge, BadgeTier, Catalog, Certificate, CertificateRequirements, Chapter,
    ChapterIcon, MemoryStore, ProgressRecord, ProgressStore, RecordingRemote, Requirement,
    RequirementKind, ScoreKind, SyncConfig, is_certificate_eligible,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::common::scenario::JourneyCtx;

const LEARNER: &str = "qa.learner@example.com";

type TestStore = ProgressStore<MemoryStore, RecordingRemote>;

fn open(catalog: &Catalog) -> (TestStore, MemoryStore, RecordingRemote) {
    let storage = MemoryStore::new();
    let remote = RecordingRemote::new();
    let store = ProgressStore::load(
        storage.clone(),
        remote.clone(),
        catalog.clone(),
        SyncConfig::default(),
    );
    (store, storage, remote)
}

fn rng_for(ctx: &JourneyCtx<'_>) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(ctx.seed)
}

fn chapter_ids(catalog: &Catalog) -> Vec<String> {
    catalog
        .chapter_ids()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn exercise_ids(catalog: &Catalog) -> Vec<String> {
    let mut ids: Vec<String> = catalog
        .badges()
        .flat_map(|badge| badge.requirements.iter())
        .filter(|req| req.kind == RequirementKind::Exercise)
        .map(|req| req.module_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Record with list order and the access timestamp stripped, for comparing
/// outcomes of differently ordered action sequences.
fn normalized(record: &ProgressRecord) -> ProgressRecord {
    let mut record = record.clone();
    record.completed_chapters.sort();
    record.completed_exercises.sort();
    record.earned_badges.sort();
    record.last_accessed.clear();
    record
}

pub fn smoke(ctx: &JourneyCtx<'_>) -> Result<()> {
    let (mut store, storage, _) = open(ctx.catalog);
    let first = ctx
        .catalog
        .chapters
        .first()
        .context("catalog has no chapters")?
        .id
        .clone();

    let update = store.update_quiz_score(&first, 100);
    ensure!(update.changed, "first quiz score should change the record");
    ensure!(
        store.record().score(ScoreKind::Quiz, &first) == Some(100),
        "quiz score was not stored"
    );
    let persisted = TestStore::load_record(&storage);
    ensure!(
        persisted == *store.record(),
        "persisted record differs from the in-memory record"
    );
    ensure!(
        !store.record().last_accessed.is_empty(),
        "lastAccessed should be stamped on mutation"
    );
    Ok(())
}

fn single_chapter_catalog() -> Catalog {
    Catalog {
        chapters: vec![Chapter {
            id: "intro".to_string(),
            title: "Introduction".to_string(),
            description: String::new(),
            icon: ChapterIcon::BookOpen,
            badges: vec![Badge {
                id: "B1".to_string(),
                name: "First Badge".to_string(),
                description: String::new(),
                tier: BadgeTier::Bronze,
                points: 10,
                requirements: vec![Requirement::quiz("intro", 80)],
            }],
        }],
        certificates: vec![Certificate {
            id: "C1".to_string(),
            title: "Certificate".to_string(),
            description: String::new(),
            requirements: CertificateRequirements {
                min_badges: 1,
                required_badges: vec!["B1".to_string()],
                min_total_score: 80,
            },
        }],
        milestones: Vec::new(),
    }
}

pub fn end_to_end(_ctx: &JourneyCtx<'_>) -> Result<()> {
    let catalog = single_chapter_catalog();
    let (mut store, _, _) = open(&catalog);
    store.update_quiz_score("intro", 85);
    store.complete_chapter("intro");
    store.award_badges();

    ensure!(
        store.record().earned_badges == vec!["B1".to_string()],
        "expected earnedBadges = [B1], got {:?}",
        store.record().earned_badges
    );
    let certificate = catalog.certificate("C1").context("C1 missing")?;
    ensure!(
        is_certificate_eligible(store.record(), certificate),
        "C1 should be eligible"
    );
    ensure!(
        store.completion_percent() == 100,
        "completion should be 100%, got {}",
        store.completion_percent()
    );
    Ok(())
}

pub fn monotonic_scores(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let chapters = chapter_ids(ctx.catalog);
    let module = chapters.choose(&mut rng).context("catalog has no chapters")?;
    let (mut store, _, _) = open(ctx.catalog);

    let mut best_quiz = None;
    let mut best_simulation = None;
    for _ in 0..20 {
        let quiz: u8 = rng.gen_range(0..=100);
        let simulation: u8 = rng.gen_range(0..=100);
        store.update_quiz_score(module, quiz);
        store.update_simulation_score(module, simulation);
        best_quiz = best_quiz.max(Some(quiz));
        best_simulation = best_simulation.max(Some(simulation));
        ensure!(
            store.record().score(ScoreKind::Quiz, module) == best_quiz,
            "quiz score for {module} dropped below the best seen"
        );
    }
    ensure!(
        store.record().score(ScoreKind::Simulation, module) == best_simulation,
        "simulation score for {module} is not the best seen"
    );
    Ok(())
}

fn satisfy(store: &mut TestStore, badge: &Badge) {
    for req in &badge.requirements {
        match req.kind {
            RequirementKind::Quiz => {
                store.update_quiz_score(&req.module_id, 100);
            }
            RequirementKind::Simulation => {
                store.update_simulation_score(&req.module_id, 100);
            }
            RequirementKind::Exercise => {
                store.complete_exercise(&req.module_id);
            }
        }
    }
}

pub fn sticky_badges(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let scored: Vec<&Badge> = ctx
        .catalog
        .badges()
        .filter(|badge| badge.requirements.iter().any(|req| req.kind.score_kind().is_some()))
        .collect();
    let badge = *scored.choose(&mut rng).context("catalog has no score badges")?;
    let (mut store, _, _) = open(ctx.catalog);

    satisfy(&mut store, badge);
    ensure!(store.record().has_badge(&badge.id), "{} was not awarded", badge.id);

    // A server copy with failing scores wins the score maps on reconcile.
    let mut remote = ProgressRecord::empty();
    for req in &badge.requirements {
        if let Some(kind) = req.kind.score_kind() {
            let low = rng.gen_range(0..req.threshold.max(1));
            match kind {
                ScoreKind::Quiz => remote.quiz_scores.insert(req.module_id.clone(), low),
                ScoreKind::Simulation => {
                    remote.simulation_scores.insert(req.module_id.clone(), low)
                }
            };
        }
    }
    store.reconcile_with_remote(LEARNER, &remote);
    ensure!(
        store.record().has_badge(&badge.id),
        "{} was revoked after lower remote scores",
        badge.id
    );
    ensure!(
        store.badge_progress(&badge.id) == Some(100),
        "earned badge {} should report 100%",
        badge.id
    );
    Ok(())
}

fn complete_course(store: &mut TestStore, catalog: &Catalog, skip_simulation: Option<&str>) {
    for exercise in exercise_ids(catalog) {
        store.complete_exercise(&exercise);
    }
    for id in chapter_ids(catalog) {
        store.update_quiz_score(&id, 100);
        if skip_simulation != Some(id.as_str()) {
            store.update_simulation_score(&id, 100);
        }
        store.complete_chapter(&id);
    }
}

pub fn course_strictness(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let chapters = chapter_ids(ctx.catalog);
    let missing = chapters.choose(&mut rng).context("catalog has no chapters")?;
    let (mut store, _, remote) = open(ctx.catalog);
    store.set_identity(Some(LEARNER));

    complete_course(&mut store, ctx.catalog, Some(missing.as_str()));
    ensure!(
        !store.is_course_complete(),
        "course reported complete without a simulation score for {missing}"
    );
    ensure!(
        remote.certificate_requests().is_empty(),
        "certificate requested before the course was complete"
    );

    let update = store.update_simulation_score(missing, 100);
    ensure!(update.course_completed, "final simulation score should complete the course");
    ensure!(
        remote.certificate_requests().len() == 1,
        "expected one certificate request, got {}",
        remote.certificate_requests().len()
    );
    store.update_quiz_score(missing, 100);
    store.complete_exercise("extra-credit");
    ensure!(
        remote.certificate_requests().len() == 1,
        "certificate request repeated after completion"
    );
    Ok(())
}

fn random_record(rng: &mut ChaCha8Rng, chapters: &[String]) -> ProgressRecord {
    let mut record = ProgressRecord::empty();
    for id in chapters {
        if rng.gen_bool(0.4) {
            record.complete_chapter(id);
        }
        if rng.gen_bool(0.5) {
            record.record_best_score(ScoreKind::Quiz, id, rng.gen_range(0..=100));
        }
        if rng.gen_bool(0.5) {
            record.record_best_score(ScoreKind::Simulation, id, rng.gen_range(0..=100));
        }
    }
    record
}

pub fn reconcile(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let chapters = chapter_ids(ctx.catalog);
    let local = random_record(&mut rng, &chapters);
    let server = random_record(&mut rng, &chapters);

    let (mut store, _, remote) = open(ctx.catalog);
    store.replace_with_remote(local.clone());
    store.reconcile_with_remote(LEARNER, &server);
    let merged = store.record().clone();

    for id in local.completed_chapters.iter().chain(&server.completed_chapters) {
        ensure!(
            merged.has_completed_chapter(id),
            "merged record lost completed chapter {id}"
        );
    }
    for (module, score) in &server.quiz_scores {
        ensure!(
            merged.quiz_scores.get(module) == Some(score),
            "remote quiz score for {module} did not win"
        );
    }
    for (module, score) in &local.simulation_scores {
        if !server.simulation_scores.contains_key(module) {
            ensure!(
                merged.simulation_scores.get(module) == Some(score),
                "local-only simulation score for {module} was dropped"
            );
        }
    }

    let calls = remote.calls().len();
    let again = store.reconcile_with_remote(LEARNER, &server);
    ensure!(!again.changed, "second reconcile changed the record");
    ensure!(*store.record() == merged, "second reconcile altered the record");
    ensure!(
        remote.calls().len() == calls,
        "second reconcile pushed to the remote"
    );
    Ok(())
}

pub fn invalid_ids(_ctx: &JourneyCtx<'_>) -> Result<()> {
    let catalog = single_chapter_catalog();
    let (mut store, storage, remote) = open(&catalog);
    store.set_identity(Some(LEARNER));
    for id in ["", "undefined", "   "] {
        let quiz = store.update_quiz_score(id, 90);
        let simulation = store.update_simulation_score(id, 90);
        ensure!(
            !quiz.changed && !simulation.changed,
            "invalid module id {id:?} changed the record"
        );
    }
    ensure!(store.record().is_empty(), "record should still be empty");
    ensure!(remote.calls().is_empty(), "invalid ids reached the remote");
    ensure!(
        !storage.contains(PROGRESS_STORAGE_KEY),
        "invalid ids were persisted"
    );
    Ok(())
}

pub fn corrupt_storage(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let garbage: String = (0..rng.gen_range(1..64))
        .map(|_| char::from(rng.gen_range(b' '..=b'~')))
        .collect();
    let storage = MemoryStore::new();
    storage.insert_raw(PROGRESS_STORAGE_KEY, &format!("{{{garbage}"));
    storage.insert_raw(ANALYTICS_STORAGE_KEY, &format!("[{garbage}"));

    let record = TestStore::load_record(&storage);
    ensure!(record.is_empty(), "corrupt progress should load as empty");
    let tracker = AnalyticsTracker::load(storage);
    ensure!(
        tracker.engagement_score() == 0 && tracker.state().sessions.is_empty(),
        "corrupt analytics should load as empty"
    );
    Ok(())
}

#[derive(Debug, Clone)]
enum Action {
    Quiz(String, u8),
    Simulation(String, u8),
    Chapter(String),
    Exercise(String),
}

fn apply(store: &mut TestStore, action: &Action) {
    match action {
        Action::Quiz(id, score) => {
            store.update_quiz_score(id, *score);
        }
        Action::Simulation(id, score) => {
            store.update_simulation_score(id, *score);
        }
        Action::Chapter(id) => {
            store.complete_chapter(id);
        }
        Action::Exercise(id) => {
            store.complete_exercise(id);
        }
    }
}

pub fn shuffled_actions(ctx: &JourneyCtx<'_>) -> Result<()> {
    let mut rng = rng_for(ctx);
    let mut actions = Vec::new();
    for id in chapter_ids(ctx.catalog) {
        for _ in 0..2 {
            actions.push(Action::Quiz(id.clone(), rng.gen_range(40..=100)));
            actions.push(Action::Simulation(id.clone(), rng.gen_range(40..=100)));
        }
        actions.push(Action::Chapter(id));
    }
    for id in exercise_ids(ctx.catalog) {
        actions.push(Action::Exercise(id));
    }

    let (mut baseline, _, _) = open(ctx.catalog);
    for action in &actions {
        apply(&mut baseline, action);
    }

    actions.shuffle(&mut rng);
    let (mut shuffled, _, _) = open(ctx.catalog);
    for action in &actions {
        apply(&mut shuffled, action);
    }

    if ctx.verbose {
        println!(
            "     ↳ {} actions, {} badges earned",
            actions.len(),
            shuffled.record().earned_badges.len()
        );
    }
    ensure!(
        normalized(baseline.record()) == normalized(shuffled.record()),
        "final record depends on action order"
    );
    ensure!(
        baseline.is_course_complete() == shuffled.is_course_complete(),
        "course completion depends on action order"
    );
    Ok(())
}
