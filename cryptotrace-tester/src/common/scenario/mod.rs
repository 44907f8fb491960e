use anyhow::Result;
use cryptotrace_engine::Catalog;

use crate::logic::journeys;

/// Inputs handed to one journey iteration.
#[derive(Debug, Clone, Copy)]
pub struct JourneyCtx<'a> {
    pub catalog: &'a Catalog,
    pub seed: u64,
    pub verbose: bool,
}

pub type Journey = fn(&JourneyCtx<'_>) -> Result<()>;

// Logic test scenario
#[derive(Clone, Copy)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub journey: Journey,
}

impl TestScenario {
    const fn new(
        key: &'static str,
        name: &'static str,
        description: &'static str,
        journey: Journey,
    ) -> Self {
        Self {
            key,
            name,
            description,
            journey,
        }
    }
}

pub fn all_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "smoke",
            "Smoke Test",
            "Open the bundled course, score one quiz, check persistence",
            journeys::smoke,
        ),
        TestScenario::new(
            "end-to-end",
            "Single Chapter End to End",
            "Quiz, chapter, auto-award, certificate eligibility, 100% completion",
            journeys::end_to_end,
        ),
        TestScenario::new(
            "monotonic",
            "Monotonic Best Scores",
            "Random score sequences always keep the per-module maximum",
            journeys::monotonic_scores,
        ),
        TestScenario::new(
            "sticky-badges",
            "Sticky Badges",
            "Earned badges survive later low scores and report 100%",
            journeys::sticky_badges,
        ),
        TestScenario::new(
            "course-strictness",
            "Course Completion Strictness",
            "One missing simulation score blocks completion and the certificate request",
            journeys::course_strictness,
        ),
        TestScenario::new(
            "reconcile",
            "Remote Reconciliation",
            "Random local and remote records merge by the documented rule, idempotently",
            journeys::reconcile,
        ),
        TestScenario::new(
            "invalid-ids",
            "Invalid Module Ids",
            "Empty and placeholder ids never reach the score maps or the remote",
            journeys::invalid_ids,
        ),
        TestScenario::new(
            "corrupt-storage",
            "Corrupt Local Storage",
            "Unparseable stored progress and analytics fall back to empty defaults",
            journeys::corrupt_storage,
        ),
        TestScenario::new(
            "shuffled",
            "Shuffled Learner Actions",
            "Any ordering of the same actions yields the same final record",
            journeys::shuffled_actions,
        ),
    ]
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let wanted = name.to_lowercase();
    all_scenarios()
        .into_iter()
        .find(|scenario| scenario.key == wanted)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    all_scenarios()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.description))
        .collect()
}
