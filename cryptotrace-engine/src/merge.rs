//! Local/remote progress reconciliation.
//!
//! Merge rule:
//! - list fields (`completedChapters`, `completedExercises`, `earnedBadges`)
//!   are an ordered union: local entries keep their order, remote-only
//!   entries are appended in remote order;
//! - map fields (`quizScores`, `simulationScores`, `timeSpent`,
//!   `failedAttempts`) are shallow-merged with the remote value winning on a
//!   shared key and local-only keys preserved;
//! - `lastAccessed` takes the remote value when it is non-empty.
//!
//! The merge is idempotent: reconciling the result with the same remote
//! record again yields the same record.
use std::collections::BTreeMap;

use crate::model::ProgressRecord;

fn union(local: &[String], remote: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(local.len() + remote.len());
    for id in local.iter().chain(remote) {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}

fn remote_wins<V: Copy>(
    local: &BTreeMap<String, V>,
    remote: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut merged = local.clone();
    merged.extend(remote.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}

#[must_use]
pub fn reconcile(local: &ProgressRecord, remote: &ProgressRecord) -> ProgressRecord {
    ProgressRecord {
        completed_chapters: union(&local.completed_chapters, &remote.completed_chapters),
        quiz_scores: remote_wins(&local.quiz_scores, &remote.quiz_scores),
        simulation_scores: remote_wins(&local.simulation_scores, &remote.simulation_scores),
        completed_exercises: union(&local.completed_exercises, &remote.completed_exercises),
        time_spent: remote_wins(&local.time_spent, &remote.time_spent),
        earned_badges: union(&local.earned_badges, &remote.earned_badges),
        failed_attempts: remote_wins(&local.failed_attempts, &remote.failed_attempts),
        last_accessed: if remote.last_accessed.is_empty() {
            local.last_accessed.clone()
        } else {
            remote.last_accessed.clone()
        },
    }
}
