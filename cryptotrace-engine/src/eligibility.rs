//! Pure eligibility rules over a progress record and the static catalog.
//!
//! Every function here is total: missing scores, unknown ids and empty maps
//! degrade to "not satisfied", `0` or `false`. Nothing panics or errors, so
//! callers may re-run any of them on every render.
use std::collections::HashSet;

use crate::catalog::{Badge, Certificate, Chapter, Milestone, Requirement};
use crate::model::{ProgressRecord, ScoreKind};

/// `round(numer / denom)` with halves rounded up. `denom` must be non-zero.
const fn round_half_up(numer: u64, denom: u64) -> u64 {
    (2 * numer + denom) / (2 * denom)
}

/// `round(100 * part / whole)`; `0` when `whole` is zero.
#[must_use]
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = round_half_up(100 * part as u64, whole as u64);
    pct.min(100) as u8
}

fn average<'a>(scores: impl Iterator<Item = &'a u8>) -> Option<u8> {
    let (sum, count) = scores.fold((0u64, 0u64), |(sum, count), s| {
        (sum + u64::from(*s), count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(round_half_up(sum, count) as u8)
    }
}

/// Average over every quiz and simulation score, rounded half up.
/// `None` when no score has been recorded yet.
#[must_use]
pub fn average_score(progress: &ProgressRecord) -> Option<u8> {
    average(
        progress
            .quiz_scores
            .values()
            .chain(progress.simulation_scores.values()),
    )
}

/// Average over quiz scores only, rounded half up.
#[must_use]
pub fn quiz_average(progress: &ProgressRecord) -> Option<u8> {
    average(progress.quiz_scores.values())
}

#[must_use]
pub fn is_requirement_met(progress: &ProgressRecord, requirement: &Requirement) -> bool {
    match requirement.kind.score_kind() {
        Some(kind) => progress
            .score(kind, &requirement.module_id)
            .is_some_and(|score| score >= requirement.threshold),
        None => progress.has_completed_exercise(&requirement.module_id),
    }
}

/// A badge is earned when every requirement holds. An empty requirement
/// list holds vacuously; catalogs reject such badges in `validate`.
#[must_use]
pub fn is_badge_earned(progress: &ProgressRecord, badge: &Badge) -> bool {
    badge
        .requirements
        .iter()
        .all(|req| is_requirement_met(progress, req))
}

/// Share of satisfied requirements. Already-earned badges report 100 even
/// when the underlying scores no longer satisfy them.
#[must_use]
pub fn badge_progress_percent(progress: &ProgressRecord, badge: &Badge) -> u8 {
    if progress.has_badge(&badge.id) || badge.requirements.is_empty() {
        return 100;
    }
    let satisfied = badge
        .requirements
        .iter()
        .filter(|req| is_requirement_met(progress, req))
        .count();
    percent(satisfied, badge.requirements.len())
}

fn distinct_badge_count(progress: &ProgressRecord) -> usize {
    progress
        .earned_badges
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .len()
}

#[must_use]
pub fn is_certificate_eligible(progress: &ProgressRecord, certificate: &Certificate) -> bool {
    let reqs = &certificate.requirements;
    if distinct_badge_count(progress) < reqs.min_badges {
        return false;
    }
    if !reqs.required_badges.iter().all(|id| progress.has_badge(id)) {
        return false;
    }
    average_score(progress).is_some_and(|avg| avg >= reqs.min_total_score)
}

#[must_use]
pub fn is_milestone_complete(progress: &ProgressRecord, milestone: &Milestone) -> bool {
    let reqs = &milestone.requirements;
    let chapters_ok = reqs
        .chapters
        .as_ref()
        .is_none_or(|ids| ids.iter().all(|id| progress.has_completed_chapter(id)));
    let badges_ok = reqs
        .badges
        .as_ref()
        .is_none_or(|ids| ids.iter().all(|id| progress.has_badge(id)));
    let score_ok = reqs
        .min_score
        .is_none_or(|min| quiz_average(progress).is_some_and(|avg| avg >= min));
    let exercises_ok = reqs
        .exercises
        .as_ref()
        .is_none_or(|ids| ids.iter().all(|id| progress.has_completed_exercise(id)));
    chapters_ok && badges_ok && score_ok && exercises_ok
}

/// Share of catalog chapters completed. Completed ids that are not in the
/// catalog do not count.
#[must_use]
pub fn overall_completion_percent(progress: &ProgressRecord, chapters: &[Chapter]) -> u8 {
    let done = chapters
        .iter()
        .filter(|chapter| progress.has_completed_chapter(&chapter.id))
        .count();
    percent(done, chapters.len())
}

/// Strict course completion: every chapter completed, every badge earned,
/// and every chapter holding both a quiz and a simulation score. An empty
/// chapter catalog is never complete.
#[must_use]
pub fn is_course_complete<'a>(
    progress: &ProgressRecord,
    chapters: &[Chapter],
    badges: impl IntoIterator<Item = &'a Badge>,
) -> bool {
    if chapters.is_empty() {
        return false;
    }
    let chapters_done = chapters
        .iter()
        .all(|chapter| progress.has_completed_chapter(&chapter.id));
    let quizzes_scored = chapters
        .iter()
        .all(|chapter| progress.score(ScoreKind::Quiz, &chapter.id).is_some());
    let simulations_scored = chapters
        .iter()
        .all(|chapter| progress.score(ScoreKind::Simulation, &chapter.id).is_some());
    chapters_done
        && quizzes_scored
        && simulations_scored
        && badges.into_iter().all(|badge| progress.has_badge(&badge.id))
}

/// Ids of badges that qualify now but are not yet in `earnedBadges`.
#[must_use]
pub fn newly_earned_badges<'a>(
    progress: &ProgressRecord,
    badges: impl IntoIterator<Item = &'a Badge>,
) -> Vec<String> {
    let mut earned: Vec<String> = Vec::new();
    for badge in badges {
        if progress.has_badge(&badge.id) || earned.contains(&badge.id) {
            continue;
        }
        if is_badge_earned(progress, badge) {
            earned.push(badge.id.clone());
        }
    }
    earned
}

/// The auto-award pass. Adds every newly qualifying badge in one batch and
/// returns the additions. Never removes a badge; a second run without an
/// intervening mutation returns nothing.
pub fn award_badges<'a>(
    progress: &mut ProgressRecord,
    badges: impl IntoIterator<Item = &'a Badge>,
) -> Vec<String> {
    let earned = newly_earned_badges(progress, badges);
    for id in &earned {
        progress.insert_badge(id);
    }
    earned
}

#[must_use]
pub fn eligible_certificates<'a>(
    progress: &ProgressRecord,
    certificates: &'a [Certificate],
) -> Vec<&'a Certificate> {
    certificates
        .iter()
        .filter(|cert| is_certificate_eligible(progress, cert))
        .collect()
}

#[must_use]
pub fn completed_milestones<'a>(
    progress: &ProgressRecord,
    milestones: &'a [Milestone],
) -> Vec<&'a Milestone> {
    milestones
        .iter()
        .filter(|milestone| is_milestone_complete(progress, milestone))
        .collect()
}
