//! Read-mostly health probe for a learner's server-side progress.
//!
//! Writes only happen with `--write`, and then only push back the record
//! that was just loaded.

use anyhow::{Context, Result, bail, ensure};
use cryptotrace_engine::remote::{split_for_sync, sync_requests};
use cryptotrace_engine::{Identity, ProgressRecord, assemble_from_buckets, reconcile};
use std::time::Instant;

use super::{ProgressApi, load_record};
use crate::logic::ScenarioResult;

fn finish(name: &str, start: Instant, outcome: Result<()>) -> ScenarioResult {
    match outcome {
        Ok(()) => ScenarioResult::from_outcomes(name, 1, Vec::new(), vec![start.elapsed()]),
        Err(err) => {
            log::warn!("{name} failed: {err:#}");
            ScenarioResult::from_outcomes(name, 1, vec![format!("{err:#}")], Vec::new())
        }
    }
}

fn loaded(record: Option<&ProgressRecord>) -> Result<&ProgressRecord> {
    record.context("skipped: remote progress could not be loaded")
}

fn check_bucket_round_trip(record: &ProgressRecord) -> Result<()> {
    let payloads: Vec<_> = split_for_sync(record)
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    let rebuilt = assemble_from_buckets(payloads.first(), payloads.get(1), payloads.get(2));
    ensure!(
        rebuilt == *record,
        "record does not survive a split into sync buckets"
    );
    Ok(())
}

fn check_reconcile_preview(record: &ProgressRecord) -> Result<()> {
    let merged = reconcile(&ProgressRecord::empty(), record);
    ensure!(
        reconcile(&merged, record) == merged,
        "reconciling the remote record twice is not stable"
    );
    Ok(())
}

async fn check_save_round_trip(
    api: &dyn ProgressApi,
    identity: &Identity,
    record: &ProgressRecord,
) -> Result<()> {
    for request in sync_requests(identity.email(), record) {
        let response = api
            .save(&request)
            .await
            .with_context(|| format!("saving {}", request.module_id))?;
        ensure!(response.success, "server rejected {}", request.module_id);
    }
    let reloaded = load_record(api, identity.email())
        .await
        .context("reloading after save")?;
    ensure!(
        reloaded == *record,
        "reloaded record differs from the one just saved"
    );
    Ok(())
}

/// Run every probe check for `email` and report one result per check.
///
/// # Errors
/// Returns an error only when `email` is not a valid identity.
pub async fn run_probe(
    api: &dyn ProgressApi,
    email: &str,
    write: bool,
) -> Result<Vec<ScenarioResult>> {
    let Some(identity) = Identity::parse(email) else {
        bail!("{email:?} is not a valid learner email");
    };
    let mut results = Vec::new();

    let start = Instant::now();
    let record = match load_record(api, identity.email()).await {
        Ok(record) => {
            log::info!(
                "loaded {} chapters, {} badges for {identity}",
                record.completed_chapters.len(),
                record.earned_badges.len()
            );
            results.push(finish("Load Progress Buckets", start, Ok(())));
            Some(record)
        }
        Err(err) => {
            results.push(finish("Load Progress Buckets", start, Err(err.into())));
            None
        }
    };

    let start = Instant::now();
    let outcome = loaded(record.as_ref()).and_then(check_bucket_round_trip);
    results.push(finish("Bucket Round Trip", start, outcome));

    let start = Instant::now();
    let outcome = loaded(record.as_ref()).and_then(check_reconcile_preview);
    results.push(finish("Reconcile Preview", start, outcome));

    let start = Instant::now();
    let outcome = match api.completion(identity.email()).await {
        Ok(status) => {
            log::info!(
                "completion for {identity}: {} {}",
                status.completed,
                status.date.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    };
    results.push(finish("Completion Status", start, outcome));

    if write {
        let start = Instant::now();
        let outcome = match loaded(record.as_ref()) {
            Ok(record) => check_save_round_trip(api, &identity, record).await,
            Err(err) => Err(err),
        };
        results.push(finish("Save Round Trip", start, outcome));
    }

    Ok(results)
}
