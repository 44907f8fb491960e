//! CryptoTrace Engine
//!
//! Platform-agnostic progress, eligibility and gamification logic for the
//! CryptoTrace investigator training course. This crate owns the learner's
//! progress record and every rule derived from it, without UI, browser or
//! network dependencies; storage and the remote progress API are injected.

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod identity;
pub mod merge;
pub mod model;
pub mod quiz;
pub mod remote;
pub mod storage;
pub mod store;

use anyhow::Context;

// Re-export commonly used types
pub use analytics::{AnalyticsEvent, AnalyticsState, AnalyticsTracker, SessionRecord};
pub use catalog::{
    Badge, BadgeTier, Catalog, CatalogError, Certificate, CertificateRequirements, Chapter,
    ChapterIcon, Milestone, MilestoneRequirements, Requirement, RequirementKind,
};
pub use config::SyncConfig;
pub use eligibility::{
    average_score, award_badges, badge_progress_percent, is_badge_earned, is_certificate_eligible,
    is_course_complete, is_milestone_complete, is_requirement_met, overall_completion_percent,
};
pub use identity::Identity;
pub use merge::reconcile;
pub use model::{ProgressRecord, ScoreKind};
pub use quiz::{QuizAttempt, QuizError, QuizQuestion};
pub use remote::{
    CertificateRequest, CompletionStatus, NullRemote, ProgressEnvelope, ProgressRemote,
    RecordingRemote, RemoteCall, SaveProgressRequest, SaveResponse, SyncBucket,
    assemble_from_buckets,
};
pub use storage::{KeyValueStore, MemoryStore};
pub use store::{ProgressStore, ProgressUpdate};

/// Name under which [`SyncConfig`] is requested from a [`CatalogLoader`].
pub const SYNC_CONFIG_NAME: &str = "config";

/// Trait for abstracting static course data loading
/// Platform-specific implementations should provide this
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the course catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or parsed.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load a named configuration document
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Open a progress store over the loader's catalog and sync configuration.
///
/// # Errors
///
/// Returns an error if the catalog or configuration cannot be loaded, or the
/// catalog fails validation.
pub fn open_store<L, S, R>(loader: &L, storage: S, remote: R) -> anyhow::Result<ProgressStore<S, R>>
where
    L: CatalogLoader,
    S: KeyValueStore,
    R: ProgressRemote,
{
    let catalog = loader.load_catalog().context("loading course catalog")?;
    catalog.validate().context("validating course catalog")?;
    let config: SyncConfig = loader
        .load_config(SYNC_CONFIG_NAME)
        .context("loading sync configuration")?;
    log::info!(
        "opened progress store: {} chapters, {} badges",
        catalog.chapters.len(),
        catalog.badges().count()
    );
    Ok(ProgressStore::load(storage, remote, catalog, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;

    const CATALOG: &str = r#"{
        "chapters": [
            {
                "id": "intro",
                "title": "Introduction",
                "icon": "book-open",
                "badges": [
                    {
                        "id": "first-steps",
                        "name": "First Steps",
                        "tier": "bronze",
                        "points": 10,
                        "requirements": [
                            { "type": "quiz", "moduleId": "intro", "threshold": 70 }
                        ]
                    }
                ]
            }
        ]
    }"#;

    struct FixtureLoader {
        catalog: &'static str,
        config: &'static str,
    }

    #[derive(Debug, thiserror::Error)]
    #[error(transparent)]
    struct FixtureError(#[from] serde_json::Error);

    impl CatalogLoader for FixtureLoader {
        type Error = FixtureError;

        fn load_catalog(&self) -> Result<Catalog, Self::Error> {
            Ok(Catalog::from_json(self.catalog)?)
        }

        fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            Ok(serde_json::from_str(self.config)?)
        }
    }

    #[test]
    fn open_store_loads_catalog_and_config() {
        let loader = FixtureLoader {
            catalog: CATALOG,
            config: r#"{ "courseName": "Tracing 101" }"#,
        };
        let mut store = open_store(&loader, MemoryStore::new(), NullRemote).unwrap();
        assert_eq!(store.catalog().chapters.len(), 1);
        assert_eq!(store.config().course_name, "Tracing 101");

        let update = store.update_quiz_score("intro", 75);
        assert_eq!(update.new_badges, vec!["first-steps"]);
        assert_eq!(store.total_points(), 10);
    }

    #[test]
    fn open_store_rejects_invalid_catalog() {
        let loader = FixtureLoader {
            catalog: r#"{ "chapters": [ { "id": "a", "title": "A" }, { "id": "a", "title": "B" } ] }"#,
            config: "{}",
        };
        let err = open_store(&loader, MemoryStore::new(), NullRemote)
            .err()
            .expect("duplicate chapter should fail");
        assert!(format!("{err:#}").contains("duplicate chapter id `a`"));
    }

    #[test]
    fn open_store_reports_unreadable_config() {
        let loader = FixtureLoader {
            catalog: CATALOG,
            config: "not json",
        };
        let err = open_store(&loader, MemoryStore::new(), NullRemote)
            .err()
            .expect("bad config should fail");
        assert!(err.to_string().contains("sync configuration"));
    }
}
