//! Centralized keys and tuning constants for the CryptoTrace engine.
//!
//! Storage keys and wire names are shared with the browser application's
//! persisted data, so changing any of them orphans existing learner state.

// Storage keys -------------------------------------------------------------
pub const PROGRESS_STORAGE_KEY: &str = "cryptotrace.progress";
pub const ANALYTICS_STORAGE_KEY: &str = "cryptotrace.analytics";

// Remote bucket names ------------------------------------------------------
pub const BUCKET_OVERALL: &str = "overall";
pub const BUCKET_QUIZZES: &str = "quizzes";
pub const BUCKET_SIMULATIONS: &str = "simulations";
pub const BUCKET_BADGE_PREFIX: &str = "badge_";

// Progress rules -----------------------------------------------------------
/// Minutes credited to `timeSpent` the first time a chapter is completed.
pub const CHAPTER_COMPLETION_MINUTES: u32 = 60;
/// Module id written by an upstream bug when a module was never set.
pub const PLACEHOLDER_MODULE_ID: &str = "undefined";
pub const MAX_SCORE: u8 = 100;

// Sync defaults ------------------------------------------------------------
pub const DEFAULT_API_BASE_URL: &str = "https://api.cryptotrace.academy";
pub const DEFAULT_COURSE_NAME: &str = "Cryptocurrency Crime Investigation";

// Engagement weights -------------------------------------------------------
pub const ENGAGEMENT_PAGE_VIEW: u32 = 1;
pub const ENGAGEMENT_CHAPTER_COMPLETED: u32 = 10;
pub const ENGAGEMENT_QUIZ_SUBMITTED: u32 = 5;
pub const ENGAGEMENT_SIMULATION_SCORED: u32 = 5;
pub const ENGAGEMENT_EXERCISE_COMPLETED: u32 = 3;
pub const ENGAGEMENT_BADGE_EARNED: u32 = 15;
/// Oldest sessions are dropped once the analytics blob holds this many.
pub const MAX_TRACKED_SESSIONS: usize = 50;
