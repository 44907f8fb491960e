//! Sync configuration
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_COURSE_NAME};

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_course_name() -> String {
    DEFAULT_COURSE_NAME.to_string()
}

/// Where progress syncs to and what the issued certificate is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_course_name")]
    pub course_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            course_name: default_course_name(),
        }
    }
}

impl SyncConfig {
    /// Load sync configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Absolute URL for an API path such as `/progress`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url.trim_end_matches('/'))
    }
}
