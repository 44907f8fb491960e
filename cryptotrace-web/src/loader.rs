//! Static course data embedded in the bundle

use cryptotrace_engine::{Catalog, CatalogLoader, SYNC_CONFIG_NAME};
use serde::de::DeserializeOwned;

const CATALOG_JSON: &str = include_str!("../static/assets/data/catalog.json");
const CONFIG_JSON: &str = include_str!("../static/assets/data/config.json");

/// Web-specific loader serving the catalog and config shipped with the app
#[derive(Debug, Clone, Copy, Default)]
pub struct WebCatalogLoader;

#[derive(Debug, thiserror::Error)]
pub enum WebDataError {
    #[error("Unknown config: {0}")]
    UnknownConfig(String),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogLoader for WebCatalogLoader {
    type Error = WebDataError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Ok(Catalog::from_json(CATALOG_JSON)?)
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        let json = match config_name {
            SYNC_CONFIG_NAME => CONFIG_JSON,
            _ => return Err(WebDataError::UnknownConfig(config_name.to_string())),
        };
        Ok(serde_json::from_str(json)?)
    }
}
