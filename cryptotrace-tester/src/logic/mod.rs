pub mod journeys;
pub mod reports;
pub mod tester;

use anyhow::{Context, Result};
use cryptotrace_engine::Catalog;

pub use tester::*;

const BUNDLED_CATALOG: &str =
    include_str!("../../../cryptotrace-web/static/assets/data/catalog.json");

/// The course catalog shipped with the web build.
///
/// # Errors
/// Returns an error if the bundled JSON is malformed or inconsistent.
pub fn bundled_catalog() -> Result<Catalog> {
    let catalog = Catalog::from_json(BUNDLED_CATALOG).context("parsing bundled catalog")?;
    catalog.validate().context("validating bundled catalog")?;
    Ok(catalog)
}
