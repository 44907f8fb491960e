use cryptotrace_engine::{
    CatalogLoader, MemoryStore, RecordingRemote, SYNC_CONFIG_NAME, SyncConfig, open_store,
};
use cryptotrace_web::{WebCatalogLoader, WebDataError};
use serde_json::Value;

#[test]
fn web_loader_serves_bundled_catalog() {
    let catalog = WebCatalogLoader.load_catalog().unwrap();
    catalog.validate().unwrap();
    assert_eq!(catalog.chapters.len(), 10);
    assert_eq!(
        catalog.badge("tracer").map(|badge| badge.points),
        Some(25)
    );
}

#[test]
fn web_loader_serves_sync_config() {
    let config: SyncConfig = WebCatalogLoader.load_config(SYNC_CONFIG_NAME).unwrap();
    assert!(config.api_base_url.starts_with("https://"));
    assert_eq!(config.course_name, "Cryptocurrency Crime Investigation");
}

#[test]
fn web_loader_flags_unknown_config() {
    let err = WebCatalogLoader
        .load_config::<Value>("missing-config")
        .expect_err("missing config should error");
    assert!(matches!(err, WebDataError::UnknownConfig(_)));
    assert!(format!("{err}").contains("Unknown config"));
}

#[test]
fn bundled_assets_open_a_store() {
    let mut store = open_store(&WebCatalogLoader, MemoryStore::new(), RecordingRemote::new()).unwrap();
    let update = store.update_quiz_score("introduction", 72);
    assert_eq!(update.new_badges, vec!["first-responder"]);
    assert_eq!(store.completed_milestones().len(), 0);
    store.complete_chapter("introduction");
    assert_eq!(store.completion_percent(), 10);
    assert_eq!(
        store
            .completed_milestones()
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>(),
        vec!["getting-started"]
    );
}
