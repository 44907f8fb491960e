#![cfg(target_arch = "wasm32")]

use cryptotrace_engine::constants::{ANALYTICS_STORAGE_KEY, PROGRESS_STORAGE_KEY};
use cryptotrace_engine::{KeyValueStore, ProgressRecord};
use cryptotrace_web::{LocalStore, ProgressHandle, dom};
use serde::Deserialize;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateView {
    changed: bool,
    new_badges: Vec<String>,
}

fn fresh_handle() -> ProgressHandle {
    let storage = dom::local_storage().expect("localStorage");
    storage.clear().expect("clear localStorage");
    ProgressHandle::new().expect("handle opens")
}

fn view(value: JsValue) -> UpdateView {
    serde_wasm_bindgen::from_value(value).expect("update view")
}

#[wasm_bindgen_test]
fn local_store_round_trips_values() {
    let store = LocalStore;
    store.write("cryptotrace.test", "{\"a\":1}").unwrap();
    assert_eq!(store.read("cryptotrace.test").unwrap().as_deref(), Some("{\"a\":1}"));
    store.remove("cryptotrace.test").unwrap();
    assert!(store.read("cryptotrace.test").unwrap().is_none());
}

#[wasm_bindgen_test]
fn handle_scores_and_persists_progress() {
    let mut handle = fresh_handle();
    let update = view(handle.update_quiz_score("introduction", 71.6).unwrap());
    assert!(update.changed);
    assert_eq!(update.new_badges, vec!["first-responder"]);

    let record: ProgressRecord = serde_wasm_bindgen::from_value(handle.snapshot().unwrap()).unwrap();
    assert_eq!(record.quiz_scores.get("introduction"), Some(&72));

    let stored = LocalStore.read(PROGRESS_STORAGE_KEY).unwrap().expect("persisted");
    assert!(stored.contains("first-responder"));
    assert!(LocalStore.read(ANALYTICS_STORAGE_KEY).unwrap().is_some());
    assert_eq!(handle.engagement_score(), 5 + 15);
}

#[wasm_bindgen_test]
fn handle_locks_quiz_answers() {
    let mut handle = fresh_handle();
    let questions = serde_wasm_bindgen::to_value(&serde_json::json!([
        { "prompt": "Q1", "options": ["a", "b"], "correctAnswerIndex": 0 },
        { "prompt": "Q2", "options": ["a", "b"], "correctAnswerIndex": 1 }
    ]))
    .unwrap();
    handle.start_quiz("introduction", questions).unwrap();
    assert!(!handle.select_answer(0, 0).unwrap());
    assert!(handle.select_answer(0, 1).is_err());
    assert!(handle.submit_quiz().is_err());
    assert!(handle.select_answer(1, 0).unwrap());
    let update = view(handle.submit_quiz().unwrap());
    assert!(update.changed);
    assert!(handle.submit_quiz().is_err());
    assert_eq!(handle.badge_progress("first-responder"), Some(0));
}

#[wasm_bindgen_test]
fn handle_rejects_placeholder_ids_and_resets() {
    let mut handle = fresh_handle();
    let update = view(handle.update_simulation_score("undefined", 90.0).unwrap());
    assert!(!update.changed);
    handle.complete_chapter("introduction").unwrap();
    assert_eq!(handle.completion_percent(), 10);
    assert_eq!(handle.next_chapter("introduction").as_deref(), Some("blockchain-fundamentals"));
    handle.reset();
    assert_eq!(handle.completion_percent(), 0);
    assert!(LocalStore.read(PROGRESS_STORAGE_KEY).unwrap().is_none());
}

#[wasm_bindgen_test]
fn handle_reconciles_remote_record() {
    let mut handle = fresh_handle();
    handle.complete_exercise("peel-chain").unwrap();
    let remote = serde_wasm_bindgen::to_value(&serde_json::json!({
        "completedChapters": ["introduction"],
        "quizScores": { "introduction": 88 }
    }))
    .unwrap();
    assert!(!handle.set_identity(Some("not-an-email".into())));
    let update = view(handle.reconcile("learner@example.com", remote).unwrap());
    assert!(update.changed);
    assert_eq!(handle.identity().as_deref(), Some("learner@example.com"));
    let record: ProgressRecord = serde_wasm_bindgen::from_value(handle.snapshot().unwrap()).unwrap();
    assert_eq!(record.completed_exercises, vec!["peel-chain"]);
    assert!(record.has_badge("first-responder"));
    assert!(handle.export_json().contains("\"completedChapters\""));
}
