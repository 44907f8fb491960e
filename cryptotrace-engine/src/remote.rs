//! Remote progress-store contract.
//!
//! The remote API stores progress per learner in three logical buckets:
//! `overall` (chapters, badges, time, exercises), `quizzes` and
//! `simulations` (their score maps as the opaque payload). Badge progress
//! telemetry rides on the same save endpoint under `badge_{id}`.
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::constants::{BUCKET_BADGE_PREFIX, BUCKET_OVERALL, BUCKET_QUIZZES, BUCKET_SIMULATIONS};
use crate::model::{ProgressRecord, scores_from_value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncBucket {
    Overall,
    Quizzes,
    Simulations,
    Badge(String),
}

impl SyncBucket {
    /// The three buckets that together hold a full record.
    pub const RECORD: [Self; 3] = [Self::Overall, Self::Quizzes, Self::Simulations];

    #[must_use]
    pub fn module_id(&self) -> String {
        match self {
            Self::Overall => BUCKET_OVERALL.to_string(),
            Self::Quizzes => BUCKET_QUIZZES.to_string(),
            Self::Simulations => BUCKET_SIMULATIONS.to_string(),
            Self::Badge(id) => format!("{BUCKET_BADGE_PREFIX}{id}"),
        }
    }

    #[must_use]
    pub fn from_module_id(module_id: &str) -> Option<Self> {
        match module_id {
            BUCKET_OVERALL => Some(Self::Overall),
            BUCKET_QUIZZES => Some(Self::Quizzes),
            BUCKET_SIMULATIONS => Some(Self::Simulations),
            other => other
                .strip_prefix(BUCKET_BADGE_PREFIX)
                .filter(|id| !id.is_empty())
                .map(|id| Self::Badge(id.to_string())),
        }
    }
}

/// Response body of `GET /progress/{email}/{moduleId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressEnvelope {
    #[serde(default)]
    pub progress: Option<Value>,
}

/// Body of `POST /progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressRequest {
    pub email: String,
    pub module_id: String,
    pub progress: Value,
}

/// Response body of `POST /progress` and `POST /certificate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
}

/// Response body of `GET /completion/{email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompletionStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Body of `POST /certificate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub email: String,
    pub course_name: String,
    pub score: u8,
}

/// Payload of the `overall` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverallPayload {
    #[serde(default)]
    pub completed_chapters: Vec<String>,
    #[serde(default)]
    pub earned_badges: Vec<String>,
    #[serde(default)]
    pub time_spent: BTreeMap<String, u32>,
    #[serde(default)]
    pub completed_exercises: Vec<String>,
    #[serde(default)]
    pub last_accessed: String,
}

/// Percent-encode a path segment, leaving RFC 3986 unreserved characters
/// and `@` as they are.
#[must_use]
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'@' => {
                out.push(char::from(byte));
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[must_use]
pub fn progress_path(email: &str, bucket: &SyncBucket) -> String {
    format!(
        "/progress/{}/{}",
        encode_path_segment(email),
        encode_path_segment(&bucket.module_id())
    )
}

#[must_use]
pub fn completion_path(email: &str) -> String {
    format!("/completion/{}", encode_path_segment(email))
}

pub const SAVE_PROGRESS_PATH: &str = "/progress";
pub const CERTIFICATE_PATH: &str = "/certificate";

/// Opaque payload stored in one bucket for this record.
#[must_use]
pub fn bucket_payload(record: &ProgressRecord, bucket: &SyncBucket) -> Value {
    match bucket {
        SyncBucket::Overall => json!(OverallPayload {
            completed_chapters: record.completed_chapters.clone(),
            earned_badges: record.earned_badges.clone(),
            time_spent: record.time_spent.clone(),
            completed_exercises: record.completed_exercises.clone(),
            last_accessed: record.last_accessed.clone(),
        }),
        SyncBucket::Quizzes => json!(record.quiz_scores),
        SyncBucket::Simulations => json!(record.simulation_scores),
        SyncBucket::Badge(_) => Value::Null,
    }
}

/// Split a record into its three bucket payloads, in push order.
#[must_use]
pub fn split_for_sync(record: &ProgressRecord) -> Vec<(SyncBucket, Value)> {
    SyncBucket::RECORD
        .into_iter()
        .map(|bucket| {
            let payload = bucket_payload(record, &bucket);
            (bucket, payload)
        })
        .collect()
}

/// The three save requests that push a full record.
#[must_use]
pub fn sync_requests(email: &str, record: &ProgressRecord) -> Vec<SaveProgressRequest> {
    split_for_sync(record)
        .into_iter()
        .map(|(bucket, progress)| SaveProgressRequest {
            email: email.to_string(),
            module_id: bucket.module_id(),
            progress,
        })
        .collect()
}

#[must_use]
pub fn badge_telemetry_request(email: &str, badge_id: &str, percent: u8) -> SaveProgressRequest {
    SaveProgressRequest {
        email: email.to_string(),
        module_id: SyncBucket::Badge(badge_id.to_string()).module_id(),
        progress: json!({ "progress": percent }),
    }
}

/// Rebuild a record from the three bucket payloads. Missing buckets leave
/// their fields empty; a malformed `overall` payload is logged and ignored.
#[must_use]
pub fn assemble_from_buckets(
    overall: Option<&Value>,
    quizzes: Option<&Value>,
    simulations: Option<&Value>,
) -> ProgressRecord {
    let overall = overall
        .filter(|value| !value.is_null())
        .map_or_else(OverallPayload::default, |value| {
            serde_json::from_value::<OverallPayload>(value.clone()).unwrap_or_else(|err| {
                log::warn!("ignoring malformed overall progress payload: {err}");
                OverallPayload::default()
            })
        });
    ProgressRecord {
        completed_chapters: overall.completed_chapters,
        quiz_scores: quizzes.map(scores_from_value).unwrap_or_default(),
        simulation_scores: simulations.map(scores_from_value).unwrap_or_default(),
        completed_exercises: overall.completed_exercises,
        time_spent: overall.time_spent,
        earned_badges: overall.earned_badges,
        failed_attempts: BTreeMap::new(),
        last_accessed: overall.last_accessed,
    }
}

/// Remote progress collaborator. Both calls are detached: implementations
/// start the request and return immediately, logging any failure. Local
/// state never waits on, or rolls back because of, a remote call.
pub trait ProgressRemote {
    fn save(&self, request: SaveProgressRequest);

    fn request_certificate(&self, request: CertificateRequest);
}

/// Remote used while offline or before sign-in; drops every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRemote;

impl ProgressRemote for NullRemote {
    fn save(&self, request: SaveProgressRequest) {
        log::debug!("offline: dropping save of {}", request.module_id);
    }

    fn request_certificate(&self, request: CertificateRequest) {
        log::debug!("offline: dropping certificate request for {}", request.course_name);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Save(SaveProgressRequest),
    Certificate(CertificateRequest),
}

/// Remote that records every call in memory. Clones share one call log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRemote {
    calls: Rc<RefCell<Vec<RemoteCall>>>,
}

impl RecordingRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn saves(&self) -> Vec<SaveProgressRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Save(req) => Some(req.clone()),
                RemoteCall::Certificate(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn certificate_requests(&self) -> Vec<CertificateRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Certificate(req) => Some(req.clone()),
                RemoteCall::Save(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl ProgressRemote for RecordingRemote {
    fn save(&self, request: SaveProgressRequest) {
        self.calls.borrow_mut().push(RemoteCall::Save(request));
    }

    fn request_certificate(&self, request: CertificateRequest) {
        self.calls.borrow_mut().push(RemoteCall::Certificate(request));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreKind;

    #[test]
    fn bucket_module_ids_round_trip() {
        for bucket in [
            SyncBucket::Overall,
            SyncBucket::Quizzes,
            SyncBucket::Simulations,
            SyncBucket::Badge("tracer".into()),
        ] {
            assert_eq!(SyncBucket::from_module_id(&bucket.module_id()), Some(bucket));
        }
        assert_eq!(SyncBucket::from_module_id("badge_"), None);
        assert_eq!(SyncBucket::from_module_id("intro"), None);
    }

    #[test]
    fn paths_encode_identity() {
        assert_eq!(
            progress_path("ana+test@example.com", &SyncBucket::Quizzes),
            "/progress/ana%2Btest@example.com/quizzes"
        );
        assert_eq!(
            progress_path("a@b.io", &SyncBucket::Badge("x y".into())),
            "/progress/a@b.io/badge_x%20y"
        );
        assert_eq!(completion_path("a@b.io"), "/completion/a@b.io");
    }

    #[test]
    fn sync_requests_split_record_into_three_buckets() {
        let mut record = ProgressRecord::empty();
        record.complete_chapter("intro");
        record.record_best_score(ScoreKind::Quiz, "intro", 85);
        record.record_best_score(ScoreKind::Simulation, "intro", 70);
        record.insert_badge("b1");

        let requests = sync_requests("a@b.io", &record);
        let ids: Vec<&str> = requests.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(ids, vec!["overall", "quizzes", "simulations"]);
        assert_eq!(requests[0].progress["completedChapters"], json!(["intro"]));
        assert_eq!(requests[0].progress["earnedBadges"], json!(["b1"]));
        assert_eq!(requests[1].progress, json!({ "intro": 85 }));
        assert_eq!(requests[2].progress, json!({ "intro": 70 }));
    }

    #[test]
    fn buckets_reassemble_into_the_same_record() {
        let mut record = ProgressRecord::empty();
        record.complete_chapter("intro");
        record.complete_exercise("ex");
        record.record_best_score(ScoreKind::Quiz, "intro", 85);
        record.insert_badge("b1");
        let payloads: Vec<Value> = split_for_sync(&record)
            .into_iter()
            .map(|(_, payload)| payload)
            .collect();
        let rebuilt = assemble_from_buckets(
            Some(&payloads[0]),
            Some(&payloads[1]),
            Some(&payloads[2]),
        );
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn assembly_tolerates_missing_and_malformed_buckets() {
        let quizzes = json!({ "intro": 92.6, "": 10 });
        let overall = json!({ "completedChapters": "not-a-list" });
        let record = assemble_from_buckets(Some(&overall), Some(&quizzes), None);
        assert!(record.completed_chapters.is_empty());
        assert_eq!(record.score(ScoreKind::Quiz, "intro"), Some(93));
        assert_eq!(record.quiz_scores.len(), 1);
        assert!(record.simulation_scores.is_empty());

        assert!(assemble_from_buckets(None, None, None).is_empty());
    }

    #[test]
    fn wire_bodies_use_camel_case() {
        let body = serde_json::to_value(CertificateRequest {
            email: "a@b.io".into(),
            course_name: "Course".into(),
            score: 88,
        })
        .unwrap();
        assert_eq!(body, json!({ "email": "a@b.io", "courseName": "Course", "score": 88 }));

        let telemetry = badge_telemetry_request("a@b.io", "tracer", 50);
        let body = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(body["moduleId"], "badge_tracer");
        assert_eq!(body["progress"], json!({ "progress": 50 }));

        let status: CompletionStatus = serde_json::from_str(r#"{ "completed": true }"#).unwrap();
        assert!(status.completed);
        assert!(status.date.is_none());
    }

    #[test]
    fn recording_remote_shares_log_between_clones() {
        let remote = RecordingRemote::new();
        let handle = remote.clone();
        handle.save(badge_telemetry_request("a@b.io", "b", 10));
        handle.request_certificate(CertificateRequest {
            email: "a@b.io".into(),
            course_name: "Course".into(),
            score: 90,
        });
        assert_eq!(remote.calls().len(), 2);
        assert_eq!(remote.saves().len(), 1);
        assert_eq!(remote.certificate_requests().len(), 1);
        remote.clear();
        assert!(handle.calls().is_empty());
    }
}
