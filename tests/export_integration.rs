/// End-to-end: capture a session, replay it through a scripted transport,
/// and check that exports agree with the stored aggregates.
use async_trait::async_trait;
use authmatrix::errors::TransportError;
use authmatrix::models::{HttpService, ObservedRequest, Protocol, Verdict};
use authmatrix::normalizer::ReplayRequest;
use authmatrix::replay::{ReplayConfig, ReplayEngine, RunState};
use authmatrix::reporting::{self, ExportScope};
use authmatrix::results::{ResultFilter, ResultStore};
use authmatrix::roles::RoleStore;
use authmatrix::session;
use authmatrix::transport::{RawResponse, Transport};
use authmatrix::NullObserver;
use std::sync::Arc;
use std::time::Duration;

/// Maps each endpoint to a fixed outcome.
struct TableTransport;

#[async_trait]
impl Transport for TableTransport {
    async fn send(
        &self,
        _service: &HttpService,
        request: &ReplayRequest,
    ) -> Result<RawResponse, TransportError> {
        let (status, extra): (u16, Option<&str>) = match request.url.as_str() {
            url if url.ends_with("/open") => (200, None),
            url if url.ends_with("/blocked") => (403, None),
            url if url.ends_with("/gated") => (302, Some("Location: /login?next=/gated")),
            url if url.ends_with("/odd") => (500, None),
            _ => return Err(TransportError::new("timed out")),
        };
        let mut headers = vec![format!("HTTP/1.1 {}", status)];
        if let Some(extra) = extra {
            headers.push(extra.to_string());
        }
        Ok(RawResponse {
            status,
            headers,
            body: Vec::new(),
        })
    }
}

fn observed(url: &str) -> ObservedRequest {
    ObservedRequest {
        method: "GET".to_string(),
        url: url.to_string(),
        headers: vec![
            "GET / HTTP/1.1".to_string(),
            "Cookie: session=baseline".to_string(),
        ],
        body: Vec::new(),
        host: "app".to_string(),
        port: 443,
        protocol: Protocol::Https,
    }
}

fn fixture() -> RoleStore {
    let store = RoleStore::new();
    store.begin_capture("Admin").unwrap();
    for path in ["open", "blocked", "gated", "odd", "flaky"] {
        store.observe(observed(&format!("https://app/{}", path)));
    }
    store.end_capture();
    store.begin_capture("Guest").unwrap();
    store.observe(observed("https://app/home"));
    store.end_capture();
    store.set_baseline("Admin").unwrap();
    store
}

async fn run_matrix(roles: &RoleStore) -> Arc<ResultStore> {
    let engine = ReplayEngine::new(Arc::new(TableTransport)).with_config(ReplayConfig {
        store_full_messages: false,
        request_delay: Duration::ZERO,
    });
    let results = Arc::new(ResultStore::new());
    let handle = engine
        .start(roles, Arc::clone(&results), Arc::new(NullObserver))
        .unwrap();
    assert_eq!(handle.wait().await, RunState::Completed);
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_export_matches_aggregate_counts() {
    let roles = fixture();
    let results = run_matrix(&roles).await;

    let counts = results.aggregate_counts();
    assert_eq!(counts.total, 5);
    assert_eq!(counts.vulnerable, 1);
    assert_eq!(counts.safe, 2); // 403 and login redirect
    assert_eq!(counts.suspicious, 1); // 500
    assert_eq!(counts.error, 1); // transport failure

    let document = reporting::export_results(&results, roles.baseline(), None);
    assert_eq!(document.export_type, ExportScope::All);
    assert_eq!(document.baseline_role.as_deref(), Some("Admin"));
    assert_eq!(document.total, counts.total);
    assert_eq!(document.vulnerabilities, counts.vulnerable);
    assert_eq!(document.results.len(), 5);
    assert_eq!(document.results[0].endpoint, "https://app/open");
    assert_eq!(document.results[0].role, "Guest");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn filtered_export_is_consistent_with_filtered_counts() {
    let roles = fixture();
    let results = run_matrix(&roles).await;

    let filter = ResultFilter::any().with_verdict(Verdict::Vulnerable);
    let document = reporting::export_results(&results, roles.baseline(), Some(&filter));
    let counts = results.counts_for(&filter);

    assert_eq!(document.export_type, ExportScope::Filtered);
    assert_eq!(document.total, counts.total);
    assert_eq!(document.total, 1);
    assert_eq!(document.vulnerabilities, 1);
    assert!(document
        .results
        .iter()
        .all(|r| r.verdict == Verdict::Vulnerable));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restored_session_replays_the_same_matrix() {
    let roles = fixture();
    let original = run_matrix(&roles).await;

    let dir = std::env::temp_dir().join("authmatrix_export_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("session.json");
    session::save_session(&roles, &path).unwrap();

    let restored = session::load_session(&path).unwrap();
    assert_eq!(restored.baseline().as_deref(), Some("Admin"));
    let replayed = run_matrix(&restored).await;

    assert_eq!(replayed.len(), original.len());
    assert_eq!(replayed.aggregate_counts(), original.aggregate_counts());

    std::fs::remove_file(&path).ok();
}
