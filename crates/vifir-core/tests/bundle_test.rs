#![allow(clippy::unwrap_used)]
// Bundle pipeline tests: generation job lifecycle and concurrent,
// failure-isolated downloads.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vifir_api::{ApiClient, EntityKind, EntityRef, TransportConfig};
use vifir_core::{CoreError, Session, bundle};

const FAST_POLL: Duration = Duration::from_millis(10);

// ── Helpers ─────────────────────────────────────────────────────────

async fn logged_in_session(server: &MockServer, deployment: &str) -> Session {
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "tok-1" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product": "mgmt-server", "version": "8.0.2", "deployment": deployment
        })))
        .mount(server)
        .await;

    let client =
        ApiClient::new(Url::parse(&server.uri()).unwrap(), TransportConfig::default()).unwrap();
    let mut session = Session::from_client(client);
    let secret: secrecy::SecretString = "hunter2".to_string().into();
    session.login("forensics", &secret).await.unwrap();
    session
}

fn host(id: &str) -> EntityRef {
    EntityRef::new(EntityKind::Host, id)
}

// ── Generation ──────────────────────────────────────────────────────

#[tokio::test]
async fn generation_polls_until_success() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server, "controller").await;

    Mock::given(method("POST"))
        .and(path("/api/support-bundles"))
        .and(body_partial_json(json!({ "hosts": ["host-1"] })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "job": "job-1" })))
        .mount(&server)
        .await;

    // Two running polls (percentage stuck at 0, as some servers do),
    // then success.
    Mock::given(method("GET"))
        .and(path("/api/support-bundles/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "running", "progress": 0
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/support-bundles/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "succeeded",
            "progress": 100,
            "bundles": [{ "url": format!("{}/files/esx01.tgz", server.uri()), "host": "host-1" }]
        })))
        .mount(&server)
        .await;

    let bundles = bundle::generate_with_poll_interval(&session, &[host("host-1")], FAST_POLL)
        .await
        .unwrap();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].host, "host-1");
}

#[tokio::test]
async fn standalone_node_submits_without_a_host_list() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server, "standalone").await;

    // Exact body match: the hosts field must be absent entirely.
    Mock::given(method("POST"))
        .and(path("/api/support-bundles"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "job": "job-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/support-bundles/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "succeeded", "bundles": []
        })))
        .mount(&server)
        .await;

    // Host selection is ignored when not a management controller.
    let bundles = bundle::generate_with_poll_interval(&session, &[host("host-1")], FAST_POLL)
        .await
        .unwrap();
    assert!(bundles.is_empty());
}

#[tokio::test]
async fn failed_job_reports_generation_failure_and_downloads_nothing() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server, "controller").await;

    Mock::given(method("POST"))
        .and(path("/api/support-bundles"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "job": "job-3" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/support-bundles/job-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "failed", "error": "disk full on host"
        })))
        .mount(&server)
        .await;

    let result = bundle::generate_with_poll_interval(&session, &[], FAST_POLL).await;
    match result {
        Err(CoreError::BundleGenerationFailed { message }) => {
            assert!(message.contains("disk full"), "unexpected message: {message}");
        }
        other => panic!("expected BundleGenerationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn generation_before_login_touches_no_network() {
    let server = MockServer::start().await;
    let client =
        ApiClient::new(Url::parse(&server.uri()).unwrap(), TransportConfig::default()).unwrap();
    let session = Session::from_client(client);

    let result = bundle::generate(&session, &[]).await;
    assert!(matches!(result, Err(CoreError::SessionInvalid)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Downloads ───────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_download_results_do_not_block_or_cancel_siblings() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server, "controller").await;

    let payload = vec![0xAB_u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/files/esx01.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/esx02.tgz"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/esx03.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tiny".to_vec()))
        .mount(&server)
        .await;

    let descriptors: Vec<vifir_api::BundleDescriptor> = serde_json::from_value(json!([
        { "url": format!("{}/files/esx01.tgz", server.uri()), "host": "host-1" },
        { "url": format!("{}/files/esx02.tgz", server.uri()), "host": "host-2" },
        { "url": format!("{}/files/esx03.tgz", server.uri()), "host": "host-3" }
    ]))
    .unwrap();

    let out = tempfile::tempdir().unwrap();
    let outcomes = bundle::download_all(&session, &descriptors, out.path())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    let ok = outcomes.iter().filter(|t| t.succeeded()).count();
    assert_eq!(ok, 2, "both 200 downloads must land: {outcomes:?}");

    let failed = outcomes.iter().find(|t| !t.succeeded()).unwrap();
    assert_eq!(failed.file_name, "esx02.tgz");
    assert!(matches!(
        &failed.status,
        vifir_core::DownloadStatus::Failed { reason } if reason.contains("500")
    ));

    // Files named from the URL path tail, bytes as received.
    let big = std::fs::read(out.path().join("esx01.tgz")).unwrap();
    assert_eq!(big, payload);
    let tiny = std::fs::read(out.path().join("esx03.tgz")).unwrap();
    assert_eq!(tiny, b"tiny");
    assert!(!out.path().join("esx02.tgz").exists());
}

// ── Composition ─────────────────────────────────────────────────────

#[tokio::test]
async fn request_bundle_succeeds_overall_despite_download_failures() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server, "controller").await;

    Mock::given(method("POST"))
        .and(path("/api/support-bundles"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "job": "job-4" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/support-bundles/job-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "succeeded",
            "bundles": [
                { "url": format!("{}/files/ok.tgz", server.uri()), "host": "host-1" },
                { "url": format!("{}/files/gone.tgz", server.uri()), "host": "host-2" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/ok.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bundle".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/gone.tgz"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let outcomes = bundle::request_bundle(&session, &[host("host-1"), host("host-2")], out.path())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|t| t.succeeded()).count(), 1);
    assert!(out.path().join("ok.tgz").exists());
}
