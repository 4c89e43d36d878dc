//! Router-level tests driving the HTTP surface end to end against the
//! in-memory adapter.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sitewatch_api::{router, state::AppState};
use sitewatch_config::AppConfig;
use sitewatch_storage::{MemoryStorage, Storage};
use sitewatch_types::{Heading, PageSnapshot, Scan, ScanSettings, Site};
use sitewatch_workers::WorkerService;
use tower::util::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    storage: Arc<MemoryStorage>,
}

fn test_app() -> TestApp {
    let storage = Arc::new(MemoryStorage::new());
    let service = Arc::new(WorkerService::new(storage.clone(), AppConfig::default()));
    let state = AppState::new(storage.clone(), service);
    TestApp {
        app: router(state),
        storage,
    }
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_site(storage: &MemoryStorage) -> Uuid {
    let site = Site::new(Uuid::new_v4(), "Example", "https://a.example/");
    storage.create_site(site.clone()).await.unwrap();
    site.id
}

#[tokio::test]
async fn submit_job_returns_queued_job() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;

    let (status, body) = request(
        &app,
        "POST",
        "/jobs",
        Some(json!({"siteId": site_id, "type": "scan", "priority": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "queued");
    assert!(body["jobId"].as_str().is_some());
}

#[tokio::test]
async fn submit_job_for_unknown_site_is_404() {
    let TestApp { app, .. } = test_app();
    let (status, body) = request(
        &app,
        "POST",
        "/jobs",
        Some(json!({"siteId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn job_stats_reflect_queue_depth() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;

    for _ in 0..3 {
        request(&app, "POST", "/jobs", Some(json!({"siteId": site_id}))).await;
    }

    let (status, body) = request(&app, "GET", "/jobs/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], 3);
    assert_eq!(body["running"], 0);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;

    let (_, created) = request(&app, "POST", "/jobs", Some(json!({"siteId": site_id}))).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();
    request(&app, "POST", &format!("/jobs/{job_id}/cancel"), None).await;
    request(&app, "POST", "/jobs", Some(json!({"siteId": site_id}))).await;

    let (status, body) = request(&app, "GET", "/jobs?status=queued", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["jobs"][0]["status"], "queued");
}

#[tokio::test]
async fn cancel_transitions_then_conflicts() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;
    let (_, created) = request(&app, "POST", "/jobs", Some(json!({"siteId": site_id}))).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let (status, body) = request(&app, "POST", &format!("/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = request(&app, "POST", &format!("/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn retry_only_allowed_from_failed() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;
    let (_, created) = request(&app, "POST", "/jobs", Some(json!({"siteId": site_id}))).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();

    // Queued → retry is a conflict.
    let (status, _) = request(&app, "POST", &format!("/jobs/{job_id}/retry"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Fail it behind the scenes, then retry succeeds.
    let id: Uuid = job_id.parse().unwrap();
    let mut job = storage.get_job(id).await.unwrap().unwrap();
    job.start("w0");
    job.fail("boom");
    storage.update_job(job).await.unwrap();

    let (status, body) = request(&app, "POST", &format!("/jobs/{job_id}/retry"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["retryCount"], 1);
}

#[tokio::test]
async fn compare_endpoint_reports_title_change() {
    let TestApp { app, storage } = test_app();
    let site_id = seed_site(&storage).await;

    let base = Scan::new(site_id, ScanSettings::default());
    let compare = Scan::new(site_id, ScanSettings::default());
    let (base_id, compare_id) = (base.id, compare.id);
    storage.create_scan(base).await.unwrap();
    storage.create_scan(compare).await.unwrap();

    let mut old = PageSnapshot::empty(base_id, "https://a.example/p");
    old.page_id = Uuid::new_v4();
    old.title = Some("Old".to_string());
    old.headings = vec![Heading::new(1, "Welcome")];
    let mut new = PageSnapshot::empty(compare_id, "https://a.example/p");
    new.page_id = old.page_id;
    new.title = Some("New".to_string());
    new.headings = vec![Heading::new(1, "Welcome")];
    storage.insert_snapshots(vec![old, new]).await.unwrap();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/scans/{base_id}/compare/{compare_id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["modified"], 1);
    let page = &body["pages"][0];
    assert_eq!(page["changeType"], "modified");
    assert_eq!(page["severity"], "high");
    let change = &page["changes"][0];
    assert_eq!(change["field"], "title");
    assert_eq!(change["type"], "modified");
    assert_eq!(change["oldValue"], "Old");
    assert_eq!(change["newValue"], "New");
    assert_eq!(change["impact"], "high");
}

#[tokio::test]
async fn compare_unknown_scan_is_404() {
    let TestApp { app, .. } = test_app();
    let (status, _) = request(
        &app,
        "POST",
        &format!("/scans/{}/compare/{}", Uuid::new_v4(), Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_version_and_timestamp() {
    let TestApp { app, .. } = test_app();
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().is_some());
    assert!(body["version"].as_str().is_some());
}
