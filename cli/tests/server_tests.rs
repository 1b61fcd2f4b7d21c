// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use twinboss_cli::commands::ControlPlaneContext;
use twinboss_cli::server::{router, AppState};
use twinboss_core::application::PlaybookService;
use twinboss_core::domain::node_config::ControlPlaneConfig;
use twinboss_core::infrastructure::FallbackGenerator;

struct TestApp {
    dir: TempDir,
    app: Router,
}

fn test_app(api_key: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = ControlPlaneConfig::default();
    config.spec.paths.data_dir = dir.path().join("runtime");
    config.spec.paths.routing_file = dir.path().join("dynamic").join("domains.yml");

    let ctx = ControlPlaneContext::from_config(config).unwrap();
    let playbooks = PlaybookService::new(ctx.control_plane.clone()).with_step_pacing(Duration::ZERO);
    let state = AppState::new(ctx.control_plane.clone(), Arc::new(FallbackGenerator::mock()))
        .with_api_key(api_key.map(str::to_string))
        .with_playbooks(playbooks);

    TestApp {
        dir,
        app: router(state),
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, key: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_is_open() {
    let t = test_app(Some("secret"));
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "twinboss");
}

#[tokio::test]
async fn test_api_key_required() {
    let t = test_app(Some("secret"));

    let (status, body) = send(&t.app, "GET", "/domains", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&t.app, "GET", "/domains", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&t.app, "GET", "/domains", None, Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 0);
}

#[tokio::test]
async fn test_host_domain_roundtrip() {
    let t = test_app(None);

    let (status, body) = send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({ "domain": "HTTPS://Shop.Example.com/", "target_service": "twinboss_api" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"]["domain"], "shop.example.com");
    assert_eq!(body["domain"]["target_port"], 9000);
    assert_eq!(body["domain"]["entrypoint"], "websecure");
    assert_eq!(body["revision"], 1);

    let (_, listed) = send(&t.app, "GET", "/domains", None, None).await;
    assert_eq!(listed["domains"].as_array().unwrap().len(), 1);

    let artifact = std::fs::read_to_string(t.dir.path().join("dynamic").join("domains.yml")).unwrap();
    assert!(artifact.contains("Host(`shop.example.com`)"));
    assert!(artifact.contains("http://twinboss_api:9000"));
}

#[tokio::test]
async fn test_host_domain_errors_are_bad_requests() {
    let t = test_app(None);

    let (status, body) = send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({ "domain": "shop.example.com" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "target_service or target_url is required");

    let (status, body) = send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({ "domain": "   ", "target_url": "http://10.0.0.2:8000" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid domain"));

    let (_, listed) = send(&t.app, "GET", "/domains", None, None).await;
    assert_eq!(listed["revision"], 0);
}

#[tokio::test]
async fn test_storage_and_agents() {
    let t = test_app(None);

    let (_, profile) = send(&t.app, "GET", "/storage/date", None, None).await;
    assert_eq!(profile["status"], "uninitialized");

    let (status, body) = send(
        &t.app,
        "POST",
        "/storage/date/setup",
        Some(json!({ "replicas": 2, "backup_regions": ["eu-west-1"] })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"]["status"], "ready");
    assert_eq!(body["storage"]["settings"]["replicas"], 2);

    let (status, body) = send(
        &t.app,
        "POST",
        "/agents/register",
        Some(json!({ "name": "Ops Bot!", "capabilities": ["Deploy"] })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"]["slug"], "ops-bot");

    let (status, body) = send(&t.app, "POST", "/agents/create", Some(json!({ "name": "ops bot" })), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], "ops-bot");
    assert_eq!(body["rights"], "admin");
    assert_eq!(body["revision"], 3);

    let (_, agents) = send(&t.app, "GET", "/agents", None, None).await;
    assert_eq!(agents["agents"].as_array().unwrap().len(), 1);
    assert_eq!(agents["agents"][0]["capabilities"], json!(["deploy"]));
}

#[tokio::test]
async fn test_register_agent_requires_name() {
    let t = test_app(None);
    let (status, body) = send(&t.app, "POST", "/agents/register", Some(json!({ "name": " " })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn test_twin_execute_with_mock_generator() {
    let t = test_app(None);
    let (status, body) = send(
        &t.app,
        "POST",
        "/agents/twin/execute",
        Some(json!({ "query": "deploy a static site" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["chosen"] == "A" || body["chosen"] == "B");
    assert!(body["scoreA"].is_number());
    assert!(body["output"].as_str().unwrap().starts_with("[MOCK OPENAI OUTPUT]"));
}

#[tokio::test]
async fn test_playbooks() {
    let t = test_app(None);

    let (_, business) = send(&t.app, "POST", "/business/integrate", None, None).await;
    assert_eq!(business["integrations"], json!(["dashboard-proxy", "api-online"]));

    let (_, admin) = send(&t.app, "POST", "/admin/automate", None, None).await;
    assert_eq!(admin["status"], "ok");
    assert_eq!(admin["tasks"].as_array().unwrap().len(), 3);

    let (_, fundraising) = send(&t.app, "POST", "/fundraising/deploy", None, None).await;
    assert_eq!(fundraising["status"], "deployed");
    assert_eq!(fundraising["steps"][0], "create-landing-check");
}

#[tokio::test]
async fn test_business_integrate_reads_hosted_domains() {
    let t = test_app(None);

    let (status, business) = send(&t.app, "POST", "/business/integrate", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(business["domains"], json!([]));

    send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({ "domain": "shop.example.com", "target_service": "twinboss_api" })),
        None,
    )
    .await;

    let (status, business) = send(&t.app, "POST", "/business/integrate", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(business["domains"], json!(["shop.example.com"]));
}

#[tokio::test]
async fn test_unsafe_entrypoint_is_a_bad_request() {
    let t = test_app(None);

    let (status, body) = send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({
            "domain": "shop.example.com",
            "target_service": "twinboss_api",
            "entrypoint": "web\n      service: evil",
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("entrypoint"));
    assert!(!t.dir.path().join("dynamic").join("domains.yml").exists());
}

#[tokio::test]
async fn test_config_summary() {
    let t = test_app(None);
    send(
        &t.app,
        "POST",
        "/domains/host",
        Some(json!({ "domain": "b.example.com", "target_url": "http://10.0.0.9:3000/" })),
        None,
    )
    .await;

    let (status, body) = send(&t.app, "GET", "/config", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys_present"]["openai"], false);
    assert_eq!(body["domains"], json!(["b.example.com"]));
    assert_eq!(body["meta"]["revision"], 1);
}
