//! Integration tests for job submission through the HTTP gateway.

mod common;

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get, post_json, test_config, write_asset};
use serde_json::json;
use simgate_api::config::ServerConfig;
use simgate_sim::host::SimulationHost;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: simulate runs the scene and reports frames and duration
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simulate_completes_with_frames_and_duration() {
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let out = dir.path().join("renders");
    let mut test = build_test_app(test_config(), true);

    let response = post_json(
        test.app.clone(),
        "/simulate",
        json!({
            "asset_path": asset,
            "output_directory": out,
            "frame_count": 50,
            "frames_per_second": 25,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert!(json["job_id"].is_string());
    assert_eq!(json["frame_count"], 50);
    assert_eq!(json["frames_captured"], 50);
    assert!((json["duration_secs"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    let job_id = json["job_id"].as_str().unwrap().replace('-', "");
    assert_eq!(
        json["video_path"],
        out.join(format!("sim_run_{job_id}.mp4")).to_string_lossy().as_ref()
    );
    assert!(json.get("error").is_none());

    let ctx = test.stop().unwrap();
    assert_eq!(ctx.host.top_level_nodes(), vec!["CaptureCamera"]);
}

// ---------------------------------------------------------------------------
// Test: convert output can be fed straight into simulate
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn converted_asset_can_be_simulated() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_asset(dir.path());
    let usd_dir = dir.path().join("usd");
    let test = build_test_app(test_config(), true);

    let response = post_json(
        test.app.clone(),
        "/convert",
        json!({
            "source_asset_path": source,
            "destination_directory": usd_dir,
            "mass": 0.25,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["destination_directory"], usd_dir.to_string_lossy().as_ref());

    let response = post_json(
        test.app.clone(),
        "/simulate",
        json!({
            "asset_path": usd_dir.join("pen.obj"),
            "output_directory": dir.path().join("out"),
            "render_video": false,
            "frame_count": 20,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["frame_count"], 20);
    assert_eq!(json["frames_captured"], 0);
    assert!(json.get("video_path").is_none());
}

// ---------------------------------------------------------------------------
// Test: convert of a missing source fails with 500 and an error message
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn convert_missing_source_returns_failed() {
    let dir = tempfile::tempdir().unwrap();
    let test = build_test_app(test_config(), true);

    let response = post_json(
        test.app.clone(),
        "/convert",
        json!({
            "source_asset_path": dir.path().join("does-not-exist.glb"),
            "destination_directory": dir.path().join("usd"),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["code"], "JOB_FAILED");
    assert!(!json["error"].as_str().unwrap().is_empty());
    assert!(json["job_id"].is_string());
}

// ---------------------------------------------------------------------------
// Test: simulate of a missing asset fails and the next job still runs
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_simulation_does_not_poison_the_driver() {
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let test = build_test_app(test_config(), true);

    let response = post_json(
        test.app.clone(),
        "/simulate",
        json!({
            "asset_path": dir.path().join("missing.usd"),
            "output_directory": dir.path().join("out"),
            "frame_count": 5,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("missing.usd"));

    let response = post_json(
        test.app.clone(),
        "/simulate",
        json!({
            "asset_path": asset,
            "output_directory": dir.path().join("out"),
            "frame_count": 5,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: concurrent requests each get their own result
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_each_get_one_result() {
    let dir = tempfile::tempdir().unwrap();
    let asset = write_asset(dir.path());
    let test = build_test_app(test_config(), true);

    let mut tasks = Vec::new();
    for i in 0..6 {
        let app = test.app.clone();
        let body = json!({
            "asset_path": asset,
            "output_directory": dir.path().join(format!("out{i}")),
            "render_video": false,
            "frame_count": 10,
        });
        tasks.push(tokio::spawn(async move {
            let response = post_json(app, "/simulate", body).await;
            assert_eq!(response.status(), StatusCode::OK);
            body_json(response).await
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let json = task.await.unwrap();
        assert_eq!(json["status"], "completed");
        ids.insert(json["job_id"].as_str().unwrap().to_string());
    }
    assert_eq!(ids.len(), 6);
    assert!(test.results.is_empty());
}

// ---------------------------------------------------------------------------
// Test: no result before the deadline returns 504 with status "timeout"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unanswered_job_times_out_with_504() {
    let config = ServerConfig {
        convert_timeout_secs: 0,
        ..test_config()
    };
    let test = build_test_app(config, false);

    let response = post_json(
        test.app.clone(),
        "/convert",
        json!({
            "source_asset_path": "/tmp/mesh.glb",
            "destination_directory": "/tmp/usd",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["status"], "timeout");
    assert_eq!(json["code"], "JOB_TIMEOUT");

    // The job is still queued for the simulation thread.
    let json = body_json(get(test.app.clone(), "/").await).await;
    assert_eq!(json["queue_depth"], 1);
}

// ---------------------------------------------------------------------------
// Test: invalid payloads are rejected with 400 before enqueue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_required_field_returns_400() {
    let test = build_test_app(test_config(), false);

    let response = post_json(
        test.app.clone(),
        "/simulate",
        json!({ "output_directory": "/tmp/out" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("asset_path"));

    let json = body_json(get(test.app.clone(), "/").await).await;
    assert_eq!(json["queue_depth"], 0);
}

#[tokio::test]
async fn non_positive_numbers_return_400() {
    let test = build_test_app(test_config(), false);

    let cases = [
        (
            "/simulate",
            json!({ "asset_path": "a.usd", "output_directory": "/tmp", "frame_count": 0 }),
        ),
        (
            "/simulate",
            json!({ "asset_path": "a.usd", "output_directory": "/tmp", "frames_per_second": -5 }),
        ),
        (
            "/simulate",
            json!({ "asset_path": "a.usd", "output_directory": "/tmp", "scale_factor": 0.0 }),
        ),
        (
            "/convert",
            json!({ "source_asset_path": "a.glb", "destination_directory": "/tmp", "mass": -1.0 }),
        ),
    ];

    for (uri, body) in cases {
        let response = post_json(test.app.clone(), uri, body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
    }
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let test = build_test_app(test_config(), false);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/convert")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}
