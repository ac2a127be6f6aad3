//! Control-surface tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use pressroom_publishers::{Content, Destination, PublisherRegistry};
use pressroom_scheduler::{
    Coordinator, MemoryStore, NewSchedule, ScheduleStatus, ScheduleStore, Scheduler,
};
use pressroom_web::create_router;

struct TestApp {
    store: Arc<MemoryStore>,
    scheduler: Scheduler,
    router: Router,
}

/// No adapters are registered, so every attempt fails permanently without
/// touching the network.
async fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store
        .put_content(Content {
            id: "content-1".to_string(),
            user_id: "user-1".to_string(),
            campaign_id: None,
            title: "Hello".to_string(),
            body: "World".to_string(),
            excerpt: None,
            canonical_url: None,
            tags: vec![],
        })
        .await;
    store
        .put_destination(Destination {
            id: "dest-1".to_string(),
            platform: "mastodon".to_string(),
            config: json!({}),
            active: true,
        })
        .await;

    let coordinator = Coordinator::new(store.clone(), store.clone(), PublisherRegistry::new());
    let scheduler = Scheduler::new(Arc::new(coordinator));
    TestApp {
        store,
        router: create_router(scheduler.clone()),
        scheduler,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post(router: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::post("/api/scheduler")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn check_pending_runs_a_pass() {
    let app = app().await;
    let schedule = app
        .scheduler
        .enqueue(NewSchedule::now("content-1", "dest-1"))
        .await
        .unwrap();

    let (status, body) = post(&app.router, json!({ "action": "checkPending" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["report"]["due"], json!(1));
    assert_eq!(body["report"]["failed"], json!(1));

    let stored = app.store.get(&schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScheduleStatus::Failed);
}

#[tokio::test]
async fn retry_requeues_failed_schedule() {
    let app = app().await;
    let schedule = app
        .scheduler
        .enqueue(NewSchedule::now("content-1", "dest-1"))
        .await
        .unwrap();
    app.scheduler.trigger_now().await.unwrap();

    let (status, body) = post(
        &app.router,
        json!({ "action": "retry", "scheduleId": schedule.id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"]["status"], json!("PENDING"));
    assert_eq!(body["schedule"]["error"], Value::Null);
    assert_eq!(body["schedule"]["attempts"], json!(1));
}

#[tokio::test]
async fn retry_of_pending_schedule_conflicts() {
    let app = app().await;
    let schedule = app
        .scheduler
        .enqueue(NewSchedule::now("content-1", "dest-1"))
        .await
        .unwrap();

    let (status, body) = post(
        &app.router,
        json!({ "action": "retry", "scheduleId": schedule.id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn unknown_schedule_is_not_found() {
    let app = app().await;
    let (status, _) = post(
        &app.router,
        json!({ "action": "publishNow", "scheduleId": "missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_now_reports_outcome() {
    let app = app().await;
    let later = chrono::Utc::now() + chrono::Duration::days(1);
    let schedule = app
        .scheduler
        .enqueue(NewSchedule::at("content-1", "dest-1", later))
        .await
        .unwrap();

    let (status, body) = post(
        &app.router,
        json!({ "action": "publishNow", "scheduleId": schedule.id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["outcome"], json!("failed"));
}

#[tokio::test]
async fn cancel_then_cancel_again_conflicts() {
    let app = app().await;
    let schedule = app
        .scheduler
        .enqueue(NewSchedule::now("content-1", "dest-1"))
        .await
        .unwrap();
    let request = json!({ "action": "cancel", "scheduleId": schedule.id });

    let (status, body) = post(&app.router, request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"]["status"], json!("CANCELLED"));

    let (status, _) = post(&app.router, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_action_is_rejected() {
    let app = app().await;
    let (status, _) = post(&app.router, json!({ "action": "retry" })).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn health_query_reports_statistics() {
    let app = app().await;
    app.scheduler
        .enqueue(NewSchedule::now("content-1", "dest-1"))
        .await
        .unwrap();

    let (status, body) = get(&app.router, "/api/scheduler?action=health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("stopped"));
    assert_eq!(body["statistics"]["pending"], json!(1));
    assert_eq!(body["statistics"]["total"], json!(1));
    assert_eq!(body["recentActivity"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn status_query_and_unknown_query() {
    let app = app().await;

    let (status, body) = get(&app.router, "/api/scheduler?action=status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRunning"], json!(false));

    let (status, _) = get(&app.router, "/api/scheduler?action=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/scheduler").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn liveness_endpoint() {
    let app = app().await;
    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["scheduler"]["pollIntervalMs"], json!(60_000));
}
