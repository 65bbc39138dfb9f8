//! The HTTP surface wired to a real simulation loop.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use microcosm_core::{AppConfig, Metrics};
use microcosm_data::{ActionKind, ActionProposal, ActionResult, Actor};
use microcosm_io::StorageManager;
use microcosm_lib::SimRuntime;
use microcosm_observer::{MemoryLedger, NarrationDesk, Orchestrator};
use microcosm_server::{AppState, SimHandle};
use tower::util::ServiceExt;

fn create_app(api_key: Option<&str>) -> (Router, Arc<StorageManager>) {
    let mut config = AppConfig::default();
    config.world.seed = Some(5);
    config.world.initial_actors = 3;
    // Keep the clock effectively stopped so assertions are stable.
    config.scheduler.tick_seconds = 60.0;

    let storage = Arc::new(StorageManager::in_memory().unwrap());
    let orchestrator = Arc::new(Orchestrator::new(
        Vec::new(),
        Arc::new(MemoryLedger::default()),
        config.llm.clone(),
    ));
    let desk = NarrationDesk::new(orchestrator);
    let runtime = SimRuntime::new(
        config,
        Arc::clone(&storage),
        desk,
        Arc::new(Metrics::new()),
    );
    let (sim, commands) = SimHandle::channel(32);
    tokio::spawn(runtime.run(commands));

    let state = Arc::new(AppState {
        sim,
        storage: Arc::clone(&storage),
        api_key: api_key.map(str::to_string),
    });
    (microcosm_server::router(state), storage)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_action_accepted_and_visible_in_events() {
    let (app, _storage) = create_app(None);

    let (status, actors) = get_json(&app, "/api/actors").await;
    assert_eq!(status, StatusCode::OK);
    let actors: Vec<Actor> = serde_json::from_value(actors).unwrap();
    assert_eq!(actors.len(), 3);

    let proposal = ActionProposal {
        actor_id: actors[0].id,
        action: ActionKind::Speak {
            message: "good morning".into(),
            target: None,
        },
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&proposal).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let result: ActionResult = serde_json::from_slice(&body).unwrap();
    assert!(result.is_accepted());

    // The journal reaches storage asynchronously.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (status, events) = get_json(&app, "/api/events?event_type=speech").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_actions_accept_raw_client_payloads() {
    let (app, _storage) = create_app(None);

    let (_, actors) = get_json(&app, "/api/actors").await;
    let actor_id = actors[0]["id"].as_str().unwrap().to_string();
    // The documented shape: action string, params object, optional tick.
    let body = format!(
        r#"{{"actor_id":"{actor_id}","action":"speak","params":{{"message":"hi"}},"tick":5}}"#
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let result: ActionResult = serde_json::from_slice(&bytes).unwrap();
    assert!(result.is_accepted());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_actor_is_not_found() {
    let (app, _storage) = create_app(None);
    let proposal = ActionProposal {
        actor_id: uuid::Uuid::new_v4(),
        action: ActionKind::Move {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
    };
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&proposal).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admin_speed_requires_key_and_sticks() {
    let (app, storage) = create_app(Some("hush"));

    let unauthorized = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/speed")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"speed":2.0}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let authorized = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/speed")
                .header("content-type", "application/json")
                .header("authorization", "Bearer hush")
                .body(Body::from(r#"{"speed":2.0}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(authorized.status(), StatusCode::OK);
    assert_eq!(storage.controls().unwrap().speed, 2.0);

    let (status, stats) = get_json(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["speed"], 2.0);
    assert_eq!(stats["living_actors"], 3);
}
