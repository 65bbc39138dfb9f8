//! HTTP control surface for a running world.
//!
//! The simulation loop is the single writer; handlers never touch the
//! [`World`] directly. Proposals and snapshot reads go over a command
//! channel and wait on a oneshot reply, while event history and the
//! pause/speed controls come from storage.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use microcosm_data::{ActionProposal, ActionResult, Actor, EventType, ReasonCode};
use microcosm_io::{EventQuery, StorageManager};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

const DEFAULT_EVENT_LIMIT: usize = 100;
const MAX_EVENT_LIMIT: usize = 1000;
const MAX_SPEED: f64 = 16.0;

/// Requests the HTTP layer sends to the simulation loop.
pub enum SimCommand {
    Propose(ActionProposal, oneshot::Sender<ActionResult>),
    Actors(oneshot::Sender<Vec<Actor>>),
    Stats(oneshot::Sender<SimStats>),
}

/// Snapshot of simulation counters for the stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    pub tick: u64,
    pub living_actors: usize,
    pub blocks: usize,
    pub structures: usize,
    pub zones: usize,
    pub last_event_id: i64,
}

/// Cloneable sender half of the simulation command channel.
#[derive(Clone)]
pub struct SimHandle {
    tx: mpsc::Sender<SimCommand>,
}

impl SimHandle {
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SimCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Sends a proposal and waits for arbitration. `None` means the
    /// simulation loop is gone.
    pub async fn propose(&self, proposal: ActionProposal) -> Option<ActionResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SimCommand::Propose(proposal, reply_tx))
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    pub async fn actors(&self) -> Option<Vec<Actor>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(SimCommand::Actors(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    pub async fn stats(&self) -> Option<SimStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(SimCommand::Stats(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }
}

pub struct AppState {
    pub sim: SimHandle,
    pub storage: Arc<StorageManager>,
    /// API key for admin endpoints (None = open mode).
    pub api_key: Option<String>,
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/actions", post(post_action))
        .route("/api/actors", get(get_actors))
        .route("/api/events", get(get_events))
        .route("/api/stats", get(get_stats))
        .route("/api/admin/pause", post(set_pause))
        .route("/api/admin/speed", post(set_speed))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP status for an arbitration outcome.
fn status_for(result: &ActionResult) -> StatusCode {
    if result.is_accepted() {
        return StatusCode::OK;
    }
    match result.reason_code {
        Some(ReasonCode::EntityNotFound) => StatusCode::NOT_FOUND,
        Some(ReasonCode::NoPermission) => StatusCode::FORBIDDEN,
        Some(
            ReasonCode::EntityDead
            | ReasonCode::PositionOccupied
            | ReasonCode::PositionEmpty
            | ReasonCode::ZoneOverlap
            | ReasonCode::StructureOverlap
            | ReasonCode::Collision
            | ReasonCode::InCooldown,
        ) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn sim_gone() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": "simulation is not running" })),
    )
        .into_response()
}

async fn post_action(
    State(state): State<Arc<AppState>>,
    Json(proposal): Json<ActionProposal>,
) -> impl IntoResponse {
    match state.sim.propose(proposal).await {
        Some(result) => (status_for(&result), Json(result)).into_response(),
        None => sim_gone(),
    }
}

async fn get_actors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.sim.actors().await {
        Some(actors) => Json(actors).into_response(),
        None => sim_gone(),
    }
}

#[derive(Debug, Deserialize)]
struct EventsParams {
    since_id: Option<i64>,
    actor_id: Option<Uuid>,
    event_type: Option<EventType>,
    tick_min: Option<u64>,
    tick_max: Option<u64>,
    /// Spatial filter; all four must be present together.
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    radius: Option<f64>,
    limit: Option<usize>,
}

impl EventsParams {
    fn near(&self) -> Option<(f64, f64, f64, f64)> {
        match (self.x, self.y, self.z, self.radius) {
            (Some(x), Some(y), Some(z), Some(r)) => Some((x, y, z, r)),
            _ => None,
        }
    }
}

async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsParams>,
) -> impl IntoResponse {
    let query = EventQuery {
        since_id: params.since_id,
        actor_id: params.actor_id,
        event_type: params.event_type,
        tick_min: params.tick_min,
        tick_max: params.tick_max,
        near: params.near(),
        limit: Some(
            params
                .limit
                .unwrap_or(DEFAULT_EVENT_LIMIT)
                .min(MAX_EVENT_LIMIT),
        ),
    };
    match state.storage.query_events(query) {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            tracing::error!("event query failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "storage unavailable" })),
            )
                .into_response()
        }
    }
}

async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(stats) = state.sim.stats().await else {
        return sim_gone();
    };
    let controls = state.storage.controls().unwrap_or_default();
    Json(serde_json::json!({
        "tick": stats.tick,
        "living_actors": stats.living_actors,
        "blocks": stats.blocks,
        "structures": stats.structures,
        "zones": stats.zones,
        "last_event_id": stats.last_event_id,
        "paused": controls.pause,
        "speed": controls.speed,
    }))
    .into_response()
}

/// Validate API key from the Authorization header. Returns None when
/// the request may proceed. When no key is configured all requests
/// are allowed.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Option<axum::response::Response> {
    let expected = state.api_key.as_ref()?;

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "));

    match token {
        Some(t) if t == expected => None,
        _ => {
            tracing::warn!("rejected admin request: invalid or missing API key");
            Some(
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "invalid or missing API key" })),
                )
                    .into_response(),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct PauseBody {
    pause: bool,
}

async fn set_pause(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PauseBody>,
) -> impl IntoResponse {
    if let Some(resp) = check_auth(&state, &headers) {
        return resp;
    }
    state.storage.set_pause(body.pause);
    Json(serde_json::json!({ "pause": body.pause })).into_response()
}

#[derive(Debug, Deserialize)]
struct SpeedBody {
    speed: f64,
}

async fn set_speed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SpeedBody>,
) -> impl IntoResponse {
    if let Some(resp) = check_auth(&state, &headers) {
        return resp;
    }
    if !body.speed.is_finite() || body.speed <= 0.0 || body.speed > MAX_SPEED {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("speed must be in (0, {MAX_SPEED}]")
            })),
        )
            .into_response();
    }
    state.storage.set_speed(body.speed);
    Json(serde_json::json!({ "speed": body.speed })).into_response()
}
