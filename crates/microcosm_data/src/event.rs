use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::Position;

/// Category of a recorded world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Action,
    Speech,
    Death,
    Birth,
    Intervention,
    Narration,
    System,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Action => "action",
            EventType::Speech => "speech",
            EventType::Death => "death",
            EventType::Birth => "birth",
            EventType::Intervention => "intervention",
            EventType::Narration => "narration",
            EventType::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Accepted,
    Rejected,
    Info,
}

/// Immutable, append-only record of something that happened in the world.
/// Ids are assigned by the event log and strictly increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: i64,
    pub tick: u64,
    pub actor_id: Option<Uuid>,
    pub event_type: EventType,
    /// Stable action name, e.g. "place_voxel", when the event records one.
    pub action: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    pub result: EventOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Relevance weight in [0, 1] used when assembling prompts.
    pub importance: f32,
    pub created_at: DateTime<Utc>,
}

impl WorldEvent {
    /// New unassigned event; the log sets `id` when appending.
    #[must_use]
    pub fn new(tick: u64, event_type: EventType, result: EventOutcome) -> Self {
        Self {
            id: 0,
            tick,
            actor_id: None,
            event_type,
            action: None,
            params: serde_json::Value::Null,
            result,
            reason: None,
            position: None,
            importance: 0.5,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>, params: serde_json::Value) -> Self {
        self.action = Some(action.into());
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }
}
