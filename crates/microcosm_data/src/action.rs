use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::voxel::BlockPos;

/// Closed vocabulary of machine-readable rejection reasons.
///
/// Every rejected proposal carries exactly one of these alongside its
/// human-readable message, so callers can branch without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    EntityNotFound,
    EntityDead,
    PositionOccupied,
    PositionEmpty,
    ZoneOverlap,
    ZoneTooLarge,
    TooManyVoxels,
    MissingParams,
    Collision,
    MoveTooFar,
    NoPermission,
    OutOfBounds,
    StructureOverlap,
    InCooldown,
}

impl ReasonCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::EntityNotFound => "entity_not_found",
            ReasonCode::EntityDead => "entity_dead",
            ReasonCode::PositionOccupied => "position_occupied",
            ReasonCode::PositionEmpty => "position_empty",
            ReasonCode::ZoneOverlap => "zone_overlap",
            ReasonCode::ZoneTooLarge => "zone_too_large",
            ReasonCode::TooManyVoxels => "too_many_voxels",
            ReasonCode::MissingParams => "missing_params",
            ReasonCode::Collision => "collision",
            ReasonCode::MoveTooFar => "move_too_far",
            ReasonCode::NoPermission => "no_permission",
            ReasonCode::OutOfBounds => "out_of_bounds",
            ReasonCode::StructureOverlap => "structure_overlap",
            ReasonCode::InCooldown => "in_cooldown",
        }
    }
}

/// A voxel to be placed as part of a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelSpec {
    pub pos: BlockPos,
    pub color: String,
    pub material: String,
    #[serde(default = "default_collidable")]
    pub collidable: bool,
}

fn default_collidable() -> bool {
    true
}

/// What an actor is asking the world to do. Validated and applied as a
/// unit by the arbiter; never partially applied.
///
/// On the wire the variant name travels as `"action"` and the fields as
/// a `"params"` object, flattened into [`ActionProposal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum ActionKind {
    PlaceVoxel {
        voxels: Vec<VoxelSpec>,
    },
    DestroyVoxel {
        positions: Vec<BlockPos>,
    },
    PlaceStructure {
        name: String,
        kind: String,
        voxels: Vec<VoxelSpec>,
    },
    ClaimZone {
        name: String,
        min: BlockPos,
        max: BlockPos,
        #[serde(default)]
        open_building: bool,
    },
    Move {
        x: f64,
        y: f64,
        z: f64,
    },
    Interact {
        target: Uuid,
        verb: String,
        #[serde(default)]
        detail: Option<String>,
    },
    Speak {
        message: String,
        #[serde(default)]
        target: Option<Uuid>,
    },
}

impl ActionKind {
    /// Stable name used in event records and logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::PlaceVoxel { .. } => "place_voxel",
            ActionKind::DestroyVoxel { .. } => "destroy_voxel",
            ActionKind::PlaceStructure { .. } => "place_structure",
            ActionKind::ClaimZone { .. } => "claim_zone",
            ActionKind::Move { .. } => "move",
            ActionKind::Interact { .. } => "interact",
            ActionKind::Speak { .. } => "speak",
        }
    }
}

/// An actor's request for a world mutation, queued until the arbiter
/// picks it up on the simulation thread.
///
/// Wire shape: `{"actor_id": ..., "action": "move", "params": {...}}`.
/// Extra fields such as a client-side tick are accepted and ignored;
/// the arbiter journals the world tick at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionProposal {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub action: ActionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Accepted,
    Rejected,
}

/// Outcome of arbitration, returned to the proposer and mirrored into
/// the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Action-specific payload, e.g. ids of created structures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResult {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            status: ActionStatus::Accepted,
            reason_code: None,
            reason: None,
            data: None,
        }
    }

    #[must_use]
    pub fn accepted_with(data: serde_json::Value) -> Self {
        Self {
            status: ActionStatus::Accepted,
            reason_code: None,
            reason: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn rejected(code: ReasonCode, reason: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Rejected,
            reason_code: Some(code),
            reason: Some(reason.into()),
            data: None,
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == ActionStatus::Accepted
    }
}
