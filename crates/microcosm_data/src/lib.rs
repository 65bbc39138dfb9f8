//! Shared data types for the Microcosm world engine.
//!
//! Every crate in the workspace speaks these types: actors and their
//! typed state variants, action proposals and results, world events,
//! voxel geometry, safety counters, and relationship rows. This crate
//! carries no simulation logic.

pub mod action;
pub mod actor;
pub mod event;
pub mod relationship;
pub mod safety;
pub mod voxel;

pub use action::{ActionKind, ActionProposal, ActionResult, ActionStatus, ReasonCode, VoxelSpec};
pub use actor::{Actor, BehaviorMode, EmotionalState, Facing, Needs, Personality, Position};
pub use event::{EventOutcome, EventType, WorldEvent};
pub use relationship::Relationship;
pub use safety::{Intervention, SafetyState};
pub use voxel::{BlockPos, BoundingBox, Structure, VoxelBlock, WorldFeature, Zone};
