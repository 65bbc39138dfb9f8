//! World simulation core: arbitration, spatial state, scheduling, and
//! safety correction.
//!
//! The core is deliberately synchronous. One task owns the [`World`]
//! and drives it through [`TickScheduler`]; everything asynchronous
//! (HTTP, storage, language models) lives in the surrounding crates
//! and talks to the core through channels.

pub mod arbiter;
pub mod config;
pub mod encounter;
pub mod event_log;
pub mod metrics;
pub mod narrative;
pub mod relationship;
pub mod safety;
pub mod scheduler;
pub mod voxel;
pub mod world;

pub use config::AppConfig;
pub use encounter::EncounterIndex;
pub use event_log::{EventLog, EventSink};
pub use metrics::{init_logging, Metrics};
pub use narrative::{drama_score, drift_meta_awareness, should_use_llm, CognitionCue};
pub use relationship::RelationshipTable;
pub use safety::{SafetyCheck, SafetyMonitor};
pub use scheduler::{MaintenanceJob, TickReport, TickScheduler};
pub use voxel::VoxelSpace;
pub use world::World;
