//! Microcosm: a tick-driven voxel world with arbitrated actions and a
//! tiered narrative observer.
//!
//! The workspace crates split the system along its seams: data types,
//! the synchronous simulation core, language-model orchestration,
//! persistence, and the HTTP surface. This crate wires them into a
//! runnable instance.

pub mod runtime;

pub use runtime::SimRuntime;
