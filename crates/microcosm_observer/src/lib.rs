//! Language-model orchestration: tiered backends, budget gating, and
//! background narration.

pub mod backend;
pub mod budget;
pub mod desk;
pub mod orchestrator;

pub use backend::{
    BackendError, HttpBackend, LlmBackend, LlmRequest, LlmResponse, NeutralBackend, RequestKind,
    Tier,
};
pub use budget::{today, BudgetLedger, MemoryLedger};
pub use desk::{Narration, NarrationDesk};
pub use orchestrator::Orchestrator;
