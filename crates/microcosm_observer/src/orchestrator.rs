//! Tier routing, budget gating, and the fallback fold.

use std::sync::Arc;

use microcosm_core::config::LlmConfig;
use tracing::{debug, warn};

use crate::backend::{LlmBackend, LlmRequest, LlmResponse, NeutralBackend, RequestKind, Tier};
use crate::budget::{today, BudgetLedger};

/// Importance at or above which cognition is routed to the premium
/// tier instead of the local default.
const PREMIUM_IMPORTANCE: f32 = 0.7;

/// Routes each request to the cheapest tier that fits its kind,
/// importance, and remaining daily budget, then walks the fallback
/// chain on failure. The chain terminates in a hardcoded neutral
/// response, so `complete` is infallible.
pub struct Orchestrator {
    backends: Vec<Arc<dyn LlmBackend>>,
    ledger: Arc<dyn BudgetLedger>,
    config: LlmConfig,
}

impl Orchestrator {
    /// `backends` may carry at most one backend per tier; requests
    /// skip tiers with no backend.
    pub fn new(
        backends: Vec<Arc<dyn LlmBackend>>,
        ledger: Arc<dyn BudgetLedger>,
        config: LlmConfig,
    ) -> Self {
        Self {
            backends,
            ledger,
            config,
        }
    }

    /// The tier a request starts at before budget gating.
    #[must_use]
    pub fn route(&self, request: &LlmRequest) -> Tier {
        match request.kind {
            RequestKind::GodObservation | RequestKind::WorldUpdate | RequestKind::SagaChapter => {
                Tier::God
            }
            RequestKind::ActorCognition if request.importance >= PREMIUM_IMPORTANCE => {
                Tier::Premium
            }
            RequestKind::ActorCognition => Tier::Local,
        }
    }

    fn budget_for(&self, tier: Tier) -> Option<(i64, i64)> {
        match tier {
            Tier::God => Some((
                self.config.god_daily_budget_cents,
                self.config.god_call_cost_cents,
            )),
            Tier::Premium => Some((
                self.config.premium_daily_budget_cents,
                self.config.premium_call_cost_cents,
            )),
            Tier::Local => None,
        }
    }

    /// Applies read-before-spend gating: returns the first tier at or
    /// below `tier` whose projected cost still fits today's budget.
    fn gate(&self, mut tier: Tier) -> Tier {
        let day = today();
        loop {
            match self.budget_for(tier) {
                None => return tier,
                Some((budget, cost)) => {
                    if self.ledger.spent(day, tier) + cost <= budget {
                        return tier;
                    }
                }
            }
            debug!(tier = tier.as_str(), "daily budget exhausted, downgrading");
            match tier.downgrade() {
                Some(next) => tier = next,
                None => return Tier::Local,
            }
        }
    }

    fn backend_at(&self, tier: Tier) -> Option<&Arc<dyn LlmBackend>> {
        self.backends.iter().find(|b| b.tier() == tier)
    }

    /// Completes a request, degrading through cheaper tiers on budget
    /// exhaustion or transport failure. Never fails and never retries
    /// a tier; an abandoned call is simply dropped.
    pub async fn complete(&self, request: &LlmRequest) -> LlmResponse {
        let mut tier = self.gate(self.route(request));
        loop {
            if let Some(backend) = self.backend_at(tier) {
                if let Some((_, cost)) = self.budget_for(tier) {
                    self.ledger.record(today(), tier, cost);
                }
                match backend.attempt(request).await {
                    Ok(response) => return response,
                    Err(err) => {
                        warn!(tier = tier.as_str(), error = %err, "backend failed, falling back");
                    }
                }
            }
            match tier.downgrade() {
                Some(next) => tier = self.gate(next),
                None => break,
            }
        }
        NeutralBackend
            .attempt(request)
            .await
            .expect("neutral backend is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        tier: Tier,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubBackend {
        fn new(tier: Tier, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                tier,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for StubBackend {
        fn tier(&self) -> Tier {
            self.tier
        }

        async fn attempt(&self, _request: &LlmRequest) -> Result<LlmResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackendError::Status {
                    status: 503,
                    body: "down".into(),
                })
            } else {
                Ok(LlmResponse {
                    text: format!("{} says hello", self.tier.as_str()),
                    tier: self.tier,
                })
            }
        }
    }

    use crate::backend::BackendError;
    use crate::budget::MemoryLedger;

    fn request(kind: RequestKind, importance: f32) -> LlmRequest {
        LlmRequest {
            kind,
            prompt: "what now".into(),
            importance,
            actor_id: None,
        }
    }

    fn orchestrator(
        backends: Vec<Arc<dyn LlmBackend>>,
        ledger: Arc<dyn BudgetLedger>,
    ) -> Orchestrator {
        Orchestrator::new(backends, ledger, LlmConfig::default())
    }

    #[tokio::test]
    async fn test_routing_by_kind_and_importance() {
        let o = orchestrator(Vec::new(), Arc::new(MemoryLedger::new()));
        assert_eq!(o.route(&request(RequestKind::GodObservation, 0.0)), Tier::God);
        assert_eq!(o.route(&request(RequestKind::ActorCognition, 0.9)), Tier::Premium);
        assert_eq!(o.route(&request(RequestKind::ActorCognition, 0.1)), Tier::Local);
    }

    #[tokio::test]
    async fn test_exhausted_budget_never_reaches_top_tier() {
        let god = StubBackend::new(Tier::God, false);
        let local = StubBackend::new(Tier::Local, false);
        let ledger = Arc::new(MemoryLedger::new());
        let config = LlmConfig::default();
        ledger.record(today(), Tier::God, config.god_daily_budget_cents);
        ledger.record(today(), Tier::Premium, config.premium_daily_budget_cents);

        let o = orchestrator(
            vec![god.clone() as Arc<dyn LlmBackend>, local.clone()],
            ledger,
        );
        let response = o.complete(&request(RequestKind::GodObservation, 1.0)).await;
        assert_eq!(response.tier, Tier::Local);
        assert_eq!(god.calls.load(Ordering::SeqCst), 0);
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_cascades_down() {
        let god = StubBackend::new(Tier::God, true);
        let premium = StubBackend::new(Tier::Premium, true);
        let local = StubBackend::new(Tier::Local, false);
        let o = orchestrator(
            vec![
                god.clone() as Arc<dyn LlmBackend>,
                premium.clone(),
                local.clone(),
            ],
            Arc::new(MemoryLedger::new()),
        );
        let response = o.complete(&request(RequestKind::SagaChapter, 1.0)).await;
        assert_eq!(response.tier, Tier::Local);
        assert_eq!(god.calls.load(Ordering::SeqCst), 1);
        assert_eq!(premium.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_outage_yields_neutral_response() {
        let local = StubBackend::new(Tier::Local, true);
        let o = orchestrator(
            vec![local as Arc<dyn LlmBackend>],
            Arc::new(MemoryLedger::new()),
        );
        let response = o.complete(&request(RequestKind::ActorCognition, 0.0)).await;
        assert!(!response.text.is_empty());
        assert_eq!(response.tier, Tier::Local);
    }

    #[tokio::test]
    async fn test_spend_recorded_per_metered_call() {
        let god = StubBackend::new(Tier::God, false);
        let ledger = Arc::new(MemoryLedger::new());
        let o = orchestrator(vec![god as Arc<dyn LlmBackend>], ledger.clone());
        let config = LlmConfig::default();
        o.complete(&request(RequestKind::GodObservation, 1.0)).await;
        assert_eq!(ledger.spent(today(), Tier::God), config.god_call_cost_cents);
    }
}
