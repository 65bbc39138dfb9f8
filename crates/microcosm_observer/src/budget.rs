//! Daily spend ledger consulted before every metered call.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

use crate::backend::Tier;

/// Read-before-spend accounting for metered tiers, keyed by UTC
/// calendar day. Implementations must be safe to call from multiple
/// tasks; the in-memory default wraps a mutex, the durable one lives
/// in the storage crate.
pub trait BudgetLedger: Send + Sync {
    /// Cents already spent on `tier` during `day`.
    fn spent(&self, day: NaiveDate, tier: Tier) -> i64;
    /// Adds `cents` to the day's accumulator for `tier`.
    fn record(&self, day: NaiveDate, tier: Tier, cents: i64);
}

/// The current UTC budget day.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// In-memory ledger for tests and storage-less runs.
#[derive(Default)]
pub struct MemoryLedger {
    spend: Mutex<HashMap<(NaiveDate, Tier), i64>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BudgetLedger for MemoryLedger {
    fn spent(&self, day: NaiveDate, tier: Tier) -> i64 {
        let spend = self.spend.lock().unwrap_or_else(|e| e.into_inner());
        spend.get(&(day, tier)).copied().unwrap_or(0)
    }

    fn record(&self, day: NaiveDate, tier: Tier, cents: i64) {
        let mut spend = self.spend.lock().unwrap_or_else(|e| e.into_inner());
        *spend.entry((day, tier)).or_insert(0) += cents;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_accumulates_per_day_and_tier() {
        let ledger = MemoryLedger::new();
        let day = today();
        assert_eq!(ledger.spent(day, Tier::God), 0);
        ledger.record(day, Tier::God, 5);
        ledger.record(day, Tier::God, 5);
        ledger.record(day, Tier::Premium, 1);
        assert_eq!(ledger.spent(day, Tier::God), 10);
        assert_eq!(ledger.spent(day, Tier::Premium), 1);
    }
}
