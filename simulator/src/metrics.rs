//! Simulation metrics.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome counters for one simulation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationMetrics {
    /// Registry operations attempted.
    pub operations_total: u64,
    /// Operations that succeeded.
    pub operations_succeeded: u64,
    /// Failed operations by error code.
    pub failures_by_code: BTreeMap<String, u64>,
    /// Scenario expectations and assertions that held.
    pub checks_passed: u64,
    /// Rent forwarded to owners.
    pub rent_volume: u128,
    /// Deposits paid back to tenants.
    pub deposits_returned: u128,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.operations_total += 1;
        self.operations_succeeded += 1;
    }

    pub fn record_failure(&mut self, code: &str) {
        self.operations_total += 1;
        *self.failures_by_code.entry(code.to_string()).or_insert(0) += 1;
    }

    pub fn record_check(&mut self) {
        self.checks_passed += 1;
    }

    pub fn record_rent(&mut self, amount: u128) {
        self.rent_volume = self.rent_volume.saturating_add(amount);
    }

    pub fn record_deposit_returned(&mut self, amount: u128) {
        self.deposits_returned = self.deposits_returned.saturating_add(amount);
    }

    pub fn operations_failed(&self) -> u64 {
        self.failures_by_code.values().sum()
    }

    /// Share of operations that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.operations_total == 0 {
            return 0.0;
        }

        self.operations_succeeded as f64 / self.operations_total as f64
    }
}
