//! Registry operation counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Counters updated by the registry façade.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    /// Properties registered.
    pub properties_registered: AtomicU64,
    /// Successful owner availability updates.
    pub availability_updates: AtomicU64,
    /// Agreements created.
    pub agreements_created: AtomicU64,
    /// Agreements currently holding a deposit.
    pub agreements_active: AtomicU64,
    /// Deposits returned.
    pub deposits_returned: AtomicU64,
    /// Emergency recoveries performed.
    pub funds_recoveries: AtomicU64,
    /// Operations rejected by validation or authorization.
    pub operations_rejected: AtomicU64,
    /// Operations aborted because the ledger refused a transfer.
    pub transfers_failed: AtomicU64,
    /// Events published.
    pub events_emitted: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property_registered(&self) {
        self.properties_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn availability_updated(&self) {
        self.availability_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn agreement_created(&self) {
        self.agreements_created.fetch_add(1, Ordering::Relaxed);
        self.agreements_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deposit_returned(&self) {
        self.deposits_returned.fetch_add(1, Ordering::Relaxed);
        self.agreements_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn funds_recovered(&self) {
        self.funds_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation, split by origin.
    pub fn operation_failed(&self, external: bool) {
        if external {
            self.transfers_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.operations_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset the active gauge, e.g. after restoring a snapshot.
    pub fn set_agreements_active(&self, count: u64) {
        self.agreements_active.store(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            properties_registered: self.properties_registered.load(Ordering::Relaxed),
            availability_updates: self.availability_updates.load(Ordering::Relaxed),
            agreements_created: self.agreements_created.load(Ordering::Relaxed),
            agreements_active: self.agreements_active.load(Ordering::Relaxed),
            deposits_returned: self.deposits_returned.load(Ordering::Relaxed),
            funds_recoveries: self.funds_recoveries.load(Ordering::Relaxed),
            operations_rejected: self.operations_rejected.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let rows: [(&str, &str, &str, u64); 9] = [
            ("properties_registered_total", "counter", "Properties registered", s.properties_registered),
            ("availability_updates_total", "counter", "Owner availability updates", s.availability_updates),
            ("agreements_created_total", "counter", "Rental agreements created", s.agreements_created),
            ("agreements_active", "gauge", "Agreements holding a deposit", s.agreements_active),
            ("deposits_returned_total", "counter", "Security deposits returned", s.deposits_returned),
            ("funds_recoveries_total", "counter", "Emergency fund recoveries", s.funds_recoveries),
            ("operations_rejected_total", "counter", "Operations rejected by validation", s.operations_rejected),
            ("transfers_failed_total", "counter", "Operations aborted by the ledger", s.transfers_failed),
            ("events_emitted_total", "counter", "Events published", s.events_emitted),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in rows {
            let _ = writeln!(out, "# HELP rentescrow_{} {}", name, help);
            let _ = writeln!(out, "# TYPE rentescrow_{} {}", name, kind);
            let _ = writeln!(out, "rentescrow_{} {}", name, value);
            out.push('\n');
        }
        out
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub properties_registered: u64,
    pub availability_updates: u64,
    pub agreements_created: u64,
    pub agreements_active: u64,
    pub deposits_returned: u64,
    pub funds_recoveries: u64,
    pub operations_rejected: u64,
    pub transfers_failed: u64,
    pub events_emitted: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<RegistryMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_gauge_follows_lifecycle() {
        let metrics = RegistryMetrics::new();

        metrics.agreement_created();
        metrics.agreement_created();
        metrics.deposit_returned();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.agreements_created, 2);
        assert_eq!(snapshot.deposits_returned, 1);
        assert_eq!(snapshot.agreements_active, 1);
    }

    #[test]
    fn test_failures_split_by_origin() {
        let metrics = RegistryMetrics::new();
        metrics.operation_failed(false);
        metrics.operation_failed(false);
        metrics.operation_failed(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations_rejected, 2);
        assert_eq!(snapshot.transfers_failed, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = RegistryMetrics::new();
        metrics.property_registered();

        let output = metrics.to_prometheus();
        assert!(output.contains("rentescrow_properties_registered_total 1"));
        assert!(output.contains("# TYPE rentescrow_agreements_active gauge"));
    }
}
