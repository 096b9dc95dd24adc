//! Metrics for [super::Store].

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for [super::Store].
#[derive(Default)]
pub struct Metrics {
    /// Registered accounts.
    pub accounts: Gauge,
    /// Snapshots recorded for a day without a prior snapshot.
    pub made: Counter,
    /// Snapshots that replaced the value already recorded for a day.
    pub replaced: Counter,
    /// Snapshot lookups.
    pub lookups: Counter,
}

impl Metrics {
    /// Create and register metrics under the `store` prefix.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        let registry = registry.sub_registry_with_prefix("store");
        registry.register("accounts", "Registered accounts", metrics.accounts.clone());
        registry.register(
            "snapshots_made",
            "Snapshots recorded for a new day",
            metrics.made.clone(),
        );
        registry.register(
            "snapshots_replaced",
            "Snapshots that replaced a value recorded the same day",
            metrics.replaced.clone(),
        );
        registry.register("lookups", "Snapshot lookups", metrics.lookups.clone());
        metrics
    }
}
