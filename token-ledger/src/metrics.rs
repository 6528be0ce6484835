//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `token_ledger_operations_total{operation}` - Committed operations
//! - `token_ledger_rejections_total{kind}` - Rejected calls by error kind
//! - `token_ledger_total_supply` - Current total supply (raw units)
//! - `token_ledger_mint_records` - Audit records created
//! - `token_ledger_paused` - 1 while paused

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each instance owns its registry, so several ledgers can live in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Committed operations by name
    pub operations_total: IntCounterVec,

    /// Rejections by error kind
    pub rejections_total: IntCounterVec,

    /// Total supply
    pub total_supply: IntGauge,

    /// Audit log length
    pub mint_records: IntGauge,

    /// Pause flag
    pub paused: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("token_ledger_operations_total", "Committed operations"),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("token_ledger_rejections_total", "Rejected calls by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let total_supply = IntGauge::new("token_ledger_total_supply", "Total supply in raw units")?;
        registry.register(Box::new(total_supply.clone()))?;

        let mint_records = IntGauge::new("token_ledger_mint_records", "Audit records created")?;
        registry.register(Box::new(mint_records.clone()))?;

        let paused = IntGauge::new("token_ledger_paused", "1 while the ledger is paused")?;
        registry.register(Box::new(paused.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            total_supply,
            mint_records,
            paused,
            registry,
        })
    }

    /// Record a committed operation
    pub fn record_operation(&self, operation: &str) {
        self.operations_total.with_label_values(&[operation]).inc();
    }

    /// Record a rejected call
    pub fn record_rejection(&self, kind: &str) {
        self.rejections_total.with_label_values(&[kind]).inc();
    }

    /// Refresh state gauges
    pub fn update_state(&self, total_supply: u64, mint_records: u64, paused: bool) {
        self.total_supply.set(i64::try_from(total_supply).unwrap_or(i64::MAX));
        self.mint_records.set(i64::try_from(mint_records).unwrap_or(i64::MAX));
        self.paused.set(i64::from(paused));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
