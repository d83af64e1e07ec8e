//! Prometheus counters for cascade traffic.
//!
//! Every chain owns its own registry so several chains (and tests) never
//! collide on metric names.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Outcome of consulting one tier during a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Skip,
}

impl LookupOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Skip => "skip",
        }
    }
}

/// Why a tier was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReason {
    Set,
    Backfill,
}

impl WriteReason {
    fn as_str(&self) -> &'static str {
        match self {
            WriteReason::Set => "set",
            WriteReason::Backfill => "backfill",
        }
    }
}

pub struct CascadeMetrics {
    registry: Registry,
    lookups: IntCounterVec,
    writes: IntCounterVec,
    deletes: IntCounterVec,
}

impl CascadeMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let lookups = IntCounterVec::new(
            Opts::new("cascade_lookups_total", "Tier lookups by outcome"),
            &["tier", "outcome"],
        )?;
        let writes = IntCounterVec::new(
            Opts::new("cascade_writes_total", "Tier writes by reason"),
            &["tier", "reason"],
        )?;
        let deletes = IntCounterVec::new(
            Opts::new("cascade_deletes_total", "Tier deletes"),
            &["tier"],
        )?;

        registry.register(Box::new(lookups.clone()))?;
        registry.register(Box::new(writes.clone()))?;
        registry.register(Box::new(deletes.clone()))?;

        Ok(Self {
            registry,
            lookups,
            writes,
            deletes,
        })
    }

    pub fn record_lookup(&self, tier: &str, outcome: LookupOutcome) {
        self.lookups
            .with_label_values(&[tier, outcome.as_str()])
            .inc();
    }

    pub fn record_write(&self, tier: &str, reason: WriteReason) {
        self.writes.with_label_values(&[tier, reason.as_str()]).inc();
    }

    pub fn record_delete(&self, tier: &str) {
        self.deletes.with_label_values(&[tier]).inc();
    }

    pub fn lookups(&self, tier: &str, outcome: LookupOutcome) -> u64 {
        self.lookups
            .with_label_values(&[tier, outcome.as_str()])
            .get()
    }

    pub fn writes(&self, tier: &str, reason: WriteReason) -> u64 {
        self.writes.with_label_values(&[tier, reason.as_str()]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for CascadeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeMetrics").finish_non_exhaustive()
    }
}
