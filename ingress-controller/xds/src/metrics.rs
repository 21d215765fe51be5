use crate::envoy::TypeUrl;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct XdsMetrics {
    versions: Family<TypeLabels, Gauge>,
    updates: Family<TypeLabels, Counter>,
    requests: Family<RequestLabels, Counter>,
    pending: Family<TypeLabels, Gauge>,
}

/// Decrements the pending gauge when a held request completes or is dropped.
pub(crate) struct PendingGuard(Gauge);

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct TypeLabels {
    type_url: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct RequestLabels {
    type_url: &'static str,
    outcome: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ok,
    Invalid,
    UnknownType,
    ShuttingDown,
}

// === impl XdsMetrics ===

impl XdsMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "snapshot_version",
            "The current snapshot version of each resource type",
            metrics.versions.clone(),
        );
        reg.register(
            "snapshot_updates",
            "Total number of snapshot updates for each resource type",
            metrics.updates.clone(),
        );
        reg.register(
            "requests",
            "Total number of discovery requests answered",
            metrics.requests.clone(),
        );
        reg.register(
            "pending_requests",
            "The number of discovery requests waiting for a new version",
            metrics.pending.clone(),
        );
        metrics
    }

    pub(crate) fn record_update(&self, type_url: TypeUrl, version: u64) {
        let labels = TypeLabels::new(type_url);
        self.updates.get_or_create(&labels).inc();
        self.versions.get_or_create(&labels).set(version as i64);
    }

    pub(crate) fn record_request(&self, type_url: Option<TypeUrl>, outcome: Outcome) {
        let outcome = match outcome {
            Outcome::Ok => "ok",
            Outcome::Invalid => "invalid",
            Outcome::UnknownType => "unknown_type",
            Outcome::ShuttingDown => "shutting_down",
        };
        let labels = RequestLabels {
            type_url: type_url.map(|t| t.short_name()).unwrap_or("unknown"),
            outcome,
        };
        self.requests.get_or_create(&labels).inc();
    }

    pub(crate) fn pending(&self, type_url: TypeUrl) -> PendingGuard {
        let gauge = self
            .pending
            .get_or_create(&TypeLabels::new(type_url))
            .clone();
        gauge.inc();
        PendingGuard(gauge)
    }

    pub fn pending_requests(&self, type_url: TypeUrl) -> i64 {
        self.pending.get_or_create(&TypeLabels::new(type_url)).get()
    }
}

impl TypeLabels {
    fn new(type_url: TypeUrl) -> Self {
        Self {
            type_url: type_url.short_name(),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}
