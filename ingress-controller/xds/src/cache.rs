use crate::{
    envoy::{Resource, TypeUrl},
    metrics::XdsMetrics,
};
use std::sync::Arc;
use tokio::sync::watch;

/// The published resources of a single type.
///
/// Snapshots are immutable. Readers hold an `Arc<Snapshot>` for as long as
/// they need it; an update replaces the published snapshot without affecting
/// readers of the previous one.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    version: u64,
    resources: Vec<Resource>,
    encoded: Vec<u8>,
}

/// Holds the latest snapshot of each resource type.
///
/// There is a single writer (the translator) and any number of readers. Each
/// type is published through its own watch channel so that an update to one
/// type only wakes readers of that type.
#[derive(Debug)]
pub struct SnapshotCache {
    listeners: watch::Sender<Arc<Snapshot>>,
    routes: watch::Sender<Arc<Snapshot>>,
    clusters: watch::Sender<Arc<Snapshot>>,
    endpoints: watch::Sender<Arc<Snapshot>>,
    metrics: XdsMetrics,
}

// === impl Snapshot ===

impl Snapshot {
    fn empty() -> Self {
        Self {
            version: 0,
            resources: vec![],
            encoded: b"[]".to_vec(),
        }
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version as sent to clients.
    pub fn version_info(&self) -> String {
        self.version.to_string()
    }

    #[inline]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}

// === impl SnapshotCache ===

impl SnapshotCache {
    pub fn new(metrics: XdsMetrics) -> Self {
        let snapshot = || watch::channel(Arc::new(Snapshot::empty())).0;
        Self {
            listeners: snapshot(),
            routes: snapshot(),
            clusters: snapshot(),
            endpoints: snapshot(),
            metrics,
        }
    }

    /// Publishes `resources` as the new content for `type_url`.
    ///
    /// The version only advances when the serialized content differs from the
    /// published snapshot. Returns whether a new snapshot was published.
    pub fn update(
        &self,
        type_url: TypeUrl,
        resources: Vec<Resource>,
    ) -> Result<bool, serde_json::Error> {
        let encoded = serde_json::to_vec(&resources)?;

        let mut version = None;
        let updated = self.sender(type_url).send_if_modified(|snapshot| {
            if snapshot.encoded == encoded {
                return false;
            }
            let next = snapshot.version + 1;
            *snapshot = Arc::new(Snapshot {
                version: next,
                resources,
                encoded,
            });
            version = Some(next);
            true
        });

        if let Some(version) = version {
            tracing::debug!(%type_url, version, "published snapshot");
            self.metrics.record_update(type_url, version);
        }
        Ok(updated)
    }

    pub fn snapshot(&self, type_url: TypeUrl) -> Arc<Snapshot> {
        self.sender(type_url).borrow().clone()
    }

    pub fn subscribe(&self, type_url: TypeUrl) -> watch::Receiver<Arc<Snapshot>> {
        self.sender(type_url).subscribe()
    }

    fn sender(&self, type_url: TypeUrl) -> &watch::Sender<Arc<Snapshot>> {
        match type_url {
            TypeUrl::Listener => &self.listeners,
            TypeUrl::RouteConfiguration => &self.routes,
            TypeUrl::Cluster => &self.clusters,
            TypeUrl::ClusterLoadAssignment => &self.endpoints,
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(XdsMetrics::default())
    }
}
