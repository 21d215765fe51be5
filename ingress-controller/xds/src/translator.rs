use crate::{
    cache::SnapshotCache,
    render::{self, ListenerConfig},
};
use ingress_controller_core::{Dag, Observer};
use std::sync::Arc;

/// Renders each new routing graph and publishes the result.
#[derive(Debug)]
pub struct Translator {
    config: ListenerConfig,
    cache: Arc<SnapshotCache>,
}

impl Translator {
    pub fn new(config: ListenerConfig, cache: Arc<SnapshotCache>) -> Self {
        Self { config, cache }
    }
}

impl Observer for Translator {
    fn on_change(&self, dag: &Dag) {
        let resources = render::render(dag, &self.config);
        for (type_url, resources) in resources.into_typed() {
            let count = resources.len();
            match self.cache.update(type_url, resources) {
                Ok(true) => tracing::debug!(%type_url, resources = count, "resources changed"),
                Ok(false) => tracing::trace!(%type_url, "resources unchanged"),
                Err(error) => tracing::error!(%error, %type_url, "failed to encode resources"),
            }
        }
    }
}
