//! Proxy configuration discovery.
//!
//! The [`Translator`] observes routing graphs, renders them into proxy
//! resources and publishes one [`Snapshot`](cache::Snapshot) per resource type
//! into the [`SnapshotCache`]. The [`DiscoveryServer`] answers clients from the
//! cache; a request for a version the client already holds waits until that
//! type changes.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod envoy;
pub mod metrics;
pub mod render;
pub mod server;
mod translator;


pub use self::{
    cache::SnapshotCache,
    envoy::TypeUrl,
    metrics::XdsMetrics,
    render::ListenerConfig,
    server::{
        BoxWatchStream, Discover, DiscoveryRequest, DiscoveryResponse, DiscoveryServer, Error,
    },
    translator::Translator,
};
