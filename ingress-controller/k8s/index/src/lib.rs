//! Ingress routing index
//!
//! The index holds the current set of configuration objects observed from the
//! cluster and turns them into a routing graph. It watches the following
//! resources:
//!
//! - Each `HTTPProxy` with a `virtualhost` claims an fqdn and declares an
//!   ordered list of routes. Routes reference `Service` ports in the proxy's
//!   namespace.
//! - Each `Service` enumerates the ports that routes may reference.
//! - Each `EndpointSlice` carries the ready addresses of a `Service`, linked
//!   through the `kubernetes.io/service-name` label.
//!
//! ```text
//! [ HTTPProxy ] -> [ Service:port ] <- [ EndpointSlice ]
//! ```
//!
//! Every change to any of these objects rebuilds the whole graph from the full
//! set of objects; the previous graph is discarded. The new graph is handed to
//! an [`Observer`](ingress_controller_core::Observer) before the update
//! returns, so readers downstream of the observer see the change as soon as
//! the index lock is released.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod builder;
pub mod index;
pub mod metrics;
mod route;
mod service;


pub use self::{
    index::{ConfigurationObject, Index, ResourceId, SharedIndex},
    metrics::IndexMetrics,
    route::RouteError,
};
