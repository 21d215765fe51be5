use crate::{
    cache::{Snapshot, SnapshotCache},
    envoy::{Resource, TypeUrl},
    metrics::{Outcome, XdsMetrics},
};
use futures::prelude::*;
use serde::{Deserialize, Serialize};
use std::{pin::Pin, sync::Arc};
use tokio::sync::watch;

/// The version clients hold before their first response, and the version of a
/// type that has never been published.
pub const EMPTY_VERSION: &str = "0";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    /// The version of the last response the client applied.
    #[serde(default, alias = "version_info")]
    pub version_info: String,

    /// Restricts the response to the named resources. Empty means all.
    #[serde(default, alias = "resource_names")]
    pub resource_names: Vec<String>,

    #[serde(default, alias = "type_url", alias = "typeURL")]
    pub type_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub cluster: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub version_info: String,
    pub resources: Vec<Resource>,
    pub type_url: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid discovery request: {0}")]
    InvalidRequest(&'static str),

    #[error("discovery server is shutting down")]
    ShuttingDown,
}

pub type BoxWatchStream = Pin<Box<dyn Stream<Item = DiscoveryResponse> + Send>>;

/// Answers discovery requests.
#[async_trait::async_trait]
pub trait Discover {
    /// Responds as soon as the requested type's version differs from the
    /// client's. Dropping the returned future abandons the request.
    async fn fetch(&self, req: DiscoveryRequest) -> Result<DiscoveryResponse, Error>;

    /// Streams a response for each new version of the requested type.
    fn watch(&self, req: DiscoveryRequest) -> Result<BoxWatchStream, Error>;
}

/// Serves snapshots from a [`SnapshotCache`].
#[derive(Clone, Debug)]
pub struct DiscoveryServer {
    cache: Arc<SnapshotCache>,
    drain: drain::Watch,
    metrics: XdsMetrics,
}

// === impl DiscoveryServer ===

impl DiscoveryServer {
    pub fn new(cache: Arc<SnapshotCache>, drain: drain::Watch, metrics: XdsMetrics) -> Self {
        Self {
            cache,
            drain,
            metrics,
        }
    }

    fn validate(&self, req: &DiscoveryRequest) -> Result<Option<TypeUrl>, Error> {
        let res = if req.type_url.is_empty() {
            Err(Error::InvalidRequest("a type URL is required"))
        } else if req.resource_names.iter().any(String::is_empty) {
            Err(Error::InvalidRequest("resource names must not be empty"))
        } else {
            Ok(req.type_url.parse::<TypeUrl>().ok())
        };
        if let Err(error) = &res {
            tracing::info!(%error, type_url = %req.type_url, "rejecting discovery request");
            self.metrics.record_request(None, Outcome::Invalid);
        }
        res
    }
}

#[async_trait::async_trait]
impl Discover for DiscoveryServer {
    async fn fetch(&self, req: DiscoveryRequest) -> Result<DiscoveryResponse, Error> {
        let shutdown = self.drain.clone().signaled();
        tokio::pin!(shutdown);

        let Some(type_url) = self.validate(&req)? else {
            // Unknown types have a permanently empty snapshot.
            if req.version_info == EMPTY_VERSION {
                drop((&mut shutdown).await);
                self.metrics.record_request(None, Outcome::ShuttingDown);
                return Err(Error::ShuttingDown);
            }
            self.metrics.record_request(None, Outcome::UnknownType);
            return Ok(DiscoveryResponse::empty(req.type_url));
        };

        let mut rx = self.cache.subscribe(type_url);
        let mut pending = None;
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.version_info() != req.version_info {
                self.metrics.record_request(Some(type_url), Outcome::Ok);
                return Ok(DiscoveryResponse::from_snapshot(
                    type_url,
                    &snapshot,
                    &req.resource_names,
                ));
            }

            if pending.is_none() {
                tracing::trace!(
                    %type_url,
                    version = %req.version_info,
                    "waiting for a new version"
                );
                pending = Some(self.metrics.pending(type_url));
            }
            tokio::select! {
                res = rx.changed() => {
                    if res.is_err() {
                        self.metrics.record_request(Some(type_url), Outcome::ShuttingDown);
                        return Err(Error::ShuttingDown);
                    }
                }
                _ = &mut shutdown => {
                    self.metrics.record_request(Some(type_url), Outcome::ShuttingDown);
                    return Err(Error::ShuttingDown);
                }
            }
        }
    }

    fn watch(&self, req: DiscoveryRequest) -> Result<BoxWatchStream, Error> {
        let drain = self.drain.clone();
        match self.validate(&req)? {
            Some(type_url) => {
                self.metrics.record_request(Some(type_url), Outcome::Ok);
                Ok(response_stream(
                    drain,
                    self.cache.subscribe(type_url),
                    type_url,
                    req,
                ))
            }
            None => {
                self.metrics.record_request(None, Outcome::UnknownType);
                Ok(unknown_stream(drain, req))
            }
        }
    }
}

fn response_stream(
    drain: drain::Watch,
    rx: watch::Receiver<Arc<Snapshot>>,
    type_url: TypeUrl,
    req: DiscoveryRequest,
) -> BoxWatchStream {
    Box::pin(async_stream::stream! {
        tokio::pin! {
            let shutdown = drain.signaled();
        }

        let mut updates = tokio_stream::wrappers::WatchStream::new(rx);
        let mut version = req.version_info;
        loop {
            tokio::select! {
                res = updates.next() => match res {
                    Some(snapshot) => {
                        if snapshot.version_info() != version {
                            version = snapshot.version_info();
                            yield DiscoveryResponse::from_snapshot(
                                type_url,
                                &snapshot,
                                &req.resource_names,
                            );
                        }
                    }
                    None => return,
                },

                // Close the stream so that it doesn't hold the server open.
                _ = &mut shutdown => {
                    return;
                }
            }
        }
    })
}

fn unknown_stream(drain: drain::Watch, req: DiscoveryRequest) -> BoxWatchStream {
    Box::pin(async_stream::stream! {
        if req.version_info != EMPTY_VERSION {
            yield DiscoveryResponse::empty(req.type_url);
        }
        drop(drain.signaled().await);
    })
}

// === impl DiscoveryResponse ===

impl DiscoveryResponse {
    fn from_snapshot(type_url: TypeUrl, snapshot: &Snapshot, names: &[String]) -> Self {
        let resources = snapshot
            .resources()
            .iter()
            .filter(|r| names.is_empty() || names.iter().any(|n| n == r.name()))
            .cloned()
            .collect();
        Self {
            version_info: snapshot.version_info(),
            resources,
            type_url: type_url.as_str().to_string(),
        }
    }

    fn empty(type_url: String) -> Self {
        Self {
            version_info: EMPTY_VERSION.to_string(),
            resources: vec![],
            type_url,
        }
    }
}
