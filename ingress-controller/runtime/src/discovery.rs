use crate::xds::{Discover, DiscoveryRequest, Error as DiscoveryError, TypeUrl};
use anyhow::Result;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{http, server::conn::http1, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, net::SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, trace, warn};

type Body = http_body_util::Full<Bytes>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// REST endpoints are named `/v3/discovery:{listeners,routes,clusters,endpoints}`.
const PATH_PREFIX: &str = "/v3/discovery:";

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    #[error("failed to decode discovery request: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Serves REST-JSON discovery requests until `drain` is signaled.
///
/// Each request is answered by `discover`; a request for the version the
/// client already holds is held open until the type changes, the client
/// disconnects, or the server shuts down.
#[instrument(skip_all, fields(port = %addr.port()))]
pub(crate) async fn serve<D>(addr: SocketAddr, discover: D, drain: drain::Watch) -> Result<()>
where
    D: Discover + Clone + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "discovery server listening");

    let shutdown = drain.clone().signaled();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, client)) => {
                    tokio::spawn(connection(stream, client, discover.clone(), drain.clone()));
                }
                Err(error) => warn!(%error, "failed to accept connection"),
            },
            _ = &mut shutdown => {
                debug!("discovery server no longer accepting connections");
                return Ok(());
            }
        }
    }
}

async fn connection<D>(stream: TcpStream, client: SocketAddr, discover: D, drain: drain::Watch)
where
    D: Discover + Clone + Send + Sync + 'static,
{
    let svc = service_fn(move |req| {
        let discover = discover.clone();
        async move { Ok::<_, Infallible>(handle(&discover, req).await) }
    });

    tokio::pin! {
        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
    }
    let res = tokio::select! {
        res = (&mut conn) => res,
        handle = drain.signaled() => {
            conn.as_mut().graceful_shutdown();
            handle.release_after(conn).await
        }
    };
    if let Err(error) = res {
        debug!(%client, %error, "connection closed");
    }
}

/// Answers a single discovery request.
///
/// Dropping the returned future abandons any pending fetch.
async fn handle<D, B>(discover: &D, req: Request<B>) -> Response<Body>
where
    D: Discover + Sync,
    B: hyper::body::Body + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    trace!(method = %req.method(), path = %req.uri().path());
    let Some(type_url) = req
        .uri()
        .path()
        .strip_prefix(PATH_PREFIX)
        .and_then(TypeUrl::from_short_name)
    else {
        return empty(http::StatusCode::NOT_FOUND);
    };
    if req.method() != http::Method::POST {
        return empty(http::StatusCode::METHOD_NOT_ALLOWED);
    }

    let mut request = match decode(req.into_body()).await {
        Ok(request) => request,
        Err(error) => {
            info!(%error, %type_url, "rejecting discovery request");
            return text(http::StatusCode::BAD_REQUEST, &error);
        }
    };
    if request.type_url.is_empty() {
        request.type_url = type_url.as_str().to_string();
    } else if request.type_url != type_url.as_str() {
        let error = format!(
            "type URL {} does not match the endpoint for {type_url}",
            request.type_url
        );
        info!(%error, "rejecting discovery request");
        return text(http::StatusCode::BAD_REQUEST, &error);
    }

    match discover.fetch(request).await {
        Ok(rsp) => match serde_json::to_vec(&rsp) {
            Ok(body) => {
                let mut rsp = Response::new(Body::from(body));
                rsp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                rsp
            }
            Err(error) => {
                warn!(%error, "failed to encode discovery response");
                text(http::StatusCode::INTERNAL_SERVER_ERROR, &error)
            }
        },
        Err(error @ DiscoveryError::InvalidRequest(_)) => {
            text(http::StatusCode::BAD_REQUEST, &error)
        }
        Err(error @ DiscoveryError::ShuttingDown) => {
            text(http::StatusCode::SERVICE_UNAVAILABLE, &error)
        }
    }
}

async fn decode<B>(body: B) -> Result<DiscoveryRequest, Error>
where
    B: hyper::body::Body + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| Error::Body(e.into()))?
        .to_bytes();
    if bytes.is_empty() {
        return Ok(DiscoveryRequest::default());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn empty(status: http::StatusCode) -> Response<Body> {
    let mut rsp = Response::new(Body::default());
    *rsp.status_mut() = status;
    rsp
}

fn text(status: http::StatusCode, error: &dyn std::fmt::Display) -> Response<Body> {
    let mut rsp = Response::new(Body::from(format!("{error}\n")));
    *rsp.status_mut() = status;
    rsp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain"),
    );
    rsp
}
