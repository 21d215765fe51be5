use super::*;
use crate::{envoy::CLUSTER_TYPE_URL, Error};
use futures::StreamExt;

const SECRET_TYPE_URL: &str = "type.googleapis.com/envoy.config.core.v3.Secret";

fn populated() -> Harness {
    let mut h = Harness::new();
    h.add(mk_service("ns", "app", &[(None, 80)]));
    h.add(mk_service("ns", "api", &[(None, 80)]));
    h.add(mk_proxy(
        "ns",
        "web",
        "www.example.com",
        vec![mk_route("/", &[("app", 80)]), mk_route("/api", &[("api", 80)])],
    ));
    h
}

fn versions(h: &Harness) -> Vec<String> {
    TypeUrl::ALL.into_iter().map(|t| h.version(t)).collect()
}

fn req(type_url: &str, version: &str) -> DiscoveryRequest {
    DiscoveryRequest {
        type_url: type_url.to_string(),
        version_info: version.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn rebuilding_unchanged_input_keeps_versions() {
    let mut h = populated();
    let before = versions(&h);
    assert!(before.iter().all(|v| v != "0"), "{before:?}");

    h.add(mk_service("ns", "app", &[(None, 80)]));
    h.add(mk_proxy(
        "ns",
        "web",
        "www.example.com",
        vec![mk_route("/", &[("app", 80)]), mk_route("/api", &[("api", 80)])],
    ));
    assert_eq!(versions(&h), before);
}

#[tokio::test]
async fn versions_advance_per_type() {
    let mut h = populated();
    let listener = h.version(TypeUrl::Listener);
    let routes = h.version(TypeUrl::RouteConfiguration);
    let clusters = h.version(TypeUrl::Cluster);
    let endpoints = h.version(TypeUrl::ClusterLoadAssignment);

    // Endpoints only change assignments.
    h.add(mk_slice("ns", "app-1", "app", 8080, &["10.0.0.1"]));
    assert_eq!(h.version(TypeUrl::Listener), listener);
    assert_eq!(h.version(TypeUrl::RouteConfiguration), routes);
    assert_eq!(h.version(TypeUrl::Cluster), clusters);
    let next = h.version(TypeUrl::ClusterLoadAssignment);
    assert!(next.parse::<u64>().unwrap() > endpoints.parse::<u64>().unwrap());

    let clas = h.request_json(TypeUrl::ClusterLoadAssignment).await;
    let app = clas
        .iter()
        .find(|cla| cla["cluster_name"] == "ns/app")
        .unwrap();
    assert_eq!(
        app["endpoints"][0]["lb_endpoints"][0]["endpoint"]["address"]["socket_address"]
            ["port_value"],
        8080
    );
}

#[tokio::test]
async fn held_request_wakes_on_change() {
    let mut h = populated();
    let current = h.version(TypeUrl::ClusterLoadAssignment);

    let endpoints = tokio::spawn({
        let server = h.server.clone();
        let req = req(TypeUrl::ClusterLoadAssignment.as_str(), &current);
        async move { server.fetch(req).await }
    });
    let listeners = tokio::spawn({
        let server = h.server.clone();
        let req = req(TypeUrl::Listener.as_str(), &h.version(TypeUrl::Listener));
        async move { server.fetch(req).await }
    });
    tokio::task::yield_now().await;
    assert!(!endpoints.is_finished());
    assert_eq!(
        h.metrics.pending_requests(TypeUrl::ClusterLoadAssignment),
        1
    );
    assert_eq!(h.metrics.pending_requests(TypeUrl::Listener), 1);

    h.add(mk_slice("ns", "app-1", "app", 8080, &["10.0.0.1"]));
    let rsp = time::timeout(TIMEOUT, endpoints)
        .await
        .expect("request must complete")
        .expect("task must not fail")
        .expect("request must succeed");
    assert_ne!(rsp.version_info, current);
    assert_eq!(rsp.version_info, h.version(TypeUrl::ClusterLoadAssignment));

    // The listener did not change, so its request is still held.
    tokio::task::yield_now().await;
    assert!(!listeners.is_finished());
    listeners.abort();
}

#[tokio::test]
async fn abandoned_requests_are_released() {
    let h = populated();
    let current = h.version(TypeUrl::Cluster);

    let held = time::timeout(
        time::Duration::from_millis(10),
        h.server.fetch(req(CLUSTER_TYPE_URL, &current)),
    )
    .await;
    assert!(held.is_err(), "request must be held");
    assert_eq!(h.metrics.pending_requests(TypeUrl::Cluster), 0);
}

#[tokio::test]
async fn filters_by_resource_name() {
    let h = populated();
    let mut names = vec![];
    for cluster in h.request(TypeUrl::Cluster).await.resources {
        names.push(cluster.name().to_string());
    }
    assert_eq!(names.len(), 2);

    let rsp = h
        .server
        .fetch(DiscoveryRequest {
            type_url: CLUSTER_TYPE_URL.to_string(),
            resource_names: vec![names[1].clone(), "ns/missing/80/da39a3ee5e".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rsp.type_url, CLUSTER_TYPE_URL);
    assert_eq!(rsp.version_info, h.version(TypeUrl::Cluster));
    assert_eq!(
        rsp.resources.iter().map(|r| r.name()).collect::<Vec<_>>(),
        vec![names[1].as_str()]
    );
}

#[tokio::test]
async fn unknown_types_are_empty() {
    let h = populated();

    let rsp = h.server.fetch(req(SECRET_TYPE_URL, "")).await.unwrap();
    assert_eq!(
        rsp,
        DiscoveryResponse {
            version_info: "0".to_string(),
            resources: vec![],
            type_url: SECRET_TYPE_URL.to_string(),
        }
    );

    // A client that already holds the empty version waits.
    let held = time::timeout(
        time::Duration::from_millis(10),
        h.server.fetch(req(SECRET_TYPE_URL, "0")),
    )
    .await;
    assert!(held.is_err());
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let h = populated();
    let current = h.version(TypeUrl::Cluster);
    let held = tokio::spawn({
        let server = h.server.clone();
        async move { server.fetch(req(CLUSTER_TYPE_URL, &current)).await }
    });
    tokio::task::yield_now().await;

    assert!(matches!(
        h.server.fetch(req("", "")).await,
        Err(Error::InvalidRequest(_))
    ));
    assert!(matches!(
        h.server
            .fetch(DiscoveryRequest {
                type_url: CLUSTER_TYPE_URL.to_string(),
                resource_names: vec![String::new()],
                ..Default::default()
            })
            .await,
        Err(Error::InvalidRequest(_))
    ));
    assert!(h.server.watch(req("", "")).is_err());

    // Other requests are unaffected.
    tokio::task::yield_now().await;
    assert!(!held.is_finished());
    assert_eq!(h.metrics.pending_requests(TypeUrl::Cluster), 1);
    held.abort();
}

#[tokio::test]
async fn dropped_route_leaves_the_rest() {
    let mut with_missing = Harness::new();
    with_missing.add(mk_service("ns", "app", &[(None, 80)]));
    with_missing.add(mk_proxy(
        "ns",
        "web",
        "www.example.com",
        vec![mk_route("/missing", &[("missing", 80)]), mk_route("/", &[("app", 80)])],
    ));

    let mut valid = Harness::new();
    valid.add(mk_service("ns", "app", &[(None, 80)]));
    valid.add(mk_proxy(
        "ns",
        "web",
        "www.example.com",
        vec![mk_route("/", &[("app", 80)])],
    ));

    for t in TypeUrl::ALL {
        assert_eq!(with_missing.request_json(t).await, valid.request_json(t).await);
    }
}

#[tokio::test]
async fn watch_streams_versions_until_drained() {
    let mut h = populated();
    let mut updates = h
        .server
        .watch(req(TypeUrl::ClusterLoadAssignment.as_str(), ""))
        .unwrap();

    let first = time::timeout(TIMEOUT, updates.next())
        .await
        .unwrap()
        .expect("stream must yield the current version");
    assert_eq!(first.version_info, h.version(TypeUrl::ClusterLoadAssignment));

    h.add(mk_slice("ns", "app-1", "app", 8080, &["10.0.0.1"]));
    let second = time::timeout(TIMEOUT, updates.next())
        .await
        .unwrap()
        .expect("stream must yield the next version");
    assert_eq!(second.version_info, h.version(TypeUrl::ClusterLoadAssignment));
    assert_ne!(second.version_info, first.version_info);

    let signal = h.drain.take().unwrap();
    tokio::spawn(signal.drain());
    assert!(time::timeout(TIMEOUT, updates.next())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn held_requests_end_on_shutdown() {
    let mut h = populated();
    let current = h.version(TypeUrl::Cluster);
    let held = tokio::spawn({
        let server = h.server.clone();
        async move { server.fetch(req(CLUSTER_TYPE_URL, &current)).await }
    });
    tokio::task::yield_now().await;

    let signal = h.drain.take().unwrap();
    tokio::spawn(signal.drain());
    let res = time::timeout(TIMEOUT, held).await.unwrap().unwrap();
    assert_eq!(res, Err(Error::ShuttingDown));
}
