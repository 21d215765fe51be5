use super::*;
use crate::envoy::LISTENER_TYPE_URL;
use ingress_controller_core::{Setting, TimeoutPolicy};
use serde_json::json;
use std::time::Duration;

fn simple(h: &mut Harness) {
    h.add(mk_service("default", "backend", &[(Some("http"), 80)]));
    h.add(mk_proxy(
        "default",
        "simple",
        "example.com",
        vec![mk_route("/", &[("backend", 80)])],
    ));
}

/// Returns the listener with its connection manager's filter list removed.
async fn listener(h: &Harness) -> serde_json::Value {
    let mut listeners = h.request_json(TypeUrl::Listener).await;
    assert_eq!(listeners.len(), 1);
    let mut listener = listeners.remove(0);
    let hcm = &mut listener["filter_chains"][0]["filters"][1]["typed_config"];
    let filters = hcm
        .as_object_mut()
        .unwrap()
        .remove("http_filters")
        .expect("connection manager must have filters");
    assert_eq!(filters.as_array().unwrap().len(), 3);
    listener
}

fn expected_listener(timeouts: serde_json::Value) -> serde_json::Value {
    let mut hcm = json!({
        "@type": "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager",
        "stat_prefix": "ingress_http",
        "rds": {
            "route_config_name": "ingress_http",
            "config_source": { "ads": {}, "resource_api_version": "V3" },
        },
    });
    for (k, v) in timeouts.as_object().unwrap() {
        hcm[k] = v.clone();
    }

    let keepalive = |description: &str, level: i64, name: i64, value: i64| {
        json!({
            "description": description,
            "level": level,
            "name": name,
            "int_value": value,
            "state": "STATE_LISTENING",
        })
    };

    json!({
        "@type": LISTENER_TYPE_URL,
        "name": "ingress_http",
        "address": { "socket_address": { "address": "0.0.0.0", "port_value": 8080 } },
        "socket_options": [
            keepalive("Enable TCP keep-alive", 1, 9, 1),
            keepalive("TCP keep-alive initial idle time", 6, 4, 45),
            keepalive("TCP keep-alive time between probes", 6, 5, 5),
            keepalive("TCP keep-alive probe count before closing", 6, 6, 9),
        ],
        "filter_chains": [{
            "filters": [
                {
                    "name": "envoy.access_loggers.file",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.access_loggers.file.v3.FileAccessLog",
                        "path": "/dev/stdout",
                    },
                },
                {
                    "name": "envoy.filters.network.http_connection_manager",
                    "typed_config": hcm,
                },
            ],
        }],
    })
}

#[tokio::test]
async fn timeouts_not_specified() {
    let mut h = Harness::new();
    simple(&mut h);

    assert_eq!(listener(&h).await, expected_listener(json!({})));
}

#[tokio::test]
async fn non_zero_timeouts_specified() {
    let mut h = Harness::with_config(ListenerConfig {
        default_timeouts: TimeoutPolicy {
            connection_idle: Setting::Value(Duration::from_secs(7)),
            stream_idle: Setting::Value(Duration::from_secs(70)),
            max_connection_duration: Setting::Value(Duration::from_secs(700)),
            connection_shutdown_grace_period: Setting::Value(Duration::from_secs(7000)),
        },
        ..Default::default()
    });
    simple(&mut h);

    assert_eq!(
        listener(&h).await,
        expected_listener(json!({
            "common_http_protocol_options": {
                "idle_timeout": "7s",
                "max_connection_duration": "700s",
            },
            "stream_idle_timeout": "70s",
            "drain_timeout": "7000s",
        }))
    );
}

#[tokio::test]
async fn listener_settings_take_precedence_per_field() {
    let mut h = Harness::with_config(ListenerConfig {
        timeouts: TimeoutPolicy {
            stream_idle: Setting::Disabled,
            connection_shutdown_grace_period: Setting::Value(Duration::from_millis(1500)),
            ..Default::default()
        },
        default_timeouts: TimeoutPolicy {
            connection_idle: Setting::Value(Duration::from_secs(7)),
            stream_idle: Setting::Value(Duration::from_secs(70)),
            ..Default::default()
        },
        ..Default::default()
    });
    simple(&mut h);

    assert_eq!(
        listener(&h).await,
        expected_listener(json!({
            "common_http_protocol_options": { "idle_timeout": "7s" },
            "stream_idle_timeout": "0s",
            "drain_timeout": "1.500s",
        }))
    );
}

#[tokio::test]
async fn no_listener_without_virtual_hosts() {
    let h = Harness::new();
    assert!(h.request(TypeUrl::Listener).await.resources.is_empty());
}
