use super::ListenerConfig;
use crate::envoy::{
    Address, ConfigSource, Filter, FilterChain, FilterConfig, HttpConnectionManager, HttpFilter,
    HttpProtocolOptions, Listener, ProtoDuration, Rds, SocketOption,
};
use serde_json::json;

const SOL_SOCKET: i64 = 1;
const SO_KEEPALIVE: i64 = 9;
const IPPROTO_TCP: i64 = 6;
const TCP_KEEPIDLE: i64 = 4;
const TCP_KEEPINTVL: i64 = 5;
const TCP_KEEPCNT: i64 = 6;

pub(super) fn listener(config: &ListenerConfig) -> Listener {
    Listener {
        name: config.name.clone(),
        address: Address::socket(config.address, config.port),
        socket_options: keepalive_socket_options(),
        filter_chains: vec![FilterChain {
            filters: vec![
                Filter {
                    name: "envoy.access_loggers.file",
                    typed_config: FilterConfig::FileAccessLog {
                        path: config.access_log_path.clone(),
                    },
                },
                Filter {
                    name: "envoy.filters.network.http_connection_manager",
                    typed_config: FilterConfig::HttpConnectionManager(Box::new(
                        http_connection_manager(config),
                    )),
                },
            ],
        }],
    }
}

fn http_connection_manager(config: &ListenerConfig) -> HttpConnectionManager {
    let timeouts = config.timeouts.resolve(&config.default_timeouts);

    let common = HttpProtocolOptions {
        idle_timeout: timeouts.connection_idle.map(ProtoDuration),
        max_connection_duration: timeouts.max_connection_duration.map(ProtoDuration),
    };

    HttpConnectionManager {
        stat_prefix: config.name.clone(),
        rds: Rds {
            route_config_name: config.name.clone(),
            config_source: ConfigSource::ads(),
        },
        http_filters: default_http_filters(),
        common_http_protocol_options: (common != HttpProtocolOptions::default()).then_some(common),
        stream_idle_timeout: timeouts.stream_idle.map(ProtoDuration),
        drain_timeout: timeouts.connection_shutdown_grace_period.map(ProtoDuration),
    }
}

fn default_http_filters() -> Vec<HttpFilter> {
    vec![
        HttpFilter {
            name: "envoy.filters.http.compressor",
            typed_config: json!({
                "@type": "type.googleapis.com/envoy.extensions.filters.http.compressor.v3.Compressor",
                "compressor_library": {
                    "name": "gzip",
                    "typed_config": {
                        "@type": "type.googleapis.com/envoy.extensions.compression.gzip.compressor.v3.Gzip",
                    },
                },
            }),
        },
        HttpFilter {
            name: "envoy.filters.http.grpc_web",
            typed_config: json!({
                "@type": "type.googleapis.com/envoy.extensions.filters.http.grpc_web.v3.GrpcWeb",
            }),
        },
        HttpFilter {
            name: "envoy.filters.http.router",
            typed_config: json!({
                "@type": "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router",
            }),
        },
    ]
}

fn keepalive_socket_options() -> Vec<SocketOption> {
    let opt = |description, level, name, int_value| SocketOption {
        description,
        level,
        name,
        int_value,
        state: "STATE_LISTENING",
    };
    vec![
        opt("Enable TCP keep-alive", SOL_SOCKET, SO_KEEPALIVE, 1),
        opt(
            "TCP keep-alive initial idle time",
            IPPROTO_TCP,
            TCP_KEEPIDLE,
            45,
        ),
        opt("TCP keep-alive time between probes", IPPROTO_TCP, TCP_KEEPINTVL, 5),
        opt(
            "TCP keep-alive probe count before closing",
            IPPROTO_TCP,
            TCP_KEEPCNT,
            9,
        ),
    ]
}
