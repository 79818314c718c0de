//! Logging and metrics init shared by every composition root
//! (orchestrator, agent, probe, ctl). Each binary calls `init_tracing`
//! exactly once, at the top of `main`, before touching configuration or
//! storage.

use std::panic;

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Process-wide metrics registry. Components register their own counters
/// and histograms into this registry from their constructors; `render`
/// serves it at `GET /metrics`.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Initializes `tracing` with an env filter defaulting to `info` for this
/// service and `warn` for noisy dependencies, and a panic hook that routes
/// panics through `tracing::error!` instead of stderr so a panicking
/// background task still produces a structured log line.
pub fn init_tracing(service_name: &str) {
    let default_directive = if cfg!(debug_assertions) {
        format!("{service_name}=debug,tower_http=info,libsql=warn")
    } else {
        format!("{service_name}=info,tower_http=warn,libsql=error")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if cfg!(debug_assertions) {
        let layer = fmt::layer().compact().with_target(false);
        tracing_subscriber::registry().with(filter).with(layer).init();
    } else {
        let layer = fmt::layer().json().flatten_event(true);
        tracing_subscriber::registry().with(filter).with(layer).init();
    }

    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        tracing::error!(target: "panic_monitor", location = %location, payload = %payload, "panic");
    }));
}

/// Renders the shared registry in Prometheus text exposition format.
pub fn render_metrics() -> String {
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buf)
        .expect("prometheus text encoding is infallible for well-formed metrics");
    String::from_utf8(buf).expect("prometheus text encoder emits valid utf-8")
}
