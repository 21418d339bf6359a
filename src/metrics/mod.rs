use std::net::SocketAddr;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::MonitoringConfig;


lazy_static! {
    pub static ref WATCH_REARM_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_rearm_total", "Watch registrations issued for the sharding node"),
        &["job"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_REARM_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_rearm_failures", "Watch registrations rejected by the coordination service"),
        &["job", "kind"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_ENQUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("resharding_notifications_enqueued", "Pending notifications handed to the worker"),
        &["job"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("resharding_notifications_dropped", "Notifications dropped without a callback"),
        &["job", "reason"]
    )
    .expect("metric can not be created");

    pub static ref RESHARDING_CALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("resharding_callbacks", "Resharding callbacks by outcome"),
        &["job", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref RESHARDING_CALLBACK_DURATION_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "resharding_callback_duration_ms",
            "Histogram of resharding callback duration in ms"
        )
        .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets")),
        &["job"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(WATCH_REARM_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_REARM_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(NOTIFICATIONS_ENQUEUED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(NOTIFICATIONS_DROPPED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(RESHARDING_CALLBACKS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(RESHARDING_CALLBACK_DURATION_MS.clone()))
        .expect("collector can be registered");
}

/// Registers the crate collectors into the global [`REGISTRY`]. Safe to call repeatedly.
pub fn init_metrics() {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Serves `/metrics` until `shutdown_signal` fires.
pub async fn start_server(
    addr: SocketAddr,
    mut shutdown_signal: watch::Receiver<()>,
) {
    init_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

/// Runs [`start_server`] on the configured address when Prometheus export
/// is enabled, returns immediately otherwise.
pub async fn serve(
    config: &MonitoringConfig,
    shutdown_signal: watch::Receiver<()>,
) {
    if !config.prometheus_enabled {
        debug!("Prometheus export disabled");
        return;
    }
    let addr = config.socket_addr();
    info!(%addr, "Serving metrics");
    start_server(addr, shutdown_signal).await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics_text(&REGISTRY))
}

/// Text exposition of `registry`.
pub fn gather_metrics_text(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

// Record helpers keep label order in one place.

pub(crate) fn record_rearm(job: &str) {
    WATCH_REARM_TOTAL.with_label_values(&[job]).inc();
}

pub(crate) fn record_rearm_failure(
    job: &str,
    kind: &str,
) {
    WATCH_REARM_FAILURES.with_label_values(&[job, kind]).inc();
}

pub(crate) fn record_enqueued(job: &str) {
    NOTIFICATIONS_ENQUEUED.with_label_values(&[job]).inc();
}

pub(crate) fn record_dropped(
    job: &str,
    reason: &str,
    count: u64,
) {
    NOTIFICATIONS_DROPPED.with_label_values(&[job, reason]).inc_by(count);
}

pub(crate) fn record_callback(
    job: &str,
    outcome: &str,
    duration_ms: f64,
) {
    RESHARDING_CALLBACKS.with_label_values(&[job, outcome]).inc();
    RESHARDING_CALLBACK_DURATION_MS.with_label_values(&[job]).observe(duration_ms);
}
