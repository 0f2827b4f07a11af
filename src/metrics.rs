//! Prometheus metrics for vault ingestion.
//!
//! Exposes:
//! - `obsidian_autolink_batch_duration_seconds` (histogram)
//! - `obsidian_autolink_batches_total` (counter with status)
//! - `obsidian_autolink_batches_inflight` (gauge)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounterVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static BATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 0.5s up to ~70 minutes; batches wait on LLM calls.
    let buckets =
        prometheus::exponential_buckets(0.5, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram!(
        "obsidian_autolink_batch_duration_seconds",
        "Graph builder duration per batch in seconds",
        buckets
    )
    .expect("failed to register batch duration histogram")
});

static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "obsidian_autolink_batches_total",
        "Total batches processed by status",
        &["status"]
    )
    .expect("failed to register batch counter")
});

static BATCHES_INFLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "obsidian_autolink_batches_inflight",
        "Number of batches currently being built"
    )
    .expect("failed to register inflight gauge")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&BATCH_DURATION);
    Lazy::force(&BATCHES_TOTAL);
    Lazy::force(&BATCHES_INFLIGHT);
}

/// Tracks one in-flight batch. The inflight gauge is decremented on drop,
/// so a batch future that is cancelled still leaves the gauge balanced.
pub struct BatchGuard {
    inflight: IntGauge,
    started: Instant,
    finished: bool,
}

impl BatchGuard {
    fn track(inflight: IntGauge) -> Self {
        inflight.inc();
        Self {
            inflight,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Record batch completion with duration and status.
    pub fn finish(mut self, success: bool) {
        self.finished = true;
        BATCH_DURATION.observe(self.started.elapsed().as_secs_f64());
        BATCHES_TOTAL
            .with_label_values(&[if success { "ok" } else { "error" }])
            .inc();
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.inflight.dec();
        if !self.finished {
            BATCHES_TOTAL.with_label_values(&["cancelled"]).inc();
        }
    }
}

/// Mark a batch as in flight until the returned guard is finished or dropped.
pub fn start_batch() -> BatchGuard {
    init_collectors();
    BatchGuard::track(BATCHES_INFLIGHT.clone())
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    let response = match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => Response::builder()
            .status(StatusCode::OK)
            .header(hyper::header::CONTENT_TYPE, encoder.format_type())
            .body(Full::from(buffer)),
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::from("encode error"))
        }
    };

    Ok(response.unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))))
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
