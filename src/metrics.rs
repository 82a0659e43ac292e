//! Prometheus metrics for the scraper.
//!
//! Exposes:
//! - `channel_scraper_channels_total` (counter by status)
//! - `channel_scraper_records_total` (counter by channel)
//! - `channel_scraper_photos_total` (counter by channel)
//! - `channel_scraper_channel_duration_seconds` (histogram by channel)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

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
    default_registry, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::scraper::ChannelOutcome;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static CHANNEL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 250ms up to ~17 minutes.
    let buckets =
        prometheus::exponential_buckets(0.25, 2.0, 13).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "channel_scraper_channel_duration_seconds",
        "Time spent scraping one channel",
        &["channel"],
        buckets
    )
    .expect("failed to register channel duration histogram")
});

static CHANNELS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_scraper_channels_total",
        "Channels processed by outcome",
        &["status"]
    )
    .expect("failed to register channel counter")
});

static RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_scraper_records_total",
        "Message records written",
        &["channel"]
    )
    .expect("failed to register records counter")
});

static PHOTOS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "channel_scraper_photos_total",
        "Photos downloaded",
        &["channel"]
    )
    .expect("failed to register photos counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&CHANNEL_DURATION);
    Lazy::force(&CHANNELS_TOTAL);
    Lazy::force(&RECORDS_TOTAL);
    Lazy::force(&PHOTOS_TOTAL);
}

/// Record one finished channel.
pub fn record_channel(channel: &str, outcome: &ChannelOutcome, duration: Duration) {
    init_collectors();
    CHANNELS_TOTAL.with_label_values(&[outcome.status()]).inc();
    CHANNEL_DURATION
        .with_label_values(&[channel])
        .observe(duration.as_secs_f64());

    if let ChannelOutcome::Saved {
        records, photos, ..
    } = outcome
    {
        RECORDS_TOTAL
            .with_label_values(&[channel])
            .inc_by(*records as u64);
        PHOTOS_TOTAL
            .with_label_values(&[channel])
            .inc_by(*photos as u64);
    }
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        let mut response = Response::new(Full::from("encode error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }

    let mut response = Response::new(Full::from(buffer));
    if let Ok(value) = encoder.format_type().parse::<hyper::header::HeaderValue>() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
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
