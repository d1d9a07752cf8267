//! Prometheus metrics for the bus.
//!
//! All metrics follow the naming convention: `relay_bus_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_sent_total)
//! - **Gauge**: Value that can go up or down (e.g., pending_sends)
//! - **Histogram**: Distribution of values (e.g., handler_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry holding every bus metric
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Envelopes handed to the transport, by message kind
    pub static ref MESSAGES_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_bus_messages_sent_total", "Envelopes handed to the transport"),
        &["kind"]  // kind: command/event
    ).expect("metric creation failed");

    /// Sends awaiting an acknowledgment
    pub static ref PENDING_SENDS: IntGauge = IntGauge::new(
        "relay_bus_pending_sends",
        "Sent commands awaiting a remote acknowledgment"
    ).expect("metric creation failed");

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Envelopes received from the transport
    pub static ref MESSAGES_RECEIVED: IntCounter = IntCounter::new(
        "relay_bus_messages_received_total",
        "Envelopes received from the transport"
    ).expect("metric creation failed");

    /// Acknowledgments emitted for received envelopes
    pub static ref ACKS_SENT: IntCounter = IntCounter::new(
        "relay_bus_acks_sent_total",
        "Acknowledgments emitted for received envelopes"
    ).expect("metric creation failed");

    /// Payloads that could not be deserialized
    pub static ref DESERIALIZATION_FAILURES: IntCounter = IntCounter::new(
        "relay_bus_deserialization_failures_total",
        "Received payloads that failed to deserialize"
    ).expect("metric creation failed");

    // =========================================================================
    // LOCAL DISPATCH
    // =========================================================================

    /// Messages dispatched to local handlers
    pub static ref LOCAL_DISPATCHES: IntCounter = IntCounter::new(
        "relay_bus_local_dispatches_total",
        "Messages handed to the local dispatcher"
    ).expect("metric creation failed");

    /// Handler invocations that returned an error
    pub static ref HANDLER_ERRORS: IntCounter = IntCounter::new(
        "relay_bus_handler_errors_total",
        "Handler invocations that returned an error"
    ).expect("metric creation failed");

    /// Handler execution time
    pub static ref HANDLER_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "relay_bus_handler_duration_seconds",
            "Time spent inside message handlers"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Register all bus metrics with [`REGISTRY`].
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_SENT.clone()),
        Box::new(PENDING_SENDS.clone()),
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(ACKS_SENT.clone()),
        Box::new(DESERIALIZATION_FAILURES.clone()),
        Box::new(LOCAL_DISPATCHES.clone()),
        Box::new(HANDLER_ERRORS.clone()),
        Box::new(HANDLER_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
