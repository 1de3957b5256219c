// Metric names and help strings are static, so construction only fails on a typo
#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Recognition Service Metrics ====
    pub static ref LPR_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("lpr_requests_total", "Total number of recognition requests"),
            &["endpoint", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_RECOGNITION_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "lpr_recognition_latency_seconds",
                "Wall-clock time of one recognition call",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_CANDIDATES_EVALUATED: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "lpr_candidates_evaluated",
                "Detector candidates examined per recognition call",
            )
            .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_MODEL_LOADED: IntGauge = {
        let metric = IntGauge::new("lpr_model_loaded", "1 when the recognition model is loaded")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_MODEL_LOAD_SECONDS: Histogram = {
        let metric = Histogram::with_opts(HistogramOpts::new(
            "lpr_model_load_seconds",
            "Time spent loading the recognition model",
        ))
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Register every metric so `/metrics` lists them before first use
pub fn init() {
    lazy_static::initialize(&LPR_REQUESTS);
    lazy_static::initialize(&LPR_RECOGNITION_LATENCY);
    lazy_static::initialize(&LPR_CANDIDATES_EVALUATED);
    lazy_static::initialize(&LPR_MODEL_LOADED);
    lazy_static::initialize(&LPR_MODEL_LOAD_SECONDS);
}

/// Count a finished request
pub fn record_request(endpoint: &str, outcome: &str) {
    LPR_REQUESTS.with_label_values(&[endpoint, outcome]).inc();
}

/// Record one recognition call
pub fn record_recognition(outcome: &str, latency_secs: f64, candidates: usize) {
    LPR_RECOGNITION_LATENCY
        .with_label_values(&[outcome])
        .observe(latency_secs);
    LPR_CANDIDATES_EVALUATED.observe(candidates as f64);
}

/// Encode the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
