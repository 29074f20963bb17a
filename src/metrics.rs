use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "gateway_requests_total",
        "Total number of requests per endpoint",
        &["endpoint"]
    )
    .unwrap();
    pub static ref GUARD_REJECTIONS: CounterVec = register_counter_vec!(
        "guard_rejections_total",
        "Requests turned away by the API guard",
        &["reason"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Latency of upstream ranking and LLM calls in seconds"
    )
    .unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref RATE_LIMITER_KEYS: Gauge =
        register_gauge!("rate_limiter_keys", "Keys left in the rate limiter after the last sweep")
            .unwrap();
}

// Render the default registry in prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
