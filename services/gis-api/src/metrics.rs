//! Request metrics exported through the Prometheus recorder.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::pipeline::Operation;

pub fn record_request(operation: Operation) {
    counter!("gis_requests_total", "operation" => operation.as_str()).increment(1);
}

pub fn record_error(operation: Operation, code: &'static str) {
    counter!(
        "gis_request_errors_total",
        "operation" => operation.as_str(),
        "code" => code
    )
    .increment(1);
}

pub fn record_duration(operation: Operation, elapsed: Duration) {
    histogram!("gis_request_duration_ms", "operation" => operation.as_str())
        .record(elapsed.as_secs_f64() * 1000.0);
}
