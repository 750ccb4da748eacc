//! Operation metrics.
//!
//! Metrics go through the `metrics` facade; without an installed recorder
//! they are no-ops.

use crate::models::ErrorCode;
use std::time::Instant;

/// Counter of data-access operations.
pub const OPERATIONS_TOTAL: &str = "sqlwrap_operations_total";

/// Histogram of data-access operation latency in milliseconds.
pub const OPERATION_DURATION_MS: &str = "sqlwrap_operation_duration_ms";

/// Records operation metrics.
///
/// This function records two metrics for each operation:
/// 1. `sqlwrap_operations_total` - counter by backend, operation and status
/// 2. `sqlwrap_operation_duration_ms` - latency histogram with the same labels
///
/// `status` is `success` or the kebab-case name of the failure code.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    code: ErrorCode,
) {
    let status = if code.is_failure() {
        code.as_str()
    } else {
        "success"
    };
    metrics::counter!(
        OPERATIONS_TOTAL,
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        OPERATION_DURATION_MS,
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
