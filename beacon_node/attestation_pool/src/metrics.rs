pub use metrics::*;
use std::sync::LazyLock;

pub static ATTESTATION_POOL_SIZE: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "attestation_pool_size",
        "The number of attestations available to be included in proposed blocks",
    )
});
pub static ATTESTATION_POOL_EVICTED_ATTESTATIONS: LazyLock<Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "attestation_pool_evicted_attestations_total",
            "Total count of attestations dropped early by capacity eviction",
        )
    });
pub static ATTESTATION_POOL_PACKING_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "attestation_pool_packing_seconds",
        "The duration in seconds of selecting attestations for a block",
    )
});
pub static CURRENT_LIVE_VALIDATORS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "current_live_validators",
        "The number of validators with attestations from the current epoch",
    )
});
pub static PREVIOUS_LIVE_VALIDATORS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "previous_live_validators",
        "The number of validators with attestations from the previous epoch",
    )
});
pub static CURRENT_CORRECT_VALIDATORS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "current_correct_validators",
        "The number of validators who voted for the correct target in the current epoch",
    )
});
pub static PREVIOUS_CORRECT_VALIDATORS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "previous_correct_validators",
        "The number of validators who voted for the correct target in the previous epoch",
    )
});
