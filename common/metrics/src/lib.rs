//! A wrapper around the `prometheus` crate that provides a global, `Result`-oriented interface
//! for defining and updating metrics.
//!
//! Metric creation is fallible (e.g., two metrics with the same name), so metrics are stored as
//! `Result<Metric>` and the update functions silently ignore metrics that failed to register.
//! This allows the library to be used without panicking, even if metrics are misconfigured.

pub use prometheus::{
    Error, Histogram, HistogramTimer, IntCounter, IntGauge, Opts, Result, TextEncoder,
};
use prometheus::HistogramOpts;

/// Collect all the metrics for reporting.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    prometheus::gather()
}

/// Attempts to create an `IntCounter`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry does not accept the gauge
/// (potentially due to naming conflict).
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry does not accept the histogram
/// (potentially due to naming conflict).
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Starts a timer for the given `Histogram`, stopping when it gets dropped or given to
/// `stop_timer(..)`.
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    if let Ok(histogram) = histogram {
        Some(histogram.start_timer())
    } else {
        None
    }
}

/// Stops a timer created with `start_timer(..)`.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(t) = timer {
        t.observe_duration();
    }
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn inc_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.inc();
    }
}

pub fn dec_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_counter() {
        let counter = try_create_int_counter("metrics_test_counter", "test").unwrap();
        inc_counter(&Ok(counter.clone()));
        assert_eq!(counter.get(), 1);

        inc_counter_by(&Ok(counter.clone()), 10);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn int_gauge() {
        let gauge = try_create_int_gauge("metrics_test_gauge", "test").unwrap();
        set_gauge(&Ok(gauge.clone()), 42);
        assert_eq!(gauge.get(), 42);

        inc_gauge(&Ok(gauge.clone()));
        dec_gauge(&Ok(gauge.clone()));
        assert_eq!(gauge.get(), 42);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        try_create_int_gauge("metrics_test_duplicate", "test").unwrap();
        assert!(try_create_int_gauge("metrics_test_duplicate", "test").is_err());
    }
}
