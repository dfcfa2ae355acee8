use std::sync::Arc;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts};

pub struct Metrics {
    pub fetch_total: IntCounterVec, // label: outcome
    pub fetch_in_flight: IntGauge,
    pub fetch_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        let fetch_total = IntCounterVec::new(
            Opts::new("sensorpeek_fetch_total", "Single-message fetches by outcome"),
            &["outcome"],
        )
        .expect("valid fetch_total metric");
        let fetch_in_flight = IntGauge::new("sensorpeek_fetch_in_flight", "Fetches currently waiting on a broker")
            .expect("valid fetch_in_flight metric");
        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new("sensorpeek_fetch_duration_seconds", "Wall time of one fetch")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("valid fetch_duration metric");

        let registry = prometheus::default_registry();
        let _ = registry.register(Box::new(fetch_total.clone()));
        let _ = registry.register(Box::new(fetch_in_flight.clone()));
        let _ = registry.register(Box::new(fetch_duration.clone()));

        Arc::new(Self { fetch_total, fetch_in_flight, fetch_duration })
    }
}

/// Holds one unit of an in-flight gauge; released on drop, including when the
/// owning future is cancelled.
pub struct InFlight {
    gauge: IntGauge,
}

impl InFlight {
    pub fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self { gauge: gauge.clone() }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
