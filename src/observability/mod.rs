use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter, MeterProvider},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::{info, warn};

/// Metric instruments for the scheduler and ingestion pipeline
#[derive(Clone)]
pub struct AppObservability {
    pub meter: Meter,
    provider: Option<SdkMeterProvider>,

    pub job_executions: Counter<u64>,
    pub job_fires_skipped: Counter<u64>,
    pub job_execution_duration: Histogram<f64>,

    pub episodes_added: Counter<u64>,
    pub episodes_skipped: Counter<u64>,
    pub episode_entry_failures: Counter<u64>,
    pub feed_fetch_failures: Counter<u64>,

    pub job_executions_pruned: Counter<u64>,
}

impl AppObservability {
    /// Install an in-process meter provider as the global provider
    pub fn new(service_name: &'static str) -> Self {
        let provider = SdkMeterProvider::builder().build();
        global::set_meter_provider(provider.clone());

        let meter = provider.meter(service_name);
        info!("OpenTelemetry configured: local metrics for {}", service_name);

        let mut observability = Self::build_with_instruments(meter);
        observability.provider = Some(provider);
        observability
    }

    /// Instruments on an existing meter (tests use the global no-op meter)
    pub fn from_meter(meter: Meter) -> Self {
        Self::build_with_instruments(meter)
    }

    fn build_with_instruments(meter: Meter) -> Self {
        let job_executions = meter
            .u64_counter("job_executions_total")
            .with_description("Completed job executions by job and status")
            .build();
        let job_fires_skipped = meter
            .u64_counter("job_fires_skipped_total")
            .with_description("Fires skipped because the job was at max_instances")
            .build();
        let job_execution_duration = meter
            .f64_histogram("job_execution_duration_seconds")
            .with_description("Wall-clock duration of job executions")
            .build();

        let episodes_added = meter
            .u64_counter("episodes_added_total")
            .with_description("Episodes stored for the first time")
            .build();
        let episodes_skipped = meter
            .u64_counter("episodes_skipped_total")
            .with_description("Feed entries whose guid was already stored")
            .build();
        let episode_entry_failures = meter
            .u64_counter("episode_entry_failures_total")
            .with_description("Feed entries that could not be ingested")
            .build();
        let feed_fetch_failures = meter
            .u64_counter("feed_fetch_failures_total")
            .with_description("Feed retrievals that failed")
            .build();

        let job_executions_pruned = meter
            .u64_counter("job_executions_pruned_total")
            .with_description("Execution records deleted by retention")
            .build();

        Self {
            meter,
            provider: None,
            job_executions,
            job_fires_skipped,
            job_execution_duration,
            episodes_added,
            episodes_skipped,
            episode_entry_failures,
            feed_fetch_failures,
            job_executions_pruned,
        }
    }

    pub fn record_execution(&self, job_id: &str, status: &str, duration_secs: f64) {
        let attributes = [
            KeyValue::new("job_id", job_id.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.job_executions.add(1, &attributes);
        self.job_execution_duration.record(duration_secs, &attributes[..1]);
    }

    pub fn record_skipped_fire(&self, job_id: &str) {
        self.job_fires_skipped
            .add(1, &[KeyValue::new("job_id", job_id.to_string())]);
    }

    pub fn record_ingest(&self, job_id: &str, added: usize, skipped: usize, failed: usize) {
        let attributes = [KeyValue::new("job_id", job_id.to_string())];
        self.episodes_added.add(added as u64, &attributes);
        self.episodes_skipped.add(skipped as u64, &attributes);
        self.episode_entry_failures.add(failed as u64, &attributes);
    }

    pub fn record_fetch_failure(&self, job_id: &str) {
        self.feed_fetch_failures
            .add(1, &[KeyValue::new("job_id", job_id.to_string())]);
    }

    pub fn record_pruned(&self, count: u64) {
        self.job_executions_pruned.add(count, &[]);
    }

    /// Flush and stop the meter provider, if this instance owns one
    pub fn shutdown(&self) {
        if let Some(provider) = &self.provider
            && let Err(e) = provider.shutdown()
        {
            warn!("Failed to shut down meter provider: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_on_noop_meter_does_not_panic() {
        let observability = AppObservability::from_meter(global::meter("podcast-ingest-test"));
        observability.record_execution("feed", "succeeded", 0.25);
        observability.record_skipped_fire("feed");
        observability.record_ingest("feed", 2, 1, 0);
        observability.record_fetch_failure("feed");
        observability.record_pruned(3);
        observability.shutdown();
    }
}
