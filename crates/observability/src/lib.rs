use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Pipeline counters. Each increment is mirrored to the `metrics` facade so an
/// exporter installed by the host process sees the same numbers.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    messages_total: AtomicU64,
    responded_total: AtomicU64,
    denied_risky_total: AtomicU64,
    denied_permission_total: AtomicU64,
    clarifications_total: AtomicU64,
    handler_errors_total: AtomicU64,
    llm_fallbacks_total: AtomicU64,
    outbound_failures_total: AtomicU64,
    store_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_total: u64,
    pub responded_total: u64,
    pub denied_risky_total: u64,
    pub denied_permission_total: u64,
    pub clarifications_total: u64,
    pub handler_errors_total: u64,
    pub llm_fallbacks_total: u64,
    pub outbound_failures_total: u64,
    pub store_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl PipelineMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_message(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_messages_total").increment(1);
    }

    pub fn inc_responded(&self) {
        self.responded_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_responded_total").increment(1);
    }

    pub fn inc_denied_risky(&self) {
        self.denied_risky_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_denied_total", "reason" => "risky_content").increment(1);
    }

    pub fn inc_denied_permission(&self) {
        self.denied_permission_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_denied_total", "reason" => "insufficient_permission").increment(1);
    }

    pub fn inc_clarification(&self) {
        self.clarifications_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_clarifications_total").increment(1);
    }

    pub fn inc_handler_error(&self) {
        self.handler_errors_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_handler_errors_total").increment(1);
    }

    pub fn inc_llm_fallback(&self) {
        self.llm_fallbacks_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_llm_fallbacks_total").increment(1);
    }

    pub fn add_outbound_failures(&self, failures: usize) {
        if failures == 0 {
            return;
        }
        self.outbound_failures_total
            .fetch_add(failures as u64, Ordering::Relaxed);
        counter!("switchboard_outbound_failures_total").increment(failures as u64);
    }

    pub fn inc_store_failure(&self) {
        self.store_failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("switchboard_store_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        histogram!("switchboard_pipeline_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let messages = self.messages_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            messages_total: messages,
            responded_total: self.responded_total.load(Ordering::Relaxed),
            denied_risky_total: self.denied_risky_total.load(Ordering::Relaxed),
            denied_permission_total: self.denied_permission_total.load(Ordering::Relaxed),
            clarifications_total: self.clarifications_total.load(Ordering::Relaxed),
            handler_errors_total: self.handler_errors_total.load(Ordering::Relaxed),
            llm_fallbacks_total: self.llm_fallbacks_total.load(Ordering::Relaxed),
            outbound_failures_total: self.outbound_failures_total.load(Ordering::Relaxed),
            store_failures_total: self.store_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if messages == 0 {
                0.0
            } else {
                latency as f64 / messages as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,switchboard_agents=info,switchboard_ml=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = PipelineMetrics::default();
        metrics.inc_message();
        metrics.inc_message();
        metrics.inc_denied_risky();
        metrics.inc_responded();
        metrics.add_outbound_failures(0);
        metrics.add_outbound_failures(2);
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_total, 2);
        assert_eq!(snapshot.denied_risky_total, 1);
        assert_eq!(snapshot.responded_total, 1);
        assert_eq!(snapshot.outbound_failures_total, 2);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }

    #[test]
    fn empty_snapshot_has_zero_latency() {
        assert_eq!(PipelineMetrics::default().snapshot().avg_latency_millis, 0.0);
    }
}
