//! Observability: `tracing` spans and Prometheus metrics.
//!
//! Both halves are feature-gated (`tracing`, `metrics`); call sites guard
//! their use with the matching `#[cfg]`.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{QuarryMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
    };
    use opentelemetry_prometheus::PrometheusExporter;
    use std::time::Duration;

    pub static METRICS: Lazy<QuarryMetrics> = Lazy::new(QuarryMetrics::init);

    pub struct QuarryMetrics {
        pub exporter: Option<PrometheusExporter>,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub transactions_total: Counter<u64>,
        pub rollbacks_total: Counter<u64>,
    }

    impl QuarryMetrics {
        pub fn init() -> Self {
            let exporter = match opentelemetry_prometheus::exporter().build() {
                Ok(exporter) => Some(exporter),
                Err(err) => {
                    log::warn!("prometheus exporter unavailable: {err}");
                    None
                }
            };
            let meter = global::meter("quarry");

            let queries_total = meter
                .u64_counter("quarry_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("quarry_query_errors_total")
                .with_description("Statements that failed in the driver")
                .build();

            let query_duration = meter
                .f64_histogram("quarry_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("quarry_connection_wait_seconds")
                .with_description("Time spent waiting for a pooled connection")
                .build();

            let transactions_total = meter
                .u64_counter("quarry_transactions_total")
                .with_description("Atomic blocks started")
                .build();

            let rollbacks_total = meter
                .u64_counter("quarry_rollbacks_total")
                .with_description("Atomic blocks rolled back")
                .build();

            Self {
                exporter,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                transactions_total,
                rollbacks_total,
            }
        }

        pub fn record_query(&self, elapsed: Duration, ok: bool) {
            self.queries_total.add(1, &[]);
            if !ok {
                self.query_errors_total.add(1, &[]);
            }
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn observe_wait(&self, duration: Duration) {
            self.connection_wait_duration
                .record(duration.as_secs_f64(), &[]);
        }

        pub fn record_transaction(&self, rolled_back: bool) {
            self.transactions_total.add(1, &[]);
            if rolled_back {
                self.rollbacks_total.add(1, &[]);
            }
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Longest SQL prefix recorded on a span.
    const SQL_PREVIEW: usize = 200;

    pub fn execute_query_span(sql: &str) -> Span {
        let preview = match sql.char_indices().nth(SQL_PREVIEW) {
            Some((idx, _)) => &sql[..idx],
            None => sql,
        };
        info_span!("quarry.execute_query", sql = preview)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("quarry.acquire_connection")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("quarry.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("quarry.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("quarry.rollback_transaction")
    }
}
