//! Prometheus metrics for permission checks and role changes
//!
//! Each [`MetricsCollector`] owns its own [`Registry`], so several services in
//! one process never share counters. Exported series:
//!
//! - `acl_checks_total{outcome}`: decisions, `granted` or `denied`
//! - `acl_check_duration_seconds{outcome}`: decision latency
//! - `acl_cache_lookups_total{result}`: `hit` or `miss` (stale entries count as misses)
//! - `acl_role_changes_total{op}`: `assign`, `revoke` or `purge`
//! - `acl_errors_total`: failed operations surfaced to callers

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, HistogramOpts, HistogramVec, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::error::Result;

/// Latency buckets in seconds; cached checks land in the lowest ones
const CHECK_DURATION_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
];

const GRANTED: &str = "granted";
const DENIED: &str = "denied";

/// Point-in-time view of the collected metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMetrics {
    pub total_checks: u64,
    pub granted_decisions: u64,
    pub denied_decisions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub assignments: u64,
    pub revocations: u64,

    /// Expired assignments removed by explicit purges
    pub purged_assignments: u64,

    pub error_count: u64,

    /// Mean decision latency, zero before the first check
    pub avg_latency_ms: f64,
}

impl ServiceMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    pub fn grant_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.granted_decisions as f64 / self.total_checks as f64
        }
    }
}

/// Metrics registered against a private Prometheus registry
pub struct MetricsCollector {
    registry: Registry,
    checks: IntCounterVec,
    check_duration: HistogramVec,
    cache_lookups: IntCounterVec,
    role_changes: IntCounterVec,
    errors: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let checks = register_int_counter_vec_with_registry!(
            Opts::new("acl_checks_total", "Permission checks by outcome"),
            &["outcome"],
            registry
        )?;

        let check_duration = register_histogram_vec_with_registry!(
            HistogramOpts::new("acl_check_duration_seconds", "Permission check latency")
                .buckets(CHECK_DURATION_BUCKETS.to_vec()),
            &["outcome"],
            registry
        )?;

        let cache_lookups = register_int_counter_vec_with_registry!(
            Opts::new("acl_cache_lookups_total", "Result cache lookups by result"),
            &["result"],
            registry
        )?;

        let role_changes = register_int_counter_vec_with_registry!(
            Opts::new("acl_role_changes_total", "Assignment changes by operation"),
            &["op"],
            registry
        )?;

        let errors = register_int_counter_with_registry!(
            Opts::new("acl_errors_total", "Failed operations surfaced to callers"),
            registry
        )?;

        Ok(Self {
            registry,
            checks,
            check_duration,
            cache_lookups,
            role_changes,
            errors,
        })
    }

    pub fn record_decision(&self, granted: bool, latency: Duration) {
        let outcome = if granted { GRANTED } else { DENIED };
        self.checks.with_label_values(&[outcome]).inc();
        self.check_duration
            .with_label_values(&[outcome])
            .observe(latency.as_secs_f64());
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn record_assignment(&self) {
        self.role_changes.with_label_values(&["assign"]).inc();
    }

    pub fn record_revocation(&self) {
        self.role_changes.with_label_values(&["revoke"]).inc();
    }

    pub fn record_purge(&self, removed: usize) {
        self.role_changes
            .with_label_values(&["purge"])
            .inc_by(removed as u64);
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn snapshot(&self) -> ServiceMetrics {
        let granted = self.checks.with_label_values(&[GRANTED]).get();
        let denied = self.checks.with_label_values(&[DENIED]).get();

        let (sum, count) = [GRANTED, DENIED]
            .into_iter()
            .map(|outcome| self.check_duration.with_label_values(&[outcome]))
            .fold((0.0, 0u64), |(sum, count), h| {
                (sum + h.get_sample_sum(), count + h.get_sample_count())
            });

        ServiceMetrics {
            total_checks: granted + denied,
            granted_decisions: granted,
            denied_decisions: denied,
            cache_hits: self.cache_lookups.with_label_values(&["hit"]).get(),
            cache_misses: self.cache_lookups.with_label_values(&["miss"]).get(),
            assignments: self.role_changes.with_label_values(&["assign"]).get(),
            revocations: self.role_changes.with_label_values(&["revoke"]).get(),
            purged_assignments: self.role_changes.with_label_values(&["purge"]).get(),
            error_count: self.errors.get(),
            avg_latency_ms: if count == 0 {
                0.0
            } else {
                sum / count as f64 * 1000.0
            },
        }
    }

    pub fn reset(&self) {
        self.checks.reset();
        self.check_duration.reset();
        self.cache_lookups.reset();
        self.role_changes.reset();
        self.errors.reset();
    }

    /// Text exposition of every registered series
    pub fn export_prometheus(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decision() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_decision(true, Duration::from_millis(2));
        collector.record_decision(false, Duration::from_millis(4));
        collector.record_decision(true, Duration::from_millis(6));

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_checks, 3);
        assert_eq!(metrics.granted_decisions, 2);
        assert_eq!(metrics.denied_decisions, 1);
        assert!((metrics.grant_rate() - 0.666).abs() < 0.01);
        assert!((metrics.avg_latency_ms - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_cache_lookups() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_cache_lookup(true);
        collector.record_cache_lookup(false);

        let metrics = collector.snapshot();
        assert_eq!(metrics.cache_hits, 1);
        assert!((metrics.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_role_changes() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_assignment();
        collector.record_assignment();
        collector.record_revocation();
        collector.record_purge(3);
        collector.record_purge(0);

        let metrics = collector.snapshot();
        assert_eq!(metrics.assignments, 2);
        assert_eq!(metrics.revocations, 1);
        assert_eq!(metrics.purged_assignments, 3);
    }

    #[test]
    fn test_collectors_are_independent() {
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();

        first.record_error();
        assert_eq!(first.snapshot().error_count, 1);
        assert_eq!(second.snapshot().error_count, 0);
    }

    #[test]
    fn test_export_and_reset() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_decision(true, Duration::from_micros(30));
        collector.record_assignment();

        let text = collector.export_prometheus().unwrap();
        assert!(text.contains("acl_checks_total{outcome=\"granted\"} 1"));
        assert!(text.contains("acl_role_changes_total{op=\"assign\"} 1"));
        assert!(text.contains("acl_check_duration_seconds_count{outcome=\"granted\"} 1"));
        assert!(text.contains("acl_errors_total 0"));

        collector.reset();
        assert_eq!(collector.snapshot(), ServiceMetrics::default());
    }
}
