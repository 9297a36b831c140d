//! In-process collector backed by concurrent maps
//!
//! Serves tests and embedders that want process-local metrics without an
//! external collector. Mutation is atomic per series: each series lives under
//! its own map entry and updates hold that entry's lock only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::handler::{CollectorError, CollectorState, MetricsPort};
use crate::metrics::{MetricKind, MetricsRegistry};

/// A series identity: family name plus its label pairs in key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct SeriesKey {
    pub(super) name: String,
    pub(super) labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &BTreeMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// `name{k="v",...}`, or the bare name without labels.
    pub(super) fn rendered(&self) -> String {
        if self.labels.is_empty() {
            return self.name.clone();
        }
        let pairs: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        format!("{}{{{}}}", self.name, pairs.join(","))
    }

    /// Rendered with one extra label appended, for `quantile` series.
    fn rendered_with(&self, extra_key: &str, extra_value: &str) -> String {
        let mut labels = self.labels.clone();
        labels.push((extra_key.to_string(), extra_value.to_string()));
        labels.sort();
        SeriesKey {
            name: self.name.clone(),
            labels,
        }
        .rendered()
    }

    fn matches_filter(&self, filter: Option<&BTreeMap<String, String>>) -> bool {
        match filter {
            None => true,
            Some(filter) => {
                self.labels.len() == filter.len()
                    && self
                        .labels
                        .iter()
                        .all(|(k, v)| filter.get(k).is_some_and(|fv| fv == v))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct HistogramSeries {
    /// Per-bucket (non-cumulative) observation counts, indexed like the
    /// definition's bounds
    pub(super) bucket_counts: Vec<u64>,
    /// Observations above the last bound (the `+Inf` bucket's own share)
    pub(super) overflow: u64,
    pub(super) sum: f64,
    pub(super) count: u64,
}

#[derive(Debug, Clone, Default)]
pub(super) struct SummarySeries {
    pub(super) sum: f64,
    pub(super) count: u64,
    /// Every observation, kept for quantile reads. Unbounded; suits the
    /// in-process scale this collector targets.
    pub(super) observations: Vec<f64>,
}

impl SummarySeries {
    pub(super) fn quantile(&self, q: f64) -> f64 {
        if self.observations.is_empty() {
            return f64::NAN;
        }
        let mut sorted = self.observations.clone();
        sorted.sort_by(f64::total_cmp);
        let rank = ((sorted.len() as f64 - 1.0) * q).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_DRAINING: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// A [`MetricsPort`] holding every series in process memory.
pub struct InMemoryCollector {
    registry: Arc<MetricsRegistry>,
    state: AtomicU8,
    counters: DashMap<SeriesKey, f64>,
    gauges: DashMap<SeriesKey, f64>,
    histograms: DashMap<SeriesKey, HistogramSeries>,
    summaries: DashMap<SeriesKey, SummarySeries>,
}

impl InMemoryCollector {
    /// A collector in the `Uninitialized` state; call
    /// [`activate`](Self::activate) before recording.
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            registry,
            state: AtomicU8::new(STATE_UNINITIALIZED),
            counters: DashMap::new(),
            gauges: DashMap::new(),
            histograms: DashMap::new(),
            summaries: DashMap::new(),
        }
    }

    /// A collector already in the `Active` state.
    pub fn active(registry: Arc<MetricsRegistry>) -> Self {
        let collector = Self::new(registry);
        collector.activate();
        collector
    }

    /// Begin accepting samples.
    pub fn activate(&self) {
        self.state.store(STATE_ACTIVE, Ordering::SeqCst);
    }

    /// Enter the draining phase; samples are still accepted.
    pub fn drain(&self) {
        self.state.store(STATE_DRAINING, Ordering::SeqCst);
    }

    /// Shut down; every further effect answers `collector_unavailable`.
    pub fn close(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    /// The registry this collector validates shapes against.
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    pub(super) fn counter_samples(&self, name: &str) -> Vec<(SeriesKey, f64)> {
        let mut samples: Vec<(SeriesKey, f64)> = self
            .counters
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        samples
    }

    pub(super) fn gauge_samples(&self, name: &str) -> Vec<(SeriesKey, f64)> {
        let mut samples: Vec<(SeriesKey, f64)> = self
            .gauges
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        samples
    }

    pub(super) fn histogram_samples(&self, name: &str) -> Vec<(SeriesKey, HistogramSeries)> {
        let mut samples: Vec<(SeriesKey, HistogramSeries)> = self
            .histograms
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        samples
    }

    pub(super) fn summary_samples(&self, name: &str) -> Vec<(SeriesKey, SummarySeries)> {
        let mut samples: Vec<(SeriesKey, SummarySeries)> = self
            .summaries
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        samples
    }
}

#[async_trait]
impl MetricsPort for InMemoryCollector {
    fn state(&self) -> CollectorState {
        match self.state.load(Ordering::SeqCst) {
            STATE_ACTIVE => CollectorState::Active,
            STATE_DRAINING => CollectorState::Draining,
            STATE_CLOSED => CollectorState::Closed,
            _ => CollectorState::Uninitialized,
        }
    }

    async fn record(
        &self,
        kind: MetricKind,
        name: &str,
        labels: &BTreeMap<String, String>,
        value: f64,
    ) -> Result<(), CollectorError> {
        let key = SeriesKey::new(name, labels);
        match kind {
            MetricKind::Counter => {
                *self.counters.entry(key).or_insert(0.0) += value;
            }
            MetricKind::Gauge => {
                self.gauges.insert(key, value);
            }
            MetricKind::Histogram => {
                let definition = self.registry.histogram(name).ok_or_else(|| {
                    CollectorError::new(format!("histogram {name} missing from registry"))
                })?;
                let mut series = self.histograms.entry(key).or_insert_with(|| {
                    HistogramSeries {
                        bucket_counts: vec![0; definition.buckets.len()],
                        overflow: 0,
                        sum: 0.0,
                        count: 0,
                    }
                });
                match definition.buckets.iter().position(|bound| value <= *bound) {
                    Some(index) => series.bucket_counts[index] += 1,
                    None => series.overflow += 1,
                }
                series.sum += value;
                series.count += 1;
            }
            MetricKind::Summary => {
                let mut series = self.summaries.entry(key).or_default();
                series.sum += value;
                series.count += 1;
                series.observations.push(value);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<BTreeMap<String, f64>, CollectorError> {
        let kind = self
            .registry
            .kind_of(name)
            .ok_or_else(|| CollectorError::new(format!("metric {name} missing from registry")))?;

        let mut out = BTreeMap::new();
        match kind {
            MetricKind::Counter => {
                for (key, value) in self.counter_samples(name) {
                    if key.matches_filter(labels) {
                        out.insert(key.rendered(), value);
                    }
                }
            }
            MetricKind::Gauge => {
                for (key, value) in self.gauge_samples(name) {
                    if key.matches_filter(labels) {
                        out.insert(key.rendered(), value);
                    }
                }
            }
            MetricKind::Histogram => {
                for (key, series) in self.histogram_samples(name) {
                    if key.matches_filter(labels) {
                        out.insert(format!("{}_sum", key.rendered()), series.sum);
                        out.insert(format!("{}_count", key.rendered()), series.count as f64);
                    }
                }
            }
            MetricKind::Summary => {
                let definition = self
                    .registry
                    .summary(name)
                    .ok_or_else(|| CollectorError::new(format!("summary {name} missing")))?;
                for (key, series) in self.summary_samples(name) {
                    if key.matches_filter(labels) {
                        out.insert(format!("{}_sum", key.rendered()), series.sum);
                        out.insert(format!("{}_count", key.rendered()), series.count as f64);
                        for quantile in &definition.quantiles {
                            out.insert(
                                key.rendered_with("quantile", &quantile.to_string()),
                                series.quantile(*quantile),
                            );
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    async fn reset(&self) -> Result<(), CollectorError> {
        self.counters.clear();
        self.gauges.clear();
        self.histograms.clear();
        self.summaries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        CounterDefinition, GaugeDefinition, HistogramDefinition, SummaryDefinition,
    };

    fn registry() -> Arc<MetricsRegistry> {
        Arc::new(
            MetricsRegistry::new(
                vec![CounterDefinition::new(
                    "tasks_total",
                    "Tasks processed",
                    ["status"],
                )],
                vec![GaugeDefinition::new("queue_depth", "Jobs waiting", ["queue"])],
                vec![HistogramDefinition::new(
                    "task_duration_seconds",
                    "Task latency",
                    ["task_type"],
                    vec![0.1, 1.0],
                )],
                vec![SummaryDefinition::new(
                    "payload_bytes",
                    "Payload sizes",
                    ["topic"],
                    vec![0.5, 0.9],
                )],
            )
            .unwrap(),
        )
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_counter_accumulates_per_series() {
        let collector = InMemoryCollector::active(registry());
        for _ in 0..3 {
            collector
                .record(
                    MetricKind::Counter,
                    "tasks_total",
                    &labels(&[("status", "ok")]),
                    2.0,
                )
                .await
                .unwrap();
        }
        collector
            .record(
                MetricKind::Counter,
                "tasks_total",
                &labels(&[("status", "failed")]),
                1.0,
            )
            .await
            .unwrap();

        let values = collector.query("tasks_total", None).await.unwrap();
        assert_eq!(values.get("tasks_total{status=\"ok\"}"), Some(&6.0));
        assert_eq!(values.get("tasks_total{status=\"failed\"}"), Some(&1.0));
    }

    #[tokio::test]
    async fn test_gauge_keeps_last_value() {
        let collector = InMemoryCollector::active(registry());
        for value in [5.0, 2.0, 9.0] {
            collector
                .record(
                    MetricKind::Gauge,
                    "queue_depth",
                    &labels(&[("queue", "default")]),
                    value,
                )
                .await
                .unwrap();
        }
        let values = collector.query("queue_depth", None).await.unwrap();
        assert_eq!(values.get("queue_depth{queue=\"default\"}"), Some(&9.0));
    }

    #[tokio::test]
    async fn test_histogram_buckets_and_totals() {
        let collector = InMemoryCollector::active(registry());
        for value in [0.05, 0.5, 5.0] {
            collector
                .record(
                    MetricKind::Histogram,
                    "task_duration_seconds",
                    &labels(&[("task_type", "email")]),
                    value,
                )
                .await
                .unwrap();
        }

        let samples = collector.histogram_samples("task_duration_seconds");
        assert_eq!(samples.len(), 1);
        let series = &samples[0].1;
        assert_eq!(series.bucket_counts, vec![1, 1]);
        assert_eq!(series.overflow, 1);
        assert_eq!(series.count, 3);
        assert!((series.sum - 5.55).abs() < 1e-9);

        let values = collector.query("task_duration_seconds", None).await.unwrap();
        assert_eq!(
            values.get("task_duration_seconds_count{task_type=\"email\"}"),
            Some(&3.0)
        );
    }

    #[tokio::test]
    async fn test_summary_quantiles() {
        let collector = InMemoryCollector::active(registry());
        for value in 1..=100 {
            collector
                .record(
                    MetricKind::Summary,
                    "payload_bytes",
                    &labels(&[("topic", "events")]),
                    f64::from(value),
                )
                .await
                .unwrap();
        }

        let values = collector.query("payload_bytes", None).await.unwrap();
        assert_eq!(
            values.get("payload_bytes_count{topic=\"events\"}"),
            Some(&100.0)
        );
        let median = values
            .get("payload_bytes{quantile=\"0.5\",topic=\"events\"}")
            .copied()
            .unwrap();
        assert!((49.0..=52.0).contains(&median));
    }

    #[tokio::test]
    async fn test_query_label_filter() {
        let collector = InMemoryCollector::active(registry());
        for status in ["ok", "failed"] {
            collector
                .record(
                    MetricKind::Counter,
                    "tasks_total",
                    &labels(&[("status", status)]),
                    1.0,
                )
                .await
                .unwrap();
        }

        let values = collector
            .query("tasks_total", Some(&labels(&[("status", "ok")])))
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert!(values.contains_key("tasks_total{status=\"ok\"}"));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let collector = InMemoryCollector::active(registry());
        collector
            .record(
                MetricKind::Counter,
                "tasks_total",
                &labels(&[("status", "ok")]),
                1.0,
            )
            .await
            .unwrap();
        collector.reset().await.unwrap();
        let values = collector.query("tasks_total", None).await.unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let collector = InMemoryCollector::new(registry());
        assert_eq!(collector.state(), CollectorState::Uninitialized);
        collector.activate();
        assert_eq!(collector.state(), CollectorState::Active);
        collector.drain();
        assert_eq!(collector.state(), CollectorState::Draining);
        collector.close();
        assert_eq!(collector.state(), CollectorState::Closed);
    }

    #[test]
    fn test_series_key_rendering() {
        let key = SeriesKey::new("tasks_total", &labels(&[("b", "2"), ("a", "1")]));
        assert_eq!(key.rendered(), "tasks_total{a=\"1\",b=\"2\"}");

        let bare = SeriesKey::new("up", &BTreeMap::new());
        assert_eq!(bare.rendered(), "up");
    }
}
