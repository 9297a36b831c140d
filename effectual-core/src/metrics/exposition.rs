//! Prometheus text exposition for the in-memory collector
//!
//! Series names carry every registered label key; histograms follow the `le`
//! bucket convention with a terminal `+Inf` bucket plus `_sum` and `_count`
//! series.

use std::fmt::Write as _;

use super::memory::{InMemoryCollector, SeriesKey};

/// Render every registered family with its collected series.
///
/// Families with no samples yet still emit their `# HELP` / `# TYPE` header,
/// so scrapers see the full catalog from the first scrape.
pub fn render_prometheus(collector: &InMemoryCollector) -> String {
    let registry = collector.registry().clone();
    let mut out = String::new();

    for definition in registry.counters() {
        header(&mut out, &definition.name, &definition.help_text, "counter");
        for (key, value) in collector.counter_samples(&definition.name) {
            let _ = writeln!(out, "{} {}", key.rendered(), format_value(value));
        }
    }

    for definition in registry.gauges() {
        header(&mut out, &definition.name, &definition.help_text, "gauge");
        for (key, value) in collector.gauge_samples(&definition.name) {
            let _ = writeln!(out, "{} {}", key.rendered(), format_value(value));
        }
    }

    for definition in registry.histograms() {
        header(&mut out, &definition.name, &definition.help_text, "histogram");
        for (key, series) in collector.histogram_samples(&definition.name) {
            let mut cumulative = 0_u64;
            for (bound, bucket_count) in definition.buckets.iter().zip(&series.bucket_counts) {
                cumulative += bucket_count;
                let _ = writeln!(
                    out,
                    "{} {}",
                    bucket_series(&key, &format_value(*bound)),
                    cumulative
                );
            }
            let _ = writeln!(out, "{} {}", bucket_series(&key, "+Inf"), series.count);
            let _ = writeln!(
                out,
                "{}_sum{} {}",
                key.name,
                label_block(&key.labels),
                format_value(series.sum)
            );
            let _ = writeln!(
                out,
                "{}_count{} {}",
                key.name,
                label_block(&key.labels),
                series.count
            );
        }
    }

    for definition in registry.summaries() {
        header(&mut out, &definition.name, &definition.help_text, "summary");
        for (key, series) in collector.summary_samples(&definition.name) {
            for quantile in &definition.quantiles {
                let mut labels = key.labels.clone();
                labels.push(("quantile".to_string(), format_value(*quantile)));
                let _ = writeln!(
                    out,
                    "{}{} {}",
                    key.name,
                    label_block(&labels),
                    format_value(series.quantile(*quantile))
                );
            }
            let _ = writeln!(
                out,
                "{}_sum{} {}",
                key.name,
                label_block(&key.labels),
                format_value(series.sum)
            );
            let _ = writeln!(
                out,
                "{}_count{} {}",
                key.name,
                label_block(&key.labels),
                series.count
            );
        }
    }

    out
}

fn header(out: &mut String, name: &str, help_text: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help_text}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// `{k="v",...}` with `le` appended last, per the bucket convention.
fn bucket_series(key: &SeriesKey, bound: &str) -> String {
    let mut labels = key.labels.clone();
    labels.push(("le".to_string(), bound.to_string()));
    format!("{}_bucket{}", key.name, label_block(&labels))
}

fn label_block(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn format_value(value: f64) -> String {
    // `{}` keeps integral floats terse (1 not 1.0 is fine either way for
    // scrapers, but terse matches common exposition output).
    let mut rendered = format!("{value}");
    if rendered == "inf" {
        rendered = "+Inf".to_string();
    }
    rendered
}
