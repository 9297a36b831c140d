//! Metrics validation, lifecycle, exposition, and the never-abort guarantee

use std::collections::BTreeMap;
use std::sync::Arc;

use effectual_core::prelude::*;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn tasks_registry() -> Arc<MetricsRegistry> {
    Arc::new(
        MetricsRegistry::new(
            vec![CounterDefinition::new(
                "tasks_total",
                "Tasks processed",
                ["task_type", "status"],
            )],
            vec![GaugeDefinition::new(
                "queue_depth",
                "Jobs waiting",
                ["queue"],
            )],
            vec![HistogramDefinition::new(
                "task_duration_seconds",
                "Task latency",
                ["task_type"],
                vec![0.25, 1.0, 4.0],
            )],
            vec![SummaryDefinition::new(
                "payload_bytes",
                "Payload sizes",
                ["topic"],
                vec![0.5, 0.99],
            )],
        )
        .expect("catalog is well-formed"),
    )
}

fn metrics_handler() -> MetricsHandler<InMemoryCollector> {
    let registry = tasks_registry();
    MetricsHandler::new(Arc::clone(&registry), InMemoryCollector::active(registry))
}

async fn record(handler: &MetricsHandler<InMemoryCollector>, effect: Effect) -> Reply {
    handler.handle(effect).await.unwrap_ok()
}

// ============================================================================
// The validation table
// ============================================================================

#[tokio::test]
async fn unregistered_name_is_rejected() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "nope_total".to_string(),
            labels: labels(&[]),
            value: 1.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "metric_not_registered: nope_total".to_string()
        }
    );
}

#[tokio::test]
async fn kind_mismatch_is_rejected() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::ObserveHistogram {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email"), ("status", "ok")]),
            value: 0.5,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "type_mismatch".to_string()
        }
    );
}

#[tokio::test]
async fn missing_label_names_the_key() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email")]),
            value: 1.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "missing_label: status".to_string()
        }
    );
}

#[tokio::test]
async fn unexpected_label_names_the_key() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[
                ("task_type", "email"),
                ("status", "ok"),
                ("region", "eu"),
            ]),
            value: 1.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "unexpected_label: region".to_string()
        }
    );
}

#[tokio::test]
async fn empty_label_value_is_rejected() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::RecordGauge {
            metric_name: "queue_depth".to_string(),
            labels: labels(&[("queue", "")]),
            value: 3.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "empty_label_value: queue".to_string()
        }
    );
}

#[tokio::test]
async fn negative_counter_increment_is_rejected_but_zero_is_fine() {
    let handler = metrics_handler();

    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email"), ("status", "ok")]),
            value: -1.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "negative_counter_increment".to_string()
        }
    );

    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email"), ("status", "ok")]),
            value: 0.0,
        },
    )
    .await;
    assert!(matches!(reply, Reply::MetricRecorded { .. }));
}

#[tokio::test]
async fn non_finite_values_are_rejected_for_every_kind() {
    let handler = metrics_handler();
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let reply = record(
            &handler,
            Effect::RecordGauge {
                metric_name: "queue_depth".to_string(),
                labels: labels(&[("queue", "default")]),
                value,
            },
        )
        .await;
        assert_eq!(
            reply,
            Reply::MetricRecordingFailed {
                reason: "non_finite_value".to_string()
            }
        );
    }
}

// ============================================================================
// Lifecycle and policy
// ============================================================================

#[tokio::test]
async fn uninitialized_and_closed_collectors_answer_unavailable() {
    let registry = tasks_registry();

    let collector = InMemoryCollector::new(Arc::clone(&registry));
    let handler = MetricsHandler::new(Arc::clone(&registry), collector);
    let reply = record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email"), ("status", "ok")]),
            value: 1.0,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "collector_unavailable".to_string()
        }
    );

    let collector = InMemoryCollector::active(Arc::clone(&registry));
    collector.close();
    let handler = MetricsHandler::new(registry, collector);
    let reply = record(
        &handler,
        Effect::QueryMetrics {
            metric_name: "tasks_total".to_string(),
            labels: None,
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::QueryFailure {
            reason: "collector_unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn reset_is_policy_gated_and_clears_series_when_allowed() {
    let registry = tasks_registry();
    let handler = MetricsHandler::new(
        Arc::clone(&registry),
        InMemoryCollector::active(Arc::clone(&registry)),
    );

    // Disabled by default.
    let reply = record(&handler, Effect::ResetMetrics).await;
    assert_eq!(
        reply,
        Reply::MetricRecordingFailed {
            reason: "reset_disabled".to_string()
        }
    );

    // Enabled by configuration.
    let config = MetricsConfig { allow_reset: true };
    let handler = MetricsHandler::new(
        Arc::clone(&registry),
        InMemoryCollector::active(Arc::clone(&registry)),
    )
    .with_config(&config);

    record(
        &handler,
        Effect::IncrementCounter {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[("task_type", "email"), ("status", "ok")]),
            value: 5.0,
        },
    )
    .await;
    let reply = record(&handler, Effect::ResetMetrics).await;
    assert!(matches!(reply, Reply::MetricRecorded { .. }));

    let reply = record(
        &handler,
        Effect::QueryMetrics {
            metric_name: "tasks_total".to_string(),
            labels: None,
        },
    )
    .await;
    let Reply::QuerySuccess { metrics, .. } = reply else {
        panic!("expected query success");
    };
    assert!(metrics.is_empty());
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn query_returns_fully_rendered_series_names() {
    let handler = metrics_handler();
    for status in ["ok", "failed"] {
        record(
            &handler,
            Effect::IncrementCounter {
                metric_name: "tasks_total".to_string(),
                labels: labels(&[("task_type", "email"), ("status", status)]),
                value: 2.0,
            },
        )
        .await;
    }

    let reply = record(
        &handler,
        Effect::QueryMetrics {
            metric_name: "tasks_total".to_string(),
            labels: None,
        },
    )
    .await;
    let Reply::QuerySuccess { metrics, .. } = reply else {
        panic!("expected query success");
    };
    assert_eq!(
        metrics.get("tasks_total{status=\"ok\",task_type=\"email\"}"),
        Some(&2.0)
    );
    assert_eq!(metrics.len(), 2);
}

#[tokio::test]
async fn query_with_bad_label_set_fails_cleanly() {
    let handler = metrics_handler();
    let reply = record(
        &handler,
        Effect::QueryMetrics {
            metric_name: "queue_depth".to_string(),
            labels: Some(labels(&[("wrong", "x")])),
        },
    )
    .await;
    assert_eq!(
        reply,
        Reply::QueryFailure {
            reason: "missing_label: queue".to_string()
        }
    );
}

// ============================================================================
// Metrics never abort a program
// ============================================================================

#[tokio::test]
async fn a_program_of_only_metrics_effects_cannot_fail() {
    let handler = metrics_handler();

    // A deliberately abusive mix: wrong names, wrong kinds, bad labels, bad
    // values. Every one must come back as a reply.
    let program = Program::perform(Effect::IncrementCounter {
        metric_name: "tasks_total".to_string(),
        labels: labels(&[("task_type", "email")]),
        value: 1.0,
    })
    .and_then(|_| {
        Program::perform(Effect::RecordGauge {
            metric_name: "tasks_total".to_string(),
            labels: labels(&[]),
            value: f64::NAN,
        })
    })
    .and_then(|_| {
        Program::perform(Effect::ObserveHistogram {
            metric_name: "task_duration_seconds".to_string(),
            labels: labels(&[("task_type", "email")]),
            value: 0.3,
        })
    })
    .and_then(|_| {
        Program::perform(Effect::QueryMetrics {
            metric_name: "ghost".to_string(),
            labels: None,
        })
    })
    .and_then(|_| Program::perform(Effect::ResetMetrics))
    .map(|_| "survived");

    let result = run_program(program, &handler).await;
    assert_eq!(result, Outcome::Ok("survived"));
}

// ============================================================================
// Exposition format
// ============================================================================

#[tokio::test]
async fn exposition_covers_all_kinds_with_inf_bucket() {
    let registry = tasks_registry();
    let collector = InMemoryCollector::active(Arc::clone(&registry));

    collector
        .record(
            MetricKind::Counter,
            "tasks_total",
            &labels(&[("task_type", "email"), ("status", "ok")]),
            3.0,
        )
        .await
        .unwrap();
    collector
        .record(
            MetricKind::Gauge,
            "queue_depth",
            &labels(&[("queue", "default")]),
            7.0,
        )
        .await
        .unwrap();
    for value in [0.125, 0.5, 8.0] {
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
    collector
        .record(
            MetricKind::Summary,
            "payload_bytes",
            &labels(&[("topic", "events")]),
            512.0,
        )
        .await
        .unwrap();

    let text = render_prometheus(&collector);

    assert!(text.contains("# TYPE tasks_total counter"));
    assert!(text.contains("# TYPE queue_depth gauge"));
    assert!(text.contains("# TYPE task_duration_seconds histogram"));
    assert!(text.contains("# TYPE payload_bytes summary"));
    assert!(text.contains("tasks_total{status=\"ok\",task_type=\"email\"} 3"));
    assert!(text.contains("task_duration_seconds_bucket{task_type=\"email\",le=\"+Inf\"} 3"));
    assert!(text.contains("task_duration_seconds_count{task_type=\"email\"} 3"));
    assert!(text.contains("payload_bytes{topic=\"events\",quantile=\"0.5\"} 512"));
}
