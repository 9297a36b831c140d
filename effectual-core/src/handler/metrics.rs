//! Metrics family: validated recording, queries, and reset
//!
//! Metrics degradation must never cascade into the business program, so this
//! family answers failures with [`Reply::MetricRecordingFailed`] (or
//! [`Reply::QueryFailure`]) instead of the error arm. The only real
//! [`Error::Metrics`] is programmer-level misuse of the machinery itself.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MetricsConfig;
use crate::effect::Effect;
use crate::error::Error;
use crate::handler::HandlerContract;
use crate::metrics::{monotonic_now_seconds, MetricKind, MetricsRegistry};
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Lifecycle of a collector behind a [`MetricsPort`].
///
/// Recording is only possible in `Active` and `Draining`; the other two
/// states answer every effect with `collector_unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Constructed but not yet accepting samples
    Uninitialized,
    /// Accepting samples
    Active,
    /// Flushing before close; still accepting samples
    Draining,
    /// Shut down
    Closed,
}

impl CollectorState {
    /// Whether the collector accepts effects in this state
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Active | Self::Draining)
    }
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Active => write!(f, "active"),
            Self::Draining => write!(f, "draining"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A collector-side failure. Surfaces as a `collector_error: <detail>` reply,
/// never as a program-aborting error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorError {
    /// Backend detail
    pub detail: String,
}

impl CollectorError {
    /// Record a collector failure
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Backend collector the embedder supplies for metrics effects.
///
/// Mutation must be atomic per metric series; the registry shared with the
/// handler is read-only.
#[async_trait]
pub trait MetricsPort: Send + Sync {
    /// Current lifecycle state
    fn state(&self) -> CollectorState;

    /// Record one validated sample
    async fn record(
        &self,
        kind: MetricKind,
        name: &str,
        labels: &BTreeMap<String, String>,
        value: f64,
    ) -> Result<(), CollectorError>;

    /// Current values for a metric, as fully-rendered series names
    async fn query(
        &self,
        name: &str,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<BTreeMap<String, f64>, CollectorError>;

    /// Clear all collected series
    async fn reset(&self) -> Result<(), CollectorError>;
}

/// Specialized handler for the metrics family.
///
/// Every effect is validated against the registry before the port sees it;
/// the validation pipeline order is fixed (name, kind, labels, value).
pub struct MetricsHandler<P> {
    registry: Arc<MetricsRegistry>,
    port: P,
    allow_reset: bool,
}

impl<P: MetricsPort> MetricsHandler<P> {
    const DISPATCHER_NAME: &'static str = "MetricsHandler";

    /// Wrap a collector port with its validation registry.
    ///
    /// Reset stays disabled until opted into; see
    /// [`with_config`](Self::with_config).
    pub fn new(registry: Arc<MetricsRegistry>, port: P) -> Self {
        Self {
            registry,
            port,
            allow_reset: false,
        }
    }

    /// Apply the embedder's metrics policy.
    pub fn with_config(mut self, config: &MetricsConfig) -> Self {
        self.allow_reset = config.allow_reset;
        self
    }

    fn unavailable(&self) -> bool {
        !self.port.state().is_available()
    }
}

#[async_trait]
impl<P: MetricsPort> HandlerContract for MetricsHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        let (kind, name, labels, value) = match effect {
            Effect::IncrementCounter {
                ref metric_name,
                ref labels,
                value,
            } => (MetricKind::Counter, metric_name, labels, value),
            Effect::RecordGauge {
                ref metric_name,
                ref labels,
                value,
            } => (MetricKind::Gauge, metric_name, labels, value),
            Effect::ObserveHistogram {
                ref metric_name,
                ref labels,
                value,
            } => (MetricKind::Histogram, metric_name, labels, value),
            Effect::RecordSummary {
                ref metric_name,
                ref labels,
                value,
            } => (MetricKind::Summary, metric_name, labels, value),

            Effect::QueryMetrics {
                ref metric_name,
                ref labels,
            } => {
                if self.unavailable() {
                    return Outcome::Ok(Reply::QueryFailure {
                        reason: "collector_unavailable".to_string(),
                    });
                }
                if let Err(rejection) = self.registry.validate_query(metric_name, labels.as_ref())
                {
                    return Outcome::Ok(Reply::QueryFailure {
                        reason: rejection.to_string(),
                    });
                }
                return match self.port.query(metric_name, labels.as_ref()).await {
                    Ok(metrics) => Outcome::Ok(Reply::QuerySuccess {
                        metrics,
                        timestamp: monotonic_now_seconds(),
                    }),
                    Err(error) => Outcome::Ok(Reply::QueryFailure {
                        reason: format!("collector_error: {}", error.detail),
                    }),
                };
            }

            Effect::ResetMetrics => {
                if self.unavailable() {
                    return Outcome::Ok(Reply::MetricRecordingFailed {
                        reason: "collector_unavailable".to_string(),
                    });
                }
                if !self.allow_reset {
                    tracing::warn!("metrics reset requested but disabled by policy");
                    return Outcome::Ok(Reply::MetricRecordingFailed {
                        reason: "reset_disabled".to_string(),
                    });
                }
                return match self.port.reset().await {
                    Ok(()) => Outcome::Ok(Reply::MetricRecorded {
                        timestamp: monotonic_now_seconds(),
                    }),
                    Err(error) => Outcome::Ok(Reply::MetricRecordingFailed {
                        reason: format!("collector_error: {}", error.detail),
                    }),
                };
            }

            other => {
                return Outcome::Err(Error::Unhandled {
                    effect: other,
                    dispatcher_name: Self::DISPATCHER_NAME,
                })
            }
        };

        if self.unavailable() {
            return Outcome::Ok(Reply::MetricRecordingFailed {
                reason: "collector_unavailable".to_string(),
            });
        }
        if let Err(rejection) = self.registry.validate_record(kind, name, labels, value) {
            tracing::debug!(metric = %name, kind = %kind, "recording rejected: {rejection}");
            return Outcome::Ok(Reply::MetricRecordingFailed {
                reason: rejection.to_string(),
            });
        }
        match self.port.record(kind, name, labels, value).await {
            Ok(()) => Outcome::Ok(Reply::MetricRecorded {
                timestamp: monotonic_now_seconds(),
            }),
            Err(error) => {
                tracing::warn!(metric = %name, "collector rejected sample: {}", error.detail);
                Outcome::Ok(Reply::MetricRecordingFailed {
                    reason: format!("collector_error: {}", error.detail),
                })
            }
        }
    }
}
