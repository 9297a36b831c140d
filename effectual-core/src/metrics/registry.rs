//! The immutable metric catalog and its recording validation rules

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four metric kinds the registry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonically increasing total
    Counter,
    /// Point-in-time level
    Gauge,
    /// Bucketed distribution
    Histogram,
    /// Quantile sketch
    Summary,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Histogram => write!(f, "histogram"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Definition of a counter family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDefinition {
    /// Family name, unique across the whole registry
    pub name: String,
    /// Exposition help text
    pub help_text: String,
    /// Fixed label keys, in registration order
    pub label_names: Vec<String>,
}

impl CounterDefinition {
    /// Define a counter family
    pub fn new<I, S>(name: impl Into<String>, help_text: impl Into<String>, label_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            label_names: label_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Definition of a gauge family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeDefinition {
    /// Family name, unique across the whole registry
    pub name: String,
    /// Exposition help text
    pub help_text: String,
    /// Fixed label keys, in registration order
    pub label_names: Vec<String>,
}

impl GaugeDefinition {
    /// Define a gauge family
    pub fn new<I, S>(name: impl Into<String>, help_text: impl Into<String>, label_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            label_names: label_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Definition of a histogram family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramDefinition {
    /// Family name, unique across the whole registry
    pub name: String,
    /// Exposition help text
    pub help_text: String,
    /// Fixed label keys, in registration order
    pub label_names: Vec<String>,
    /// Upper bucket bounds, strictly ascending and finite; the implicit
    /// `+Inf` bucket is added at exposition time
    pub buckets: Vec<f64>,
}

impl HistogramDefinition {
    /// Define a histogram family
    pub fn new<I, S>(
        name: impl Into<String>,
        help_text: impl Into<String>,
        label_names: I,
        buckets: Vec<f64>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            label_names: label_names.into_iter().map(Into::into).collect(),
            buckets,
        }
    }
}

/// Definition of a summary family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDefinition {
    /// Family name, unique across the whole registry
    pub name: String,
    /// Exposition help text
    pub help_text: String,
    /// Fixed label keys, in registration order
    pub label_names: Vec<String>,
    /// Tracked quantiles, strictly ascending, each in the open interval (0, 1)
    pub quantiles: Vec<f64>,
}

impl SummaryDefinition {
    /// Define a summary family
    pub fn new<I, S>(
        name: impl Into<String>,
        help_text: impl Into<String>,
        label_names: I,
        quantiles: Vec<f64>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            label_names: label_names.into_iter().map(Into::into).collect(),
            quantiles,
        }
    }
}

/// A catalog that could not be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Two definitions, of any kind, share a name
    #[error("duplicate metric name across kinds: {name}")]
    DuplicateName {
        /// The colliding name
        name: String,
    },

    /// A definition repeats a label key
    #[error("duplicate label {label} on metric {name}")]
    DuplicateLabel {
        /// The metric being defined
        name: String,
        /// The repeated label key
        label: String,
    },

    /// Histogram buckets must be finite and strictly ascending
    #[error("buckets for histogram {name} are not finite and strictly ascending")]
    InvalidBuckets {
        /// The histogram being defined
        name: String,
    },

    /// Summary quantiles must be strictly ascending within (0, 1)
    #[error("quantiles for summary {name} are not strictly ascending within (0, 1)")]
    InvalidQuantiles {
        /// The summary being defined
        name: String,
    },
}

/// Why a recording attempt was rejected before reaching the collector.
///
/// The `Display` form is the machine-matchable reason carried by
/// [`crate::reply::Reply::MetricRecordingFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The name is not in the registry under any kind
    NotRegistered {
        /// The unknown name
        name: String,
    },
    /// The effect's kind differs from the registered kind
    TypeMismatch,
    /// A registered label key was not supplied
    MissingLabel {
        /// The absent key
        key: String,
    },
    /// A supplied label key is not registered
    UnexpectedLabel {
        /// The surplus key
        key: String,
    },
    /// A supplied label value is the empty string
    EmptyLabelValue {
        /// The offending key
        key: String,
    },
    /// The value is NaN or infinite
    NonFiniteValue,
    /// A counter increment was negative
    NegativeCounterIncrement,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered { name } => write!(f, "metric_not_registered: {name}"),
            Self::TypeMismatch => write!(f, "type_mismatch"),
            Self::MissingLabel { key } => write!(f, "missing_label: {key}"),
            Self::UnexpectedLabel { key } => write!(f, "unexpected_label: {key}"),
            Self::EmptyLabelValue { key } => write!(f, "empty_label_value: {key}"),
            Self::NonFiniteValue => write!(f, "non_finite_value"),
            Self::NegativeCounterIncrement => write!(f, "negative_counter_increment"),
        }
    }
}

/// The closed-world catalog of metric families.
///
/// Built once by the embedder, validated at construction, then shared
/// read-only. Lookup is by name; names are unique across all four kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRegistry {
    counters: BTreeMap<String, CounterDefinition>,
    gauges: BTreeMap<String, GaugeDefinition>,
    histograms: BTreeMap<String, HistogramDefinition>,
    summaries: BTreeMap<String, SummaryDefinition>,
}

impl MetricsRegistry {
    /// Build a registry from the four definition lists.
    ///
    /// Rejects duplicate names (across kinds), duplicate label keys,
    /// non-ascending or non-finite buckets, and quantiles outside (0, 1).
    pub fn new(
        counters: Vec<CounterDefinition>,
        gauges: Vec<GaugeDefinition>,
        histograms: Vec<HistogramDefinition>,
        summaries: Vec<SummaryDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut claim = |name: &str| -> Result<(), RegistryError> {
            if !names.insert(name.to_string()) {
                return Err(RegistryError::DuplicateName {
                    name: name.to_string(),
                });
            }
            Ok(())
        };

        for definition in &counters {
            claim(&definition.name)?;
            check_labels(&definition.name, &definition.label_names)?;
        }
        for definition in &gauges {
            claim(&definition.name)?;
            check_labels(&definition.name, &definition.label_names)?;
        }
        for definition in &histograms {
            claim(&definition.name)?;
            check_labels(&definition.name, &definition.label_names)?;
            if !strictly_ascending_finite(&definition.buckets) || definition.buckets.is_empty() {
                return Err(RegistryError::InvalidBuckets {
                    name: definition.name.clone(),
                });
            }
        }
        for definition in &summaries {
            claim(&definition.name)?;
            check_labels(&definition.name, &definition.label_names)?;
            let in_range = definition
                .quantiles
                .iter()
                .all(|q| *q > 0.0 && *q < 1.0);
            if !strictly_ascending_finite(&definition.quantiles)
                || definition.quantiles.is_empty()
                || !in_range
            {
                return Err(RegistryError::InvalidQuantiles {
                    name: definition.name.clone(),
                });
            }
        }

        Ok(Self {
            counters: counters.into_iter().map(|d| (d.name.clone(), d)).collect(),
            gauges: gauges.into_iter().map(|d| (d.name.clone(), d)).collect(),
            histograms: histograms
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
            summaries: summaries
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        })
    }

    /// The registered kind of a name, if any.
    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        if self.counters.contains_key(name) {
            Some(MetricKind::Counter)
        } else if self.gauges.contains_key(name) {
            Some(MetricKind::Gauge)
        } else if self.histograms.contains_key(name) {
            Some(MetricKind::Histogram)
        } else if self.summaries.contains_key(name) {
            Some(MetricKind::Summary)
        } else {
            None
        }
    }

    /// The registered label keys of a name, if any.
    pub fn label_names(&self, name: &str) -> Option<&[String]> {
        self.counters
            .get(name)
            .map(|d| d.label_names.as_slice())
            .or_else(|| self.gauges.get(name).map(|d| d.label_names.as_slice()))
            .or_else(|| self.histograms.get(name).map(|d| d.label_names.as_slice()))
            .or_else(|| self.summaries.get(name).map(|d| d.label_names.as_slice()))
    }

    /// A histogram definition by name.
    pub fn histogram(&self, name: &str) -> Option<&HistogramDefinition> {
        self.histograms.get(name)
    }

    /// A summary definition by name.
    pub fn summary(&self, name: &str) -> Option<&SummaryDefinition> {
        self.summaries.get(name)
    }

    /// All counter definitions, ordered by name.
    pub fn counters(&self) -> impl Iterator<Item = &CounterDefinition> {
        self.counters.values()
    }

    /// All gauge definitions, ordered by name.
    pub fn gauges(&self) -> impl Iterator<Item = &GaugeDefinition> {
        self.gauges.values()
    }

    /// All histogram definitions, ordered by name.
    pub fn histograms(&self) -> impl Iterator<Item = &HistogramDefinition> {
        self.histograms.values()
    }

    /// All summary definitions, ordered by name.
    pub fn summaries(&self) -> impl Iterator<Item = &SummaryDefinition> {
        self.summaries.values()
    }

    /// Validate one recording attempt, in the pipeline order the contract
    /// fixes: name, kind, label keys, label values, value.
    pub fn validate_record(
        &self,
        kind: MetricKind,
        name: &str,
        labels: &BTreeMap<String, String>,
        value: f64,
    ) -> Result<(), Rejection> {
        let registered = self.kind_of(name).ok_or_else(|| Rejection::NotRegistered {
            name: name.to_string(),
        })?;
        if registered != kind {
            return Err(Rejection::TypeMismatch);
        }

        self.validate_labels(name, labels)?;

        if !value.is_finite() {
            return Err(Rejection::NonFiniteValue);
        }
        if kind == MetricKind::Counter && value < 0.0 {
            return Err(Rejection::NegativeCounterIncrement);
        }
        Ok(())
    }

    /// Validate a query: the name must be registered and the label filter,
    /// when present, must match the registered keys exactly.
    pub fn validate_query(
        &self,
        name: &str,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<(), Rejection> {
        if self.kind_of(name).is_none() {
            return Err(Rejection::NotRegistered {
                name: name.to_string(),
            });
        }
        if let Some(labels) = labels {
            self.validate_labels(name, labels)?;
        }
        Ok(())
    }

    fn validate_labels(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), Rejection> {
        let registered = self
            .label_names(name)
            .expect("label validation runs only for registered names");

        for key in registered {
            if !labels.contains_key(key) {
                return Err(Rejection::MissingLabel { key: key.clone() });
            }
        }
        for key in labels.keys() {
            if !registered.contains(key) {
                return Err(Rejection::UnexpectedLabel { key: key.clone() });
            }
        }
        for (key, value) in labels {
            if value.is_empty() {
                return Err(Rejection::EmptyLabelValue { key: key.clone() });
            }
        }
        Ok(())
    }
}

fn check_labels(name: &str, label_names: &[String]) -> Result<(), RegistryError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for label in label_names {
        if !seen.insert(label.as_str()) {
            return Err(RegistryError::DuplicateLabel {
                name: name.to_string(),
                label: label.clone(),
            });
        }
    }
    Ok(())
}

fn strictly_ascending_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
        && values.windows(2).all(|pair| pair[0] < pair[1])
}
