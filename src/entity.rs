//! Metric and annotation entities exchanged with the TSDB service
//!
//! These are the caller-owned values passed into [`crate::tsdb::TsdbService`].
//! The service only reads them on the write path and constructs fresh
//! [`Metric`]s for query results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized tag mapping, sorted by key
///
/// Everything handed to storage goes through this type so that identical
/// tag sets always produce the same series key.
pub type Tags = BTreeMap<String, String>;

/// Tag keys reserved for metric metadata stored alongside user tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedField {
    /// Human-readable name of the metric
    DisplayName,

    /// Units of the datapoint values
    Units,
}

impl ReservedField {
    /// The tag key this field is stored under
    pub fn tag_key(self) -> &'static str {
        match self {
            ReservedField::DisplayName => "DISPLAY_NAME",
            ReservedField::Units => "UNITS",
        }
    }
}

impl fmt::Display for ReservedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag_key())
    }
}

/// A named time series with its datapoints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metric {
    /// Scope the metric belongs to (e.g. "sys")
    pub scope: String,

    /// Metric name within the scope (e.g. "cpu")
    pub metric: String,

    /// User tags, order is irrelevant
    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Datapoints keyed by epoch milliseconds
    #[serde(default)]
    pub datapoints: BTreeMap<i64, String>,
}

impl Metric {
    pub fn new(scope: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            metric: metric.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_datapoint(mut self, timestamp: i64, value: impl Into<String>) -> Self {
        self.datapoints.insert(timestamp, value.into());
        self
    }

    /// Merge datapoints into this metric, replacing values at existing timestamps
    pub fn add_datapoints(&mut self, datapoints: impl IntoIterator<Item = (i64, String)>) {
        self.datapoints.extend(datapoints);
    }

    /// Tags sorted by key
    pub fn sorted_tags(&self) -> Tags {
        self.tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{} ({} datapoints)",
            self.scope,
            self.metric,
            TagDisplay(&self.sorted_tags()),
            self.datapoints.len()
        )
    }
}

/// A read request for one metric over an inclusive time range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricQuery {
    pub scope: String,
    pub metric: String,

    /// Tag filter, a series matches when it carries all of these pairs
    #[serde(default)]
    pub tags: Tags,

    /// Start of the range in epoch milliseconds (inclusive)
    pub start_timestamp: i64,

    /// End of the range in epoch milliseconds (inclusive)
    pub end_timestamp: i64,
}

impl MetricQuery {
    pub fn new(
        scope: impl Into<String>,
        metric: impl Into<String>,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Self {
        Self {
            scope: scope.into(),
            metric: metric.into(),
            tags: Tags::new(),
            start_timestamp,
            end_timestamp,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for MetricQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}{}",
            self.start_timestamp,
            self.end_timestamp,
            self.scope,
            self.metric,
            TagDisplay(&self.tags)
        )
    }
}

/// An event marker attached to a metric
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub scope: String,
    pub metric: String,
    pub source: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// A read request for annotations over an inclusive time range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationQuery {
    pub scope: String,
    pub metric: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Tags,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
}

struct TagDisplay<'a>(&'a Tags);

impl fmt::Display for TagDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, "}}")
    }
}
