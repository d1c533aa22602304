// 🗂️ Record Model - Canonical company data
//
// A Record is the known-good version of one company:
//   identity (Company Name) + Industry + Location + a FIXED set of metrics.
//
// The numeric type of every metric is decided by METRICS, never by the
// contents of the row being read.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// FIELD NAMES
// ============================================================================

/// Identity column; also the identity field the extractor must produce.
pub const COMPANY_NAME: &str = "Company Name";
pub const INDUSTRY: &str = "Industry";
pub const LOCATION: &str = "Location";

/// Flat field name → value, as produced by the extractor and by
/// [`Record::to_fields`]. Iterates (and serializes) in field-name order,
/// whatever order the extractor produced.
pub type FieldMap = BTreeMap<String, FieldValue>;

// ============================================================================
// METRIC SCHEMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Integer,
    Float,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Integer => "integer",
            MetricKind::Float => "float",
        }
    }

    /// Parse a raw cell into this kind. Surrounding whitespace is ignored.
    pub fn parse(&self, column: &str, raw: &str) -> Result<MetricValue, RecordError> {
        let trimmed = raw.trim();
        let invalid = || RecordError::InvalidNumber {
            column: column.to_string(),
            value: raw.to_string(),
            expected: self.as_str(),
        };

        match self {
            MetricKind::Integer => trimmed
                .parse::<i64>()
                .map(MetricValue::Integer)
                .map_err(|_| invalid()),
            MetricKind::Float => trimmed
                .parse::<f64>()
                .map(MetricValue::Float)
                .map_err(|_| invalid()),
        }
    }

    fn zero(&self) -> MetricValue {
        match self {
            MetricKind::Integer => MetricValue::Integer(0),
            MetricKind::Float => MetricValue::Float(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub name: &'static str,
    pub kind: MetricKind,
    /// Optional metrics default to zero when the column is absent or blank
    pub required: bool,
}

const fn metric(name: &'static str, kind: MetricKind, required: bool) -> MetricSpec {
    MetricSpec { name, kind, required }
}

/// Every Record carries exactly these metrics, in this order.
pub static METRICS: [MetricSpec; 15] = [
    metric("Market Capitalization", MetricKind::Integer, true),
    metric("Revenue (in millions)", MetricKind::Float, true),
    metric("EBITDA (in millions)", MetricKind::Float, true),
    metric("Net Income (in millions)", MetricKind::Float, true),
    metric("Debt (in millions)", MetricKind::Float, true),
    metric("Equity (in millions)", MetricKind::Float, true),
    metric("Enterprise Value (in millions)", MetricKind::Float, true),
    metric("P/E Ratio", MetricKind::Float, true),
    metric("Revenue Growth Rate (%)", MetricKind::Float, true),
    metric("EBITDA Margin (%)", MetricKind::Float, true),
    metric("Net Income Margin (%)", MetricKind::Float, true),
    metric("ROE (Return on Equity) (%)", MetricKind::Float, true),
    metric("ROA (Return on Assets) (%)", MetricKind::Float, true),
    metric("Current Ratio", MetricKind::Float, false),
    metric("Debt to Equity Ratio", MetricKind::Float, true),
];

/// Look up a metric definition by column name.
pub fn metric_spec(name: &str) -> Option<&'static MetricSpec> {
    METRICS.iter().find(|spec| spec.name == name)
}

// ============================================================================
// VALUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Integer(v) => *v as f64,
            MetricValue::Float(v) => *v,
        }
    }
}

/// A single flat field value.
///
/// Equality is value equality: integers and floats compare numerically
/// (`5000 == 5000.0`), text compares exactly, and text never equals a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, FieldValue::Text(_))
    }
}

// Exact: only floats with no fractional part that round-trip to the same i64.
fn int_equals_float(int: i64, float: f64) -> bool {
    const BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63
    float.fract() == 0.0 && float >= -BOUND && float < BOUND && float as i64 == int
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Integer(i), FieldValue::Float(f))
            | (FieldValue::Float(f), FieldValue::Integer(i)) => int_equals_float(*i, *f),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" so 1500.0 and 1500 stay distinguishable
            FieldValue::Float(v) => write!(f, "{:?}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<MetricValue> for FieldValue {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Integer(v) => FieldValue::Integer(v),
            MetricValue::Float(v) => FieldValue::Float(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// Known-good data for one company. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Canonical name, exactly as it appears in the dataset
    pub name: String,

    /// Industry
    pub category: String,

    /// Location
    pub origin: String,

    /// Always the full METRICS set, in schema order
    metrics: Vec<(&'static str, MetricValue)>,
}

impl Record {
    /// Build a Record from one dataset row (column name → raw cell).
    ///
    /// Text columns are kept verbatim. Numeric columns are parsed with the
    /// kind fixed by METRICS; optional metrics that are absent or blank
    /// become zero.
    pub fn from_row(row: &HashMap<String, String>) -> Result<Record, RecordError> {
        let text = |column: &str| -> Result<String, RecordError> {
            row.get(column)
                .cloned()
                .ok_or_else(|| RecordError::MissingColumn {
                    column: column.to_string(),
                })
        };

        let name = text(COMPANY_NAME)?;
        let category = text(INDUSTRY)?;
        let origin = text(LOCATION)?;

        let mut metrics = Vec::with_capacity(METRICS.len());
        for spec in METRICS.iter() {
            let value = match row.get(spec.name) {
                Some(raw) if !spec.required && raw.trim().is_empty() => spec.kind.zero(),
                Some(raw) => spec.kind.parse(spec.name, raw)?,
                None if !spec.required => spec.kind.zero(),
                None => {
                    return Err(RecordError::MissingColumn {
                        column: spec.name.to_string(),
                    })
                }
            };
            metrics.push((spec.name, value));
        }

        Ok(Record {
            name,
            category,
            origin,
            metrics,
        })
    }

    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(metric, _)| *metric == name)
            .map(|(_, value)| *value)
    }

    /// Metrics in schema order
    pub fn metrics(&self) -> impl Iterator<Item = (&'static str, MetricValue)> + '_ {
        self.metrics.iter().copied()
    }

    /// Flat serialized form: identity fields plus every metric, keyed by the
    /// same names the extractor produces.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(COMPANY_NAME.to_string(), FieldValue::from(self.name.as_str()));
        fields.insert(INDUSTRY.to_string(), FieldValue::from(self.category.as_str()));
        fields.insert(LOCATION.to_string(), FieldValue::from(self.origin.as_str()));

        for (name, value) in &self.metrics {
            fields.insert(name.to_string(), FieldValue::from(*value));
        }

        fields
    }
}

// ============================================================================
// TESTS
// ============================================================================
