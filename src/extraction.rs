// 📄 Extraction Seam - Documents → flat field maps
//
// Pulling numbers out of a PDF is somebody else's job. Whatever does it
// hands us a FieldMap through this trait; the two implementations here read
// the formats that external extractors already write to disk.

use crate::record::{FieldMap, FieldValue, COMPANY_NAME, INDUSTRY, LOCATION};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Anything that can turn a document into `field name → value`.
pub trait FieldExtractor: Send + Sync {
    /// Extract every field the document provides. Fields the extractor
    /// could not find are simply absent from the map.
    fn extract(&self, file_path: &Path) -> Result<FieldMap>;

    /// Short name for logs and provenance
    fn name(&self) -> &str;
}

// ============================================================================
// JSON EXTRACTOR
// ============================================================================

/// Reads a JSON object: `{"Company Name": "ExampleCo", "P/E Ratio": 25.0}`
pub struct JsonFieldExtractor;

impl JsonFieldExtractor {
    pub fn new() -> Self {
        JsonFieldExtractor
    }
}

impl Default for JsonFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for JsonFieldExtractor {
    fn extract(&self, file_path: &Path) -> Result<FieldMap> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        parse_field_map(&content)
            .with_context(|| format!("Invalid extracted data in {}", file_path.display()))
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Parse a JSON object of field → number | string.
pub fn parse_field_map(json: &str) -> Result<FieldMap> {
    let fields: FieldMap = serde_json::from_str(json)
        .context("Expected a JSON object of field names to numbers or strings")?;
    Ok(fields)
}

// ============================================================================
// KEY/VALUE CSV EXTRACTOR
// ============================================================================

/// Reads a two-column CSV (`Field,Value`) with a header row.
///
/// Identity fields (Company Name, Industry, Location) are always text.
/// Every other value is typed by shape: integer if it parses as one, then
/// float, otherwise text (kept verbatim).
pub struct KeyValueCsvExtractor;

impl KeyValueCsvExtractor {
    pub fn new() -> Self {
        KeyValueCsvExtractor
    }
}

impl Default for KeyValueCsvExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for KeyValueCsvExtractor {
    fn extract(&self, file_path: &Path) -> Result<FieldMap> {
        let mut rdr = csv::Reader::from_path(file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;

        let mut fields = FieldMap::new();
        for result in rdr.records() {
            let row = result.context("Failed to read key/value row")?;
            let (Some(key), Some(value)) = (row.get(0), row.get(1)) else {
                bail!("Expected two columns (field, value), got {}", row.len());
            };
            fields.insert(key.to_string(), infer_value(key, value));
        }

        Ok(fields)
    }

    fn name(&self) -> &str {
        "kv-csv"
    }
}

fn infer_value(field: &str, raw: &str) -> FieldValue {
    if [COMPANY_NAME, INDUSTRY, LOCATION].contains(&field) {
        return FieldValue::Text(raw.to_string());
    }

    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return FieldValue::Integer(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        // "inf" / "NaN" are company names before they are numbers
        if v.is_finite() {
            return FieldValue::Float(v);
        }
    }
    FieldValue::Text(raw.to_string())
}

/// Pick an extractor from the file extension.
pub fn extractor_for(file_path: &Path) -> Result<Box<dyn FieldExtractor>> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => Ok(Box::new(JsonFieldExtractor::new())),
        "csv" => Ok(Box::new(KeyValueCsvExtractor::new())),
        other => bail!(
            "Cannot extract data from {} (unsupported extension '{}')",
            file_path.display(),
            other
        ),
    }
}
