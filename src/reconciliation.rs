// ⚖️ Reconciliation Engine - Extracted values vs stored values
//
// For every field the extractor produced that the stored Record also knows:
//
//   { extracted, stored, match: extracted == stored }
//
// Fields on only one side are left out on purpose: this is an asymmetric
// check of what the document claims, not a full set difference.
//
// Equality here is EXACT (numbers across int/float, text byte for byte).
// Only identity lookup in the store is whitespace-tolerant.

use crate::error::{ReconcileError, StoreError};
use crate::record::{FieldMap, FieldValue, Record, COMPANY_NAME};
use crate::store::{EntityStore, MatchKind, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

// ============================================================================
// FIELD COMPARISON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub extracted: FieldValue,
    pub stored: FieldValue,
    #[serde(rename = "match")]
    pub matched: bool,
}

// ============================================================================
// DISCREPANCY REPORT
// ============================================================================

/// Field name → comparison. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscrepancyReport {
    fields: BTreeMap<String, FieldComparison>,
}

impl DiscrepancyReport {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&FieldComparison> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldComparison)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (&str, &FieldComparison)> {
        self.iter().filter(|(_, c)| !c.matched)
    }

    pub fn match_count(&self) -> usize {
        self.fields.values().filter(|c| c.matched).count()
    }

    /// True when every compared field matched (vacuously true when empty).
    pub fn all_match(&self) -> bool {
        self.fields.values().all(|c| c.matched)
    }

    pub fn summary(&self) -> String {
        let mismatched: Vec<&str> = self.mismatches().map(|(field, _)| field).collect();
        if mismatched.is_empty() {
            format!("{} fields compared, all match", self.len())
        } else {
            format!(
                "{} fields compared, {} mismatched: {}",
                self.len(),
                mismatched.len(),
                mismatched.join(", ")
            )
        }
    }
}

/// Compare two flat maps. Only keys present in both are reported.
///
/// Swapping the arguments swaps `extracted`/`stored` in every entry and
/// leaves every `matched` flag unchanged.
pub fn compare_fields(extracted: &FieldMap, stored: &FieldMap) -> DiscrepancyReport {
    let fields = extracted
        .iter()
        .filter_map(|(key, extracted_value)| {
            stored.get(key).map(|stored_value| {
                (
                    key.clone(),
                    FieldComparison {
                        extracted: extracted_value.clone(),
                        stored: stored_value.clone(),
                        matched: extracted_value == stored_value,
                    },
                )
            })
        })
        .collect();

    DiscrepancyReport { fields }
}

// ============================================================================
// RECONCILIATION REPORT (what callers serialize)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub report_id: uuid::Uuid,
    pub reconciled_at: chrono::DateTime<chrono::Utc>,

    /// Identity as it appeared in the extracted data
    pub company_name: String,

    /// Canonical name of the Record it resolved to
    pub resolved_name: String,
    pub match_kind: MatchKind,

    pub extracted_data: FieldMap,
    pub stored_data: FieldMap,
    pub discrepancies: DiscrepancyReport,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.all_match()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation for {} (resolved to {}, {:?} match): {}",
            self.company_name,
            self.resolved_name,
            self.match_kind,
            self.discrepancies.summary()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Extracted field holding the company identity (default: "Company Name")
    pub identity_field: String,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            identity_field: COMPANY_NAME.to_string(),
        }
    }

    pub fn with_identity_field(identity_field: impl Into<String>) -> Self {
        ReconciliationEngine {
            identity_field: identity_field.into(),
        }
    }

    /// Compare extracted values against one stored Record. Pure; never fails.
    pub fn compare(&self, extracted: &FieldMap, stored: &Record) -> DiscrepancyReport {
        compare_fields(extracted, &stored.to_fields())
    }

    /// Resolve the extracted identity in `store`, then compare.
    ///
    /// Example:
    /// ```
    /// use financial_reconciliation::{EntityStore, FieldMap, FieldValue, ReconciliationEngine};
    ///
    /// let csv = "Company Name,Industry,Location,Market Capitalization,Revenue (in millions),\
    /// EBITDA (in millions),Net Income (in millions),Debt (in millions),Equity (in millions),\
    /// Enterprise Value (in millions),P/E Ratio,Revenue Growth Rate (%),EBITDA Margin (%),\
    /// Net Income Margin (%),ROE (Return on Equity) (%),ROA (Return on Assets) (%),\
    /// Debt to Equity Ratio\n\
    /// ExampleCo,Tech,Berlin,5000,1500,500,200,300,2000,5200,25,10,33.33,13.33,10,5,0.15\n";
    ///
    /// let store = EntityStore::new();
    /// store.load_reader(csv.as_bytes(), "inline").unwrap();
    ///
    /// let mut extracted = FieldMap::new();
    /// extracted.insert("Company Name".into(), FieldValue::from("Example Co"));
    /// extracted.insert("Market Capitalization".into(), FieldValue::Integer(5000));
    ///
    /// let report = ReconciliationEngine::new().reconcile(&store, extracted).unwrap();
    /// assert_eq!(report.resolved_name, "ExampleCo");
    /// assert!(report.discrepancies.get("Market Capitalization").unwrap().matched);
    /// ```
    pub fn reconcile(
        &self,
        store: &EntityStore,
        extracted: FieldMap,
    ) -> Result<ReconciliationReport, ReconcileError> {
        if extracted.is_empty() {
            return Err(ReconcileError::EmptyExtraction);
        }

        let company_name = match extracted.get(&self.identity_field) {
            Some(FieldValue::Text(name)) => name.clone(),
            Some(other) => {
                return Err(ReconcileError::InvalidIdentity {
                    field: self.identity_field.clone(),
                    value: other.to_string(),
                })
            }
            None => return Err(ReconcileError::MissingIdentity(self.identity_field.clone())),
        };

        let (record, match_kind) = match store.resolve(&company_name) {
            Resolution::Found { record, kind } => (record, kind),
            Resolution::NotFound => {
                warn!(company = %company_name, "No stored record for extracted company");
                return Err(ReconcileError::NotFound(company_name));
            }
            Resolution::Unloaded => return Err(StoreError::Unloaded.into()),
        };

        let stored_data = record.to_fields();
        let discrepancies = compare_fields(&extracted, &stored_data);

        info!(
            company = %company_name,
            resolved = %record.name,
            compared = discrepancies.len(),
            mismatched = discrepancies.len() - discrepancies.match_count(),
            "Reconciled extracted data"
        );

        Ok(ReconciliationReport {
            report_id: uuid::Uuid::new_v4(),
            reconciled_at: chrono::Utc::now(),
            company_name,
            resolved_name: record.name.clone(),
            match_kind,
            extracted_data: extracted,
            stored_data,
            discrepancies,
        })
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
