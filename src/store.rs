// 🏦 Entity Store - Reference dataset + identity lookups
//
// Holds every known company as name → Record, built in one shot from a CSV
// dataset. Lookups never see a half-built store:
//
//   load:   read + parse everything  →  swap the snapshot under a write lock
//   lookup: clone the snapshot Arc    →  search without holding any lock
//
// A failed load leaves the store UNLOADED (no stale data, no partial data).

use crate::error::StoreError;
use crate::record::{Record, COMPANY_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Identity normalization: drop every whitespace character.
///
/// No case folding, no punctuation stripping: "Example Co" and "ExampleCo"
/// collide, "EXAMPLECO" does not.
pub fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Name matched a stored name byte for byte
    Exact,
    /// Name matched only after whitespace removal
    Normalized,
}

/// Outcome of [`EntityStore::resolve`]. Every caller has to handle all three.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found { record: Arc<Record>, kind: MatchKind },
    NotFound,
    Unloaded,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    pub fn record(&self) -> Option<&Arc<Record>> {
        match self {
            Resolution::Found { record, .. } => Some(record),
            _ => None,
        }
    }

    /// `Unloaded` becomes an error, `NotFound` becomes `Ok(None)`.
    pub fn into_result(self) -> Result<Option<Arc<Record>>, StoreError> {
        match self {
            Resolution::Found { record, .. } => Ok(Some(record)),
            Resolution::NotFound => Ok(None),
            Resolution::Unloaded => Err(StoreError::Unloaded),
        }
    }
}

// ============================================================================
// LOAD SUMMARY / STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Path or label of the dataset
    pub source: String,

    /// Distinct canonical names loaded
    pub records: usize,

    /// SHA-256 of the raw dataset bytes
    pub fingerprint: String,

    /// Groups of distinct names that collapse to the same normalized form.
    /// Normalized lookups return the first name of each group.
    pub ambiguous: Vec<Vec<String>>,

    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LoadSummary>,
}

// ============================================================================
// DATASET (immutable snapshot)
// ============================================================================

struct Dataset {
    /// Insertion order of first appearance
    records: Vec<Arc<Record>>,

    /// normalize_name(records[i].name), precomputed at load
    normalized: Vec<String>,

    /// Canonical name → position in `records`
    index: HashMap<String, usize>,

    summary: LoadSummary,
}

impl Dataset {
    fn from_bytes(bytes: &[u8], label: &str) -> Result<Dataset, StoreError> {
        let csv_error = |source: csv::Error| StoreError::Csv {
            label: label.to_string(),
            source,
        };

        let mut rdr = csv::Reader::from_reader(bytes);
        let headers = rdr.headers().map_err(csv_error)?.clone();

        let mut records: Vec<Arc<Record>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for result in rdr.records() {
            let row = result.map_err(csv_error)?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();

            let cells: HashMap<String, String> = headers
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .collect();

            let record = Record::from_row(&cells).map_err(|source| StoreError::InvalidRow {
                label: label.to_string(),
                line,
                source,
            })?;

            // Same semantics as re-inserting into an insertion-ordered map:
            // last values win, first position is kept.
            match index.get(&record.name) {
                Some(&position) => {
                    warn!(
                        source = label,
                        line,
                        name = %record.name,
                        "Duplicate {} in dataset, later row replaces earlier one",
                        COMPANY_NAME
                    );
                    records[position] = Arc::new(record);
                }
                None => {
                    index.insert(record.name.clone(), records.len());
                    records.push(Arc::new(record));
                }
            }
        }

        let normalized: Vec<String> = records.iter().map(|r| normalize_name(&r.name)).collect();
        let ambiguous = find_ambiguous(&records, &normalized);

        for group in &ambiguous {
            warn!(
                source = label,
                names = ?group,
                "Names collapse to the same normalized form, normalized lookups return {:?}",
                group[0]
            );
        }

        let fingerprint = format!("{:x}", Sha256::digest(bytes));

        Ok(Dataset {
            summary: LoadSummary {
                source: label.to_string(),
                records: records.len(),
                fingerprint,
                ambiguous,
                loaded_at: Utc::now(),
            },
            records,
            normalized,
            index,
        })
    }

    fn exact(&self, name: &str) -> Option<Arc<Record>> {
        self.index.get(name).map(|&i| Arc::clone(&self.records[i]))
    }

    /// First record (in insertion order) whose normalized name matches.
    fn normalized(&self, name: &str) -> Option<Arc<Record>> {
        let target = normalize_name(name);
        self.normalized
            .iter()
            .position(|candidate| *candidate == target)
            .map(|i| Arc::clone(&self.records[i]))
    }
}

/// Groups of names sharing a normalized form, ordered by first appearance.
fn find_ambiguous(records: &[Arc<Record>], normalized: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut group_of: HashMap<&str, usize> = HashMap::new();

    for (record, key) in records.iter().zip(normalized) {
        match group_of.get(key.as_str()) {
            Some(&g) => groups[g].push(record.name.clone()),
            None => {
                group_of.insert(key.as_str(), groups.len());
                groups.push(vec![record.name.clone()]);
            }
        }
    }

    groups.into_iter().filter(|g| g.len() > 1).collect()
}

// ============================================================================
// ENTITY STORE
// ============================================================================

/// Shared, read-mostly store of known companies.
///
/// Construct once at startup, share as `Arc<EntityStore>`. The only mutation
/// is an atomic snapshot swap performed by `load*` / `reload`.
pub struct EntityStore {
    source: Option<PathBuf>,
    snapshot: RwLock<Option<Arc<Dataset>>>,
}

impl EntityStore {
    /// Unloaded store with no configured source
    pub fn new() -> Self {
        EntityStore {
            source: None,
            snapshot: RwLock::new(None),
        }
    }

    /// Unloaded store that reads `path` on [`load`](Self::load) / [`reload`](Self::reload)
    pub fn with_source(path: impl Into<PathBuf>) -> Self {
        EntityStore {
            source: Some(path.into()),
            snapshot: RwLock::new(None),
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Load the configured source.
    pub fn load(&self) -> Result<LoadSummary, StoreError> {
        match &self.source {
            Some(path) => self.load_path(path),
            None => self.install(Err(StoreError::NoSource)),
        }
    }

    /// Same as [`load`](Self::load); named for call sites that refresh a
    /// running store.
    pub fn reload(&self) -> Result<LoadSummary, StoreError> {
        info!("Reloading entity store");
        self.load()
    }

    /// Load a dataset file. All-or-nothing.
    pub fn load_path(&self, path: &Path) -> Result<LoadSummary, StoreError> {
        let label = path.display().to_string();
        let dataset = std::fs::read(path)
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|bytes| Dataset::from_bytes(&bytes, &label));

        self.install(dataset)
    }

    /// Load a dataset from any reader. All-or-nothing.
    pub fn load_reader<R: Read>(&self, mut reader: R, label: &str) -> Result<LoadSummary, StoreError> {
        let mut bytes = Vec::new();
        let dataset = reader
            .read_to_end(&mut bytes)
            .map_err(|source| StoreError::Io {
                path: PathBuf::from(label),
                source,
            })
            .and_then(|_| Dataset::from_bytes(&bytes, label));

        self.install(dataset)
    }

    fn install(&self, dataset: Result<Dataset, StoreError>) -> Result<LoadSummary, StoreError> {
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);

        match dataset {
            Ok(dataset) => {
                let summary = dataset.summary.clone();
                *slot = Some(Arc::new(dataset));
                info!(
                    source = %summary.source,
                    records = summary.records,
                    fingerprint = %summary.fingerprint,
                    "Entity store loaded"
                );
                Ok(summary)
            }
            Err(err) => {
                *slot = None;
                warn!(error = %err, "Entity store load failed, store is now unloaded");
                Err(err)
            }
        }
    }

    fn snapshot(&self) -> Result<Arc<Dataset>, StoreError> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::Unloaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Number of records (0 when unloaded)
    pub fn len(&self) -> usize {
        self.snapshot().map(|d| d.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> StoreStatus {
        match self.snapshot() {
            Ok(dataset) => StoreStatus {
                loaded: true,
                summary: Some(dataset.summary.clone()),
            },
            Err(_) => StoreStatus {
                loaded: false,
                summary: None,
            },
        }
    }

    /// Canonical names in insertion order
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        let dataset = self.snapshot()?;
        Ok(dataset.records.iter().map(|r| r.name.clone()).collect())
    }

    /// Record stored under exactly `name`.
    pub fn exact_lookup(&self, name: &str) -> Result<Option<Arc<Record>>, StoreError> {
        Ok(self.snapshot()?.exact(name))
    }

    /// First record whose whitespace-free name equals the whitespace-free `name`.
    pub fn normalized_lookup(&self, name: &str) -> Result<Option<Arc<Record>>, StoreError> {
        Ok(self.snapshot()?.normalized(name))
    }

    /// Exact lookup, falling back to normalized lookup.
    ///
    /// Both tiers run against the same snapshot, so a concurrent reload
    /// cannot split them across two datasets.
    pub fn resolve(&self, name: &str) -> Resolution {
        let dataset = match self.snapshot() {
            Ok(dataset) => dataset,
            Err(_) => {
                debug!(name, "Resolve against unloaded store");
                return Resolution::Unloaded;
            }
        };

        if let Some(record) = dataset.exact(name) {
            debug!(name, "Resolved by exact name");
            return Resolution::Found {
                record,
                kind: MatchKind::Exact,
            };
        }

        if let Some(record) = dataset.normalized(name) {
            debug!(name, resolved = %record.name, "Resolved by normalized name");
            return Resolution::Found {
                record,
                kind: MatchKind::Normalized,
            };
        }

        debug!(name, "No matching record");
        Resolution::NotFound
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
