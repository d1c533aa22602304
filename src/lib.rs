// Financial Reconciliation - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod record;
pub mod error;
pub mod store;          // Entity Store - dataset + identity lookups
pub mod reconciliation; // Field-level discrepancy reports
pub mod extraction;     // Extractor seam (documents → field maps)
pub mod config;

// Re-export commonly used types
pub use record::{
    FieldMap, FieldValue, MetricKind, MetricSpec, MetricValue, Record,
    metric_spec, COMPANY_NAME, INDUSTRY, LOCATION, METRICS,
};
pub use error::{RecordError, ReconcileError, StoreError};
pub use store::{
    EntityStore, LoadSummary, MatchKind, Resolution, StoreStatus,
    normalize_name,
};
pub use reconciliation::{
    DiscrepancyReport, FieldComparison, ReconciliationEngine, ReconciliationReport,
    compare_fields,
};
pub use extraction::{
    FieldExtractor, JsonFieldExtractor, KeyValueCsvExtractor,
    extractor_for, parse_field_map,
};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by every binary.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Ignore "already set": tests and embedders may install their own
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
