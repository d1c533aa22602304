// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use financial_reconciliation::{
    extractor_for, init_tracing, AppConfig, EntityStore, ReconcileError, ReconciliationEngine,
    ReconciliationReport, Resolution,
};

const USAGE: &str = "\
Usage: financial-reconciliation [--db <dataset.csv>] <command>

Commands:
  check <extracted.json|csv>   Reconcile extracted data and print the report
  view  <extracted.json|csv>   Same, in the interactive viewer
  lookup <company name>        Resolve a company name
  list                         List every company in the dataset
";

fn main() -> Result<()> {
    init_tracing();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let db_override = take_flag(&mut args, "--db")?;

    let Some(command) = args.first().cloned() else {
        print!("{}", USAGE);
        return Ok(());
    };
    let rest = args[1..].join(" ");

    match command.as_str() {
        "check" => run_check(db_override, &rest),
        "view" => run_view(db_override, &rest),
        "lookup" => run_lookup(db_override, &rest),
        "list" => run_list(db_override),
        "help" | "--help" | "-h" => {
            print!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Remove `flag <value>` from args, returning the value.
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if i + 1 >= args.len() {
        bail!("{} needs a value", flag);
    }
    let value = args.remove(i + 1);
    args.remove(i);
    Ok(Some(value))
}

/// Config from the environment; `--db` replaces DATABASE_FILE.
fn load_config(db_override: Option<String>) -> Result<AppConfig> {
    match db_override {
        Some(db) => {
            dotenvy::dotenv().ok();
            AppConfig::from_lookup(|key| {
                if key == financial_reconciliation::config::DATABASE_FILE {
                    Some(db.clone())
                } else {
                    env::var(key).ok()
                }
            })
        }
        None => AppConfig::from_env(),
    }
}

fn open_store(config: &AppConfig) -> Result<EntityStore> {
    let store = EntityStore::with_source(&config.database_file);
    let summary = store
        .load()
        .with_context(|| format!("Failed to load dataset {}", config.database_file.display()))?;

    println!(
        "✓ Loaded {} companies from {}",
        summary.records, summary.source
    );
    for group in &summary.ambiguous {
        println!("⚠️  Ambiguous names (first wins): {}", group.join(" | "));
    }

    Ok(store)
}

fn reconcile_document(config: &AppConfig, document: &str) -> Result<ReconciliationReport> {
    if document.is_empty() {
        bail!("Missing document path\n\n{}", USAGE);
    }

    let store = open_store(config)?;
    let path: PathBuf = config.document_path(Path::new(document));
    let extractor = extractor_for(&path)?;
    let extracted = extractor
        .extract(&path)
        .context("Cannot extract data. Invalid file provided.")?;

    let engine = ReconciliationEngine::new();
    match engine.reconcile(&store, extracted) {
        Ok(report) => Ok(report),
        Err(ReconcileError::NotFound(name)) => bail!("❌ No data found for company {}", name),
        Err(err) => Err(err.into()),
    }
}

fn run_check(db_override: Option<String>, document: &str) -> Result<()> {
    let config = load_config(db_override)?;
    let report = reconcile_document(&config, document)?;

    println!("\n⚖️  {}", report.summary());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for (field, comparison) in report.discrepancies.iter() {
        let marker = if comparison.matched { "✓" } else { "✗" };
        println!(
            "{} {:<32} extracted: {:<20} stored: {}",
            marker,
            field,
            comparison.extracted.to_string(),
            comparison.stored
        );
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.is_clean() {
        println!("✅ All {} fields match", report.discrepancies.len());
        Ok(())
    } else {
        let mismatched = report.discrepancies.len() - report.discrepancies.match_count();
        bail!("{} field(s) do not match the stored record", mismatched)
    }
}

#[cfg(feature = "tui")]
fn run_view(db_override: Option<String>, document: &str) -> Result<()> {
    let config = load_config(db_override)?;
    let report = reconcile_document(&config, document)?;

    let mut app = ui::App::new(report);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_view(_db_override: Option<String>, _document: &str) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print the report: financial-reconciliation check <file>");
    std::process::exit(1);
}

fn run_lookup(db_override: Option<String>, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Missing company name\n\n{}", USAGE);
    }

    let config = load_config(db_override)?;
    let store = open_store(&config)?;

    match store.resolve(name) {
        Resolution::Found { record, kind } => {
            println!("\n🏢 {} ({:?} match)", record.name, kind);
            println!("   Industry: {}", record.category);
            println!("   Location: {}", record.origin);
            for (metric, value) in record.metrics() {
                println!("   {:<32} {}", metric, financial_reconciliation::FieldValue::from(value));
            }
            Ok(())
        }
        Resolution::NotFound => bail!("❌ No data found for company {}", name),
        Resolution::Unloaded => bail!("❌ Dataset is not loaded"),
    }
}

fn run_list(db_override: Option<String>) -> Result<()> {
    let config = load_config(db_override)?;
    let store = open_store(&config)?;

    for name in store.names()? {
        println!("  {}", name);
    }

    Ok(())
}
