// ⚙️ Configuration - Environment (+ optional .env file)
//
//   DATABASE_FILE    CSV reference dataset              (required)
//   ASSETS_PATH      directory holding source documents (optional)
//   RECON_BIND_ADDR  server listen address              (default 0.0.0.0:8000)

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

pub const DATABASE_FILE: &str = "DATABASE_FILE";
pub const ASSETS_PATH: &str = "ASSETS_PATH";
pub const BIND_ADDR: &str = "RECON_BIND_ADDR";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_file: PathBuf,
    pub assets_path: Option<PathBuf>,
    pub bind_addr: String,
}

impl AppConfig {
    /// Read the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(database_file) = get(DATABASE_FILE) else {
            bail!("Environment variable {} must be set", DATABASE_FILE);
        };

        Ok(AppConfig {
            database_file: PathBuf::from(database_file),
            assets_path: get(ASSETS_PATH).map(PathBuf::from),
            bind_addr: get(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    /// Where to find a document: as given if it exists, else under ASSETS_PATH.
    pub fn document_path(&self, name: &Path) -> PathBuf {
        match &self.assets_path {
            Some(assets) if !name.exists() && name.is_relative() => assets.join(name),
            _ => name.to_path_buf(),
        }
    }
}
