use crate::constants;
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Locations the pipeline reads from and writes to.
///
/// Every field has a default, so an empty TOML file (or no file at all) yields
/// the fixed layout: sales extracts in `../Sales_Split`, masters next to that
/// directory, output and log in the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub sales_dir: PathBuf,
    /// Overrides `<parent of sales_dir>/store_master.csv`.
    pub store_master: Option<PathBuf>,
    /// Overrides `<parent of sales_dir>/product_master.csv`.
    pub product_master: Option<PathBuf>,
    pub output_file: PathBuf,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub file: PathBuf,
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_directive: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            sales_dir: PathBuf::from(constants::DEFAULT_SALES_DIR),
            store_master: None,
            product_master: None,
            output_file: PathBuf::from(constants::OUTPUT_FILE),
            logging: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(constants::LOG_FILE),
            default_directive: "sales_etl=info".to_string(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from a TOML file. Keys absent from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: EtlConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Directory holding the master files: one level above the sales directory.
    fn master_dir(&self) -> PathBuf {
        match self.sales_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from(".."),
        }
    }

    pub fn store_master_path(&self) -> PathBuf {
        self.store_master
            .clone()
            .unwrap_or_else(|| self.master_dir().join(constants::STORE_MASTER_FILE))
    }

    pub fn product_master_path(&self) -> PathBuf {
        self.product_master
            .clone()
            .unwrap_or_else(|| self.master_dir().join(constants::PRODUCT_MASTER_FILE))
    }
}
