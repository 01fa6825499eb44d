use crate::aggregate;
use crate::config::EtlConfig;
use crate::constants::{self, ACTIVE_STATUS, GROUP_KEYS, MEASURES, SKU, STATUS, STORE_ID};
use crate::error::{EtlError, Result};
use crate::table::Table;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// Where a run currently is. `Aborted` is reachable from every stage before `Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    Scanning,
    Loading,
    Joining,
    Filtering,
    Aggregating,
    Saved,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Started => "started",
            Stage::Scanning => "scanning",
            Stage::Loading => "loading",
            Stage::Joining => "joining",
            Stage::Filtering => "filtering",
            Stage::Aggregating => "aggregating",
            Stage::Saved => "saved",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stage: Stage,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub files_found: usize,
    pub files_loaded: usize,
    pub sales_rows: usize,
    pub merged_rows: usize,
    pub active_rows: usize,
    pub groups: usize,
    pub output_file: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            stage: Stage::Started,
            failed_stage: None,
            error: None,
            files_found: 0,
            files_loaded: 0,
            sales_rows: 0,
            merged_rows: 0,
            active_rows: 0,
            groups: 0,
            output_file: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Saved
    }
}

/// Sales tables that parsed, concatenated.
#[derive(Debug)]
pub struct LoadedSales {
    pub table: Table,
    pub files_loaded: usize,
}

/// Reference tables joined against the sales data.
#[derive(Debug)]
pub struct Masters {
    pub stores: Table,
    pub products: Table,
}

pub struct EtlPipeline {
    config: EtlConfig,
}

impl EtlPipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run every stage. Failures are logged and recorded in the report; they
    /// never propagate to the caller.
    #[instrument(skip(self), fields(sales_dir = %self.config.sales_dir.display()))]
    pub fn run(&self) -> PipelineReport {
        info!("ETL process started");

        let mut report = PipelineReport::new();
        match self.try_run(&mut report) {
            Ok(()) => {
                info!(
                    "Run complete: {} files, {} sales rows, {} active rows, {} groups",
                    report.files_loaded, report.sales_rows, report.active_rows, report.groups
                );
            }
            Err(e) => {
                if e.is_warning() {
                    warn!("{}. Stopping process.", e);
                } else {
                    error!("Aborted while {}: {}", report.stage, e);
                }
                report.failed_stage = Some(report.stage);
                report.stage = Stage::Aborted;
                report.error = Some(e.to_string());
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    /// The stage sequence; the first error stops it with `report.stage` left at
    /// the stage that failed.
    pub fn try_run(&self, report: &mut PipelineReport) -> Result<()> {
        report.stage = Stage::Scanning;
        let files = scan_sales_dir(&self.config.sales_dir)?;
        report.files_found = files.len();

        report.stage = Stage::Loading;
        let loaded = load_sales_files(&self.config.sales_dir, &files)?;
        report.files_loaded = loaded.files_loaded;
        report.sales_rows = loaded.table.len();

        report.stage = Stage::Joining;
        let masters = load_masters(
            &self.config.store_master_path(),
            &self.config.product_master_path(),
        )?;
        let merged = join_references(&loaded.table, &masters)?;
        report.merged_rows = merged.len();

        report.stage = Stage::Filtering;
        let active = filter_active(merged);
        report.active_rows = active.len();

        report.stage = Stage::Aggregating;
        let aggregated = aggregate_sales(&active)?;
        report.groups = aggregated.len();
        write_output(&aggregated, &self.config.output_file)?;

        report.stage = Stage::Saved;
        report.output_file = Some(self.config.output_file.clone());
        Ok(())
    }
}

/// List the `.csv` entries of `dir`, sorted by name.
pub fn scan_sales_dir(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Err(EtlError::DirectoryNotFound(dir.to_path_buf()));
    }

    let access = |source: std::io::Error| EtlError::DirectoryAccess {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(access)? {
        let entry = entry.map_err(access)?;
        if let Ok(name) = entry.file_name().into_string() {
            if name.ends_with(constants::CSV_EXTENSION) {
                files.push(name);
            }
        }
    }
    files.sort();

    info!("Scanning directory ended");
    info!("Found {} sales files to process", files.len());
    if files.is_empty() {
        return Err(EtlError::NoCsvFilesFound(dir.to_path_buf()));
    }
    Ok(files)
}

/// Read each named file; a file that fails to parse is logged and skipped.
pub fn load_sales_files(dir: &Path, files: &[String]) -> Result<LoadedSales> {
    info!("Reading files ...");
    let mut tables = Vec::with_capacity(files.len());
    for file in files {
        match Table::read_csv(&dir.join(file)) {
            Ok(table) => tables.push(table),
            Err(e) => {
                let e = EtlError::FileParse {
                    file: file.clone(),
                    source: Box::new(e),
                };
                error!("{}", e);
            }
        }
    }

    if tables.is_empty() {
        return Err(EtlError::NoValidData);
    }

    let files_loaded = tables.len();
    let table = Table::concat("sales data", tables);
    info!(
        "Successfully merged {} files. Total sales records: {}",
        files_loaded,
        table.len()
    );
    if !table.is_empty() {
        info!("Validation passed: sales data is not empty. Proceeding to joins.");
    }

    Ok(LoadedSales {
        table,
        files_loaded,
    })
}

/// Load both masters, or neither.
pub fn load_masters(store_path: &Path, product_path: &Path) -> Result<Masters> {
    for path in [store_path, product_path] {
        if !path.is_file() {
            return Err(EtlError::MasterFileMissing {
                path: path.to_path_buf(),
            });
        }
    }

    let stores = Table::read_csv(store_path)?.with_name(constants::STORE_MASTER_FILE);
    let products = Table::read_csv(product_path)?.with_name(constants::PRODUCT_MASTER_FILE);
    info!("Total rows in store master: {}", stores.len());
    info!("Total rows in product master: {}", products.len());

    Ok(Masters { stores, products })
}

/// Sales left-joined to stores on `store_id`, then to products on `sku`.
pub fn join_references(sales: &Table, masters: &Masters) -> Result<Table> {
    let merged = sales.left_join(&masters.stores, STORE_ID)?;
    info!("Joined sales data with store master");
    let merged = merged.left_join(&masters.products, SKU)?;
    info!("Joined sales data with product master");
    Ok(merged.with_name("merged sales data"))
}

/// Keep active stores only. Without a `status` column the table passes through.
pub fn filter_active(merged: Table) -> Table {
    match merged.filter_eq(STATUS, ACTIVE_STATUS) {
        Some(active) => {
            info!("Filtered for active stores: {} of {} rows kept", active.len(), merged.len());
            active
        }
        None => {
            warn!("'{}' column not found. Skipping filter.", STATUS);
            merged
        }
    }
}

pub fn aggregate_sales(active: &Table) -> Result<Table> {
    info!("Aggregating data...");
    let agg = aggregate::group_sum(active, &GROUP_KEYS, &MEASURES)?;
    if agg.dropped_rows > 0 {
        info!("{} rows without a complete grouping key left out", agg.dropped_rows);
    }
    if agg.null_measures > 0 {
        info!("{} null measure values summed as zero", agg.null_measures);
    }
    Ok(agg.table)
}

pub fn write_output(table: &Table, path: &Path) -> Result<()> {
    table.write_csv(path)?;
    info!("SUCCESS. Final output saved as '{}'.", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn masters() -> Masters {
        Masters {
            stores: Table::from_records(
                "store_master.csv",
                &["store_id", "status", "region"],
                &[&["1", "Active", "north"], &["2", "Closed", "south"]],
            ),
            products: Table::from_records(
                "product_master.csv",
                &["sku", "electronics_type", "classification"],
                &[&["A", "TV", "Premium"], &["B", "Audio", "Budget"]],
            ),
        }
    }

    #[test]
    fn scan_lists_only_csv_files_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.csv", "notes.txt", "upper.CSV"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }

        let files = scan_sales_dir(dir.path()).unwrap();

        assert_eq!(files, vec!["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[test]
    fn scan_missing_dir_is_not_found() {
        let dir = tempdir().unwrap();
        let err = scan_sales_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, EtlError::DirectoryNotFound(_)));
    }

    #[test]
    fn scan_without_csv_is_warning() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "hi").unwrap();
        let err = scan_sales_dir(dir.path()).unwrap_err();
        assert!(matches!(err, EtlError::NoCsvFilesFound(_)));
        assert!(err.is_warning());
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.csv"), "store_id,sku\n1,A\n").unwrap();
        fs::write(dir.path().join("empty.csv"), "").unwrap();
        fs::write(dir.path().join("ragged.csv"), "store_id,sku\n1,A,extra\n").unwrap();
        let files = scan_sales_dir(dir.path()).unwrap();

        let loaded = load_sales_files(dir.path(), &files).unwrap();

        assert_eq!(loaded.files_loaded, 1);
        assert_eq!(loaded.table.len(), 1);
    }

    #[test]
    fn all_files_unreadable_is_no_valid_data() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("empty.csv"), "").unwrap();
        let err = load_sales_files(dir.path(), &["empty.csv".to_string()]).unwrap_err();
        assert!(matches!(err, EtlError::NoValidData));
    }

    #[test]
    fn missing_product_master_loads_nothing() {
        let dir = tempdir().unwrap();
        let stores = dir.path().join("store_master.csv");
        fs::write(&stores, "store_id,status\n1,Active\n").unwrap();

        let err = load_masters(&stores, &dir.path().join("product_master.csv")).unwrap_err();

        match err {
            EtlError::MasterFileMissing { path } => assert!(path.ends_with("product_master.csv")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn join_preserves_sales_row_count() {
        let sales = Table::from_records(
            "sales data",
            &["store_id", "sku", "sales_qty", "sales_value"],
            &[
                &["1", "A", "1", "10"],
                &["3", "A", "1", "10"],
                &["2", "Z", "1", "10"],
                &["", "", "1", "10"],
            ],
        );

        let merged = join_references(&sales, &masters()).unwrap();

        assert_eq!(merged.len(), sales.len());
        assert_eq!(merged.value(1, "status"), None);
        assert_eq!(merged.value(2, "electronics_type"), None);
    }

    #[test]
    fn join_without_sku_column_fails() {
        let sales = Table::from_records("sales data", &["store_id", "sales_qty"], &[&["1", "1"]]);
        let err = join_references(&sales, &masters()).unwrap_err();
        match err {
            EtlError::JoinKeyMissing { column, table } => {
                assert_eq!(column, "sku");
                assert_eq!(table, "sales data");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn filter_without_status_passes_everything() {
        let merged = Table::from_records("m", &["store_id"], &[&["1"], &["2"]]);
        let filtered = filter_active(merged.clone());
        assert_eq!(filtered, merged);
    }

    #[test]
    fn filter_is_idempotent() {
        let sales = Table::from_records(
            "sales data",
            &["store_id", "sku", "sales_qty", "sales_value"],
            &[&["1", "A", "1", "10"], &["2", "B", "1", "10"]],
        );
        let once = filter_active(join_references(&sales, &masters()).unwrap());
        let twice = filter_active(once.clone());
        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn worked_example_aggregates_to_one_row() {
        let sales = Table::from_records(
            "sales data",
            &["store_id", "sku", "sales_qty", "sales_value"],
            &[&["1", "A", "2", "20"], &["1", "A", "3", "30"]],
        );

        let active = filter_active(join_references(&sales, &masters()).unwrap());
        let out = aggregate_sales(&active).unwrap();

        assert_eq!(
            out.headers(),
            &["store_id", "electronics_type", "classification", "sales_qty", "sales_value"]
        );
        assert_eq!(out.len(), 1);
        let row: Vec<&str> = out.rows()[0].iter().map(|v| v.as_deref().unwrap_or("")).collect();
        assert_eq!(row, vec!["1", "TV", "Premium", "5", "50"]);
    }

    #[test]
    fn run_reports_abort_stage() {
        let dir = tempdir().unwrap();
        let config = EtlConfig {
            sales_dir: dir.path().join("Sales_Split"),
            output_file: dir.path().join("aggregated_sales.csv"),
            ..EtlConfig::default()
        };

        let report = EtlPipeline::new(config).run();

        assert_eq!(report.stage, Stage::Aborted);
        assert_eq!(report.failed_stage, Some(Stage::Scanning));
        assert!(report.error.is_some());
        assert!(report.finished_at.is_some());
        assert!(!dir.path().join("aggregated_sales.csv").exists());
    }
}
