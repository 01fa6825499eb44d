/// Column and file name constants shared by the pipeline stages.
/// Join and aggregation keys are fixed; they are not part of the configuration.

// Sales extract columns
pub const STORE_ID: &str = "store_id";
pub const SKU: &str = "sku";
pub const SALES_QTY: &str = "sales_qty";
pub const SALES_VALUE: &str = "sales_value";

// Master columns
pub const STATUS: &str = "status";
pub const ELECTRONICS_TYPE: &str = "electronics_type";
pub const CLASSIFICATION: &str = "classification";

/// Only stores whose `status` equals this literal survive the filter.
pub const ACTIVE_STATUS: &str = "Active";

/// Grouping keys, in output column order.
pub const GROUP_KEYS: [&str; 3] = [STORE_ID, ELECTRONICS_TYPE, CLASSIFICATION];

/// Summed measures, in output column order.
pub const MEASURES: [&str; 2] = [SALES_QTY, SALES_VALUE];

// Suffixes applied to overlapping non-key columns on a join
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

// Default locations
pub const DEFAULT_SALES_DIR: &str = "../Sales_Split";
pub const STORE_MASTER_FILE: &str = "store_master.csv";
pub const PRODUCT_MASTER_FILE: &str = "product_master.csv";
pub const OUTPUT_FILE: &str = "aggregated_sales.csv";
pub const LOG_FILE: &str = "etl_process.log";

pub const CSV_EXTENSION: &str = ".csv";
