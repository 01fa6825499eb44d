use crate::constants::{LEFT_SUFFIX, RIGHT_SUFFIX};
use crate::error::{EtlError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Field values read as null, mirroring the usual dataframe CSV defaults.
const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub type Row = Vec<Option<String>>;

/// A record set whose columns are discovered at runtime from CSV headers.
///
/// Cells are kept as text; `None` is a null. Column lookups return `Option`
/// so callers can branch on whether a column exists at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals; empty strings become nulls.
    pub fn from_records(name: &str, headers: &[&str], records: &[&[&str]]) -> Self {
        let mut table = Self::new(name, headers.iter().map(|h| h.to_string()).collect());
        for record in records {
            table.push_row(record.iter().map(|v| parse_field(v)).collect());
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Value at `row` in column `name`; `None` for a null cell or an absent column.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column(name)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Index of a column that the caller cannot proceed without.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| EtlError::JoinKeyMissing {
            column: name.to_string(),
            table: self.name.clone(),
        })
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = std::fs::File::open(path)?;
        Ok(Self::from_reader(file)?.with_name(name))
    }

    /// Parse CSV with a header row. A source without any header is rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(EtlError::NoColumns);
        }

        let mut table = Self::new("", headers);
        for record in rdr.records() {
            let record = record?;
            table.push_row(record.iter().map(parse_field).collect());
        }
        Ok(table)
    }

    /// Write headers and rows, nulls as empty fields. The rows go to a temporary
    /// file beside `path` which then replaces it, so a failed write leaves any
    /// previous file untouched and no partial output behind.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut wtr = csv::Writer::from_writer(tmp.as_file_mut());
            wtr.write_record(&self.headers)?;
            for row in &self.rows {
                wtr.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
            }
            wtr.flush()?;
        }
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Stack tables vertically. The result carries the union of all columns in
    /// order of first appearance; rows from a table lacking a column get nulls.
    pub fn concat(name: &str, tables: Vec<Table>) -> Table {
        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let mut combined = Table::new(name, headers);
        for table in tables {
            let positions: Vec<usize> = table
                .headers
                .iter()
                .map(|h| combined.column(h).unwrap_or_default())
                .collect();
            for row in table.rows {
                let mut out = vec![None; combined.headers.len()];
                for (value, &pos) in row.into_iter().zip(&positions) {
                    out[pos] = value;
                }
                combined.rows.push(out);
            }
        }
        combined
    }

    /// Left join on a single key column present in both tables.
    ///
    /// Every left row is kept: once per matching right row, or once with null
    /// right columns when nothing matches. Null keys never match. Non-key
    /// columns present on both sides are suffixed `_x` (left) and `_y` (right).
    pub fn left_join(&self, right: &Table, key: &str) -> Result<Table> {
        let left_key = self.require_column(key)?;
        let right_key = right.require_column(key)?;

        let right_cols: Vec<usize> = (0..right.headers.len()).filter(|&i| i != right_key).collect();

        let mut headers: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i != left_key && right.headers.iter().any(|r| r == h && r != key) {
                    format!("{h}{LEFT_SUFFIX}")
                } else {
                    h.clone()
                }
            })
            .collect();
        for &i in &right_cols {
            let h = &right.headers[i];
            if self.headers.iter().any(|l| l == h) {
                headers.push(format!("{h}{RIGHT_SUFFIX}"));
            } else {
                headers.push(h.clone());
            }
        }

        let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(k) = row[right_key].as_deref() {
                index.entry(k).or_default().push(i);
            }
        }

        let mut joined = Table::new(self.name.clone(), headers);
        for row in &self.rows {
            let matches = row[left_key].as_deref().and_then(|k| index.get(k));
            match matches {
                Some(hits) => {
                    for &hit in hits {
                        let mut out = row.clone();
                        out.extend(right_cols.iter().map(|&i| right.rows[hit][i].clone()));
                        joined.rows.push(out);
                    }
                }
                None => {
                    let mut out = row.clone();
                    out.extend(std::iter::repeat(None).take(right_cols.len()));
                    joined.rows.push(out);
                }
            }
        }
        Ok(joined)
    }

    /// Rows whose `column` equals `value` exactly, or `None` if the column is absent.
    pub fn filter_eq(&self, column: &str, value: &str) -> Option<Table> {
        let idx = self.column(column)?;
        let rows = self
            .rows
            .iter()
            .filter(|row| row[idx].as_deref() == Some(value))
            .cloned()
            .collect();
        Some(Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        })
    }
}

fn parse_field(raw: &str) -> Option<String> {
    if NULL_MARKERS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}
