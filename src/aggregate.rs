use crate::error::{EtlError, Result};
use crate::table::Table;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Result of a group-by-sum, with counts of what was left out of the sums.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub table: Table,
    /// Rows excluded because a grouping key was null.
    pub dropped_rows: usize,
    /// Null measure cells that were counted as zero.
    pub null_measures: usize,
}

#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i128),
    Float(f64),
}

impl Sum {
    fn zero(integral: bool) -> Self {
        if integral {
            Sum::Int(0)
        } else {
            Sum::Float(0.0)
        }
    }

    fn add(&mut self, value: Measure) {
        match (self, value) {
            (Sum::Int(acc), Measure::Int(v)) => *acc += i128::from(v),
            (Sum::Float(acc), Measure::Int(v)) => *acc += v as f64,
            (Sum::Float(acc), Measure::Float(v)) => *acc += v,
            // integral columns only ever see integers
            (Sum::Int(acc), Measure::Float(v)) => *acc += v as i128,
        }
    }

    fn render(self) -> String {
        match self {
            Sum::Int(v) => v.to_string(),
            Sum::Float(v) => render_float(v),
        }
    }
}

/// Shortest round-trip text for `v`, with the exponent written as a sign and
/// at least two digits (`1e+16`, `1.5e-07`) the way dataframe CSV output does.
fn render_float(v: f64) -> String {
    let text = format!("{v:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

#[derive(Debug, Clone, Copy)]
enum Measure {
    Int(i64),
    Float(f64),
}

fn parse_measure(column: &str, raw: &str) -> Result<Measure> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(Measure::Int(v));
    }
    trimmed
        .parse::<f64>()
        .map(Measure::Float)
        .map_err(|_| EtlError::AggregationType {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Group `table` by `keys` and sum each of `measures` per group.
///
/// Rows with a null in any key are skipped. Null measures count as zero; any
/// other value that is not a number fails the whole aggregation. Groups come
/// out in ascending key order, comparing a key column numerically when all of
/// its values are numbers.
pub fn group_sum(table: &Table, keys: &[&str], measures: &[&str]) -> Result<Aggregation> {
    let key_idx = keys
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<Vec<_>>>()?;
    let measure_idx = measures
        .iter()
        .map(|m| table.require_column(m))
        .collect::<Result<Vec<_>>>()?;

    // Parse every measure cell up front so a bad value fails regardless of grouping.
    let mut parsed: Vec<Vec<Option<Measure>>> = Vec::with_capacity(table.len());
    let mut integral = vec![true; measures.len()];
    let mut null_measures = 0;
    for row in table.rows() {
        let mut values = Vec::with_capacity(measures.len());
        for (m, &idx) in measure_idx.iter().enumerate() {
            match row[idx].as_deref() {
                Some(raw) => {
                    let value = parse_measure(measures[m], raw)?;
                    if matches!(value, Measure::Float(_)) {
                        integral[m] = false;
                    }
                    values.push(Some(value));
                }
                None => {
                    integral[m] = false;
                    null_measures += 1;
                    values.push(None);
                }
            }
        }
        parsed.push(values);
    }

    let mut order: Vec<Vec<String>> = Vec::new();
    let mut sums: HashMap<Vec<String>, Vec<Sum>> = HashMap::new();
    let mut dropped_rows = 0;
    for (row, values) in table.rows().iter().zip(parsed) {
        let group: Option<Vec<String>> = key_idx.iter().map(|&i| row[i].clone()).collect();
        let Some(group) = group else {
            dropped_rows += 1;
            continue;
        };

        let acc = sums.entry(group.clone()).or_insert_with(|| {
            order.push(group);
            integral.iter().map(|&i| Sum::zero(i)).collect()
        });
        for (sum, value) in acc.iter_mut().zip(values) {
            if let Some(value) = value {
                sum.add(value);
            }
        }
    }

    let numeric_keys: Vec<bool> = (0..keys.len())
        .map(|k| order.iter().all(|g| g[k].trim().parse::<f64>().is_ok()))
        .collect();
    order.sort_by(|a, b| compare_groups(a, b, &numeric_keys));

    let headers = keys.iter().chain(measures).map(|h| h.to_string()).collect();
    let mut out = Table::new(table.name(), headers);
    for group in order {
        let totals = sums.remove(&group).unwrap_or_default();
        let mut row: Vec<Option<String>> = group.into_iter().map(Some).collect();
        row.extend(totals.into_iter().map(|s| Some(s.render())));
        out.push_row(row);
    }

    Ok(Aggregation {
        table: out,
        dropped_rows,
        null_measures,
    })
}

fn compare_groups(a: &[String], b: &[String], numeric: &[bool]) -> Ordering {
    for ((x, y), &is_numeric) in a.iter().zip(b).zip(numeric) {
        let ord = if is_numeric {
            let x: f64 = x.trim().parse().unwrap_or(f64::NAN);
            let y: f64 = y.trim().parse().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        } else {
            x.cmp(y)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
