// src/table/mod.rs

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::{collections::HashSet, path::Path};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::DatasetSource;

pub mod infer;

use infer::{infer_column, to_value, ColumnType};

pub const DELIMITER: u8 = b';';

/// The whole dataset, typed per column. Built once and never mutated.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// One row of a [`Table`], serialized as a flat object in column order.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Table {
    /// Build a table from a header and raw cell text, inferring column types.
    /// Every row must have exactly one cell per column.
    pub fn from_raw(headers: Vec<String>, raw: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            bail!("no columns to parse");
        }
        for (idx, row) in raw.iter().enumerate() {
            if row.len() != headers.len() {
                bail!(
                    "row {} has {} fields, expected {}",
                    idx,
                    row.len(),
                    headers.len()
                );
            }
        }

        let columns = dedupe_headers(headers);
        let types: Vec<ColumnType> = (0..columns.len())
            .map(|c| infer_column(raw.iter().map(|row| row[c].as_str())))
            .collect();
        let rows = raw
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&types)
                    .map(|(cell, ty)| to_value(cell, *ty))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Parse semicolon-delimited, Latin-1 encoded CSV with a header row.
    pub fn from_latin1_csv(bytes: &[u8]) -> Result<Self> {
        // ISO-8859-1: byte b is U+00b, no remapping of 0x80-0x9F
        let text = encoding_rs::mem::decode_latin1(bytes);

        let mut rdr = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("reading CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut raw = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            raw.push(record.iter().map(str::to_string).collect());
        }

        Self::from_raw(headers, raw)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<Record<'_>> {
        self.rows.get(idx).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }
}

impl Record<'_> {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, v) in self.columns.iter().zip(self.values) {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Blank headers become `Unnamed: <i>`; repeats become `name.1`, `name.2`, ...
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(headers.len());
    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if h.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h
            };
            let mut name = base.clone();
            let mut n = 0;
            while !seen.insert(name.clone()) {
                n += 1;
                name = format!("{}.{}", base, n);
            }
            name
        })
        .collect()
}

/// Load `csv_dir/csv_filename`, fetching it from `url` first if it is not on disk.
///
/// A failed fetch is logged and ignored; the read that follows is what fails.
#[instrument(level = "info", skip(url, csv_dir, source), fields(dir = %csv_dir.display()))]
pub async fn load_table<S>(csv_filename: &str, url: &Url, csv_dir: &Path, source: &S) -> Result<Table>
where
    S: DatasetSource + ?Sized,
{
    let csv_path = csv_dir.join(csv_filename);

    if csv_path.exists() {
        debug!(path = %csv_path.display(), "dataset already present");
    } else {
        info!(url = %url, "dataset missing; fetching");
        if let Err(e) = source.fetch(url, csv_dir).await {
            warn!(error = %e, "dataset fetch failed");
        }
    }

    let bytes = std::fs::read(&csv_path)
        .with_context(|| format!("reading dataset {}", csv_path.display()))?;
    let table = Table::from_latin1_csv(&bytes)
        .with_context(|| format!("parsing dataset {}", csv_path.display()))?;

    info!(rows = table.len(), columns = table.columns().len(), "table loaded");
    Ok(table)
}
