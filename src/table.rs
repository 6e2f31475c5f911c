//! Header-addressed CSV table. Stages read the previous stage's file,
//! append columns, and write a superset back out.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {:?}", path))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Malformed CSV in {:?}", path))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Table { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value by column name; missing columns read as empty.
    pub fn value(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|idx| self.rows.get(row)?.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn column(&self, name: &str) -> Vec<&str> {
        (0..self.rows.len()).map(|i| self.value(i, name)).collect()
    }

    /// Append a column, or overwrite it if a column of that name exists.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }
}

impl<S: AsRef<str>> FromIterator<Vec<S>> for Table {
    /// First item is the header, the rest are rows.
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        let mut iter = iter.into_iter();
        let headers: Vec<String> = iter
            .next()
            .map(|h| h.iter().map(|s| s.as_ref().to_string()).collect())
            .unwrap_or_default();
        let rows = iter
            .map(|r| {
                let mut row: Vec<String> = r.iter().map(|s| s.as_ref().to_string()).collect();
                row.resize(headers.len(), String::new());
                row
            })
            .collect();
        Table { headers, rows }
    }
}

/// Write typed records under an explicit header, so an empty batch still
/// produces a file with a header line.
pub fn write_records<T: Serialize>(path: &Path, headers: &[&str], records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record(headers)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    Ok(())
}
