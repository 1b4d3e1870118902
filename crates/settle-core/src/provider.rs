// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Settle.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use settle_types::{ProviderConfig, SourceId};
use tracing::debug;

/// Raw tabular dataset as delivered by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse delimited text with a header row
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_owned())
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read record {}", line + 1))?;
            rows.push(record.iter().map(str::to_owned).collect());
        }

        Ok(Self { headers, rows })
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text; short rows read as empty
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }
}

/// Upstream data provider: fetch a named dataset as a table
pub trait DatasetProvider: Send + Sync {
    fn id(&self) -> &SourceId;

    fn fetch(&self, dataset: &str) -> Result<Table>;
}

/// Provider reading datasets mirrored into a local directory
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    id: SourceId,
    root: PathBuf,
    delimiter: u8,
}

impl CsvDirectoryProvider {
    pub fn new<P: AsRef<Path>>(id: SourceId, root: P, delimiter: u8) -> Self {
        Self {
            id,
            root: root.as_ref().to_path_buf(),
            delimiter,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if !config.delimiter.is_ascii() {
            bail!(
                "Provider '{}': delimiter {:?} is not a single-byte character",
                config.id,
                config.delimiter
            );
        }
        let mut buf = [0_u8; 1];
        config.delimiter.encode_utf8(&mut buf);
        Ok(Self::new(
            SourceId::new(config.id.clone()),
            &config.root,
            buf[0],
        ))
    }
}

impl DatasetProvider for CsvDirectoryProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn fetch(&self, dataset: &str) -> Result<Table> {
        let path = self.root.join(dataset);
        debug!("Reading dataset {} from {}", dataset, path.display());
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open dataset at {}", path.display()))?;
        Table::from_reader(file, self.delimiter)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }
}

/// Provider serving tables held in memory
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    id: SourceId,
    tables: HashMap<String, Table>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            tables: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, dataset: impl Into<String>, table: Table) -> Self {
        self.tables.insert(dataset.into(), table);
        self
    }
}

impl DatasetProvider for MemoryProvider {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn fetch(&self, dataset: &str) -> Result<Table> {
        self.tables
            .get(dataset)
            .cloned()
            .with_context(|| format!("Provider '{}' has no dataset '{}'", self.id, dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_table_from_semicolon_csv() {
        let raw = "\u{feff}Doba;Godzina;Cena\n2024-01-01; 1 ;\"123,5\"\n2024-01-01;2\n";
        let table = Table::from_reader(raw.as_bytes(), b';').unwrap();

        assert_eq!(table.headers(), &["Doba", "Godzina", "Cena"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), "1");
        assert_eq!(table.cell(0, 2), "123,5");
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.column_index("Cena"), Some(2));
    }

    #[test]
    fn test_directory_provider_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("prices.csv")).unwrap();
        writeln!(file, "delivery_start,Price").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,101.5").unwrap();

        let provider = CsvDirectoryProvider::from_config(&ProviderConfig {
            id: "jwm".to_owned(),
            root: dir.path().to_path_buf(),
            delimiter: ',',
        })
        .unwrap();

        let table = provider.fetch("prices.csv").unwrap();
        assert_eq!(table.cell(0, 1), "101.5");
        assert!(provider.fetch("missing.csv").is_err());
    }

    #[test]
    fn test_multibyte_delimiter_is_rejected() {
        let err = CsvDirectoryProvider::from_config(&ProviderConfig {
            id: "mc".to_owned(),
            root: PathBuf::from("."),
            delimiter: '§',
        })
        .unwrap_err();
        assert!(err.to_string().contains("single-byte"));
    }
}
