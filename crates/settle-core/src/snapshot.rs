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

//! Snapshots between pipeline stages.
//!
//! Every stage writes its frame into one SQLite table keyed by the delivery
//! instant (unix seconds, `INTEGER PRIMARY KEY`), so a repeated instant can
//! never be persisted. Observations are stored in long form. Instants with a
//! sub-second part are rejected rather than truncated.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::{Connection, params, params_from_iter};
use settle_types::{Observation, SourceId, Value};
use tracing::{debug, info};

use crate::frame::{Column, Frame};

/// Conventional snapshot names, in pipeline order
pub mod stage {
    pub const OBSERVATIONS: &str = "observations";
    pub const COMBINED: &str = "combined";
    pub const FINAL: &str = "final";
    pub const RESULT: &str = "result";
}

fn table_name(stage: &str) -> Result<String> {
    if stage.is_empty()
        || !stage
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("Invalid snapshot name '{stage}'");
    }
    Ok(format!("stage_{stage}"))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn to_unix(instant: DateTime<Utc>) -> Result<i64> {
    if instant.timestamp_subsec_nanos() != 0 {
        bail!("Timestamp {instant} has a sub-second part, snapshots store whole seconds");
    }
    Ok(instant.timestamp())
}

fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .with_context(|| format!("Timestamp {seconds} is out of range"))
}

#[derive(Debug)]
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open snapshot database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Failed to open in-memory database")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                series     TEXT NOT NULL,
                delivery   INTEGER NOT NULL,
                published  INTEGER NOT NULL,
                source     TEXT NOT NULL,
                sequence   INTEGER NOT NULL,
                value      REAL NOT NULL,
                label      TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_observations_series
                ON observations(series, delivery);",
        )
        .context("Failed to initialise snapshot schema")?;
        Ok(Self { conn })
    }

    /// Replace the snapshot of `stage` with `frame`
    pub fn save_frame(&mut self, stage: &str, frame: &Frame) -> Result<()> {
        let table = table_name(stage)?;
        let names: Vec<&str> = frame.column_names().collect();
        let columns_sql: String = names
            .iter()
            .map(|n| format!(", {} REAL", quote(n)))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (delivery_utc INTEGER PRIMARY KEY{columns_sql});"
        ))?;

        {
            let placeholders: String = (1..=names.len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let column_list: String = std::iter::once("delivery_utc".to_owned())
                .chain(names.iter().map(|n| quote(n)))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} ({column_list}) VALUES ({placeholders})"
            ))?;

            let data: Vec<&[Option<f64>]> = names
                .iter()
                .map(|n| frame.require(n))
                .collect::<Result<_, _>>()?;
            for (row, instant) in frame.index().iter().enumerate() {
                let values: Vec<rusqlite::types::Value> = std::iter::once(
                    rusqlite::types::Value::Integer(to_unix(*instant)?),
                )
                .chain(data.iter().map(|c| match c[row] {
                    Some(v) => rusqlite::types::Value::Real(v),
                    None => rusqlite::types::Value::Null,
                }))
                .collect();
                stmt.execute(params_from_iter(values))
                    .with_context(|| format!("Failed to store row {instant} of {stage}"))?;
            }
        }

        tx.commit()?;
        info!(
            "Saved snapshot {} ({} rows, {} columns)",
            stage,
            frame.len(),
            names.len()
        );
        Ok(())
    }

    pub fn load_frame(&self, stage: &str) -> Result<Frame> {
        let table = table_name(stage)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} ORDER BY delivery_utc"))
            .with_context(|| format!("No snapshot named '{stage}', run the previous stage first"))?;

        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .skip(1)
            .map(|n| (*n).to_owned())
            .collect();
        let mut index = Vec::new();
        let mut columns: Vec<Column> = vec![Vec::new(); names.len()];

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            index.push(from_unix(row.get(0)?)?);
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(row.get::<_, Option<f64>>(i + 1)?);
            }
        }

        let columns: BTreeMap<String, Column> = names.into_iter().zip(columns).collect();
        let frame = Frame::from_parts(index, columns)?;
        debug!("Loaded snapshot {} ({} rows)", stage, frame.len());
        Ok(frame)
    }

    pub fn save_observations(&mut self, observations: &[Observation]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM observations", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO observations (series, delivery, published, source, sequence, value, label)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for o in observations {
                let (value, label) = match &o.value {
                    Value::Number(v) => (*v, None),
                    Value::Category { label, code } => (*code as f64, Some(label.as_str())),
                };
                stmt.execute(params![
                    o.series,
                    to_unix(o.delivery)?,
                    to_unix(o.published)?,
                    o.source.as_str(),
                    i64::try_from(o.sequence).context("Sequence number out of range")?,
                    value,
                    label,
                ])?;
            }
        }
        tx.commit()?;
        info!("Saved {} observations", observations.len());
        Ok(())
    }

    pub fn load_observations(&self) -> Result<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            "SELECT series, delivery, published, source, sequence, value, label
             FROM observations ORDER BY rowid",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let value: f64 = row.get(5)?;
            let label: Option<String> = row.get(6)?;
            #[expect(clippy::cast_possible_truncation)]
            let value = match label {
                Some(label) => Value::Category {
                    label,
                    code: value as i64,
                },
                None => Value::Number(value),
            };
            let sequence: i64 = row.get(4)?;
            out.push(
                Observation::new(
                    row.get::<_, String>(0)?,
                    from_unix(row.get(1)?)?,
                    from_unix(row.get(2)?)?,
                    SourceId::new(row.get::<_, String>(3)?),
                    value,
                )
                .with_sequence(u64::try_from(sequence).context("Negative sequence number")?),
            );
        }
        Ok(out)
    }
}

/// Write `frame` as CSV with UTC and local timestamp columns
pub fn export_csv<P: AsRef<Path>>(frame: &Frame, path: P, zone: Tz) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory: {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let names: Vec<&str> = frame.column_names().collect();
    let mut header = vec!["Date_utc", "Date_cet"];
    header.extend(names.iter().copied());
    writer.write_record(&header)?;

    for (row, instant) in frame.index().iter().enumerate() {
        let mut record = vec![
            instant.format("%Y-%m-%d %H:%M:%S").to_string(),
            instant.with_timezone(&zone).format("%Y-%m-%d %H:%M:%S%:z").to_string(),
        ];
        record.extend(
            names
                .iter()
                .map(|n| frame.get(n, row).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("Exported {} rows to {}", frame.len(), path.display());
    Ok(())
}
