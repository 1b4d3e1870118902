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

//! Generic source adapter.
//!
//! Every upstream dataset is turned into observations by the same stage,
//! parameterised by a [`DatasetSpec`]: where the delivery instant comes from,
//! how the publication instant is known, and which columns carry which
//! series.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use settle_types::{
    Ambiguity, DatasetSpec, DeliveryAxis, DerivedPublication, Observation, PublicationRule,
    SourceId, Value,
};
use tracing::{debug, info, warn};

use crate::calendar::{self, RepeatedStamp, SlotCalendar};
use crate::provider::Table;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%d.%m.%Y"];

/// Rows dropped while ingesting one table, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub duplicate_rows: usize,
    pub bad_delivery: usize,
    pub slot_out_of_range: usize,
    pub outside_date_range: usize,
    pub bad_publication: usize,
    pub bad_values: usize,
    pub empty_values: usize,
}

impl SkipCounts {
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.duplicate_rows
            + self.bad_delivery
            + self.slot_out_of_range
            + self.outside_date_range
            + self.bad_publication
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub observations: Vec<Observation>,
    pub skipped: SkipCounts,
}

/// Parse a number as written in upstream reports.
///
/// Accepts decimal commas and space (or no-break space) thousand separators.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a UTC timestamp: RFC 3339, or a naive timestamp taken as UTC
pub fn parse_utc(text: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if format.is_none() {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    parse_naive(text, format).map(|naive| naive.and_utc())
}

/// Parse a wall-clock timestamp without zone information
pub fn parse_naive(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let text = text.trim();
    match format {
        Some(fmt) => NaiveDateTime::parse_from_str(text, fmt).ok(),
        None => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok()),
    }
}

pub fn parse_date(text: &str, format: Option<&str>) -> Option<NaiveDate> {
    let text = text.trim();
    match format {
        Some(fmt) => NaiveDate::parse_from_str(text, fmt).ok(),
        None => DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok()),
    }
}

fn parse_index(text: &str) -> Option<usize> {
    let text = text.trim();
    text.parse::<usize>().ok().or_else(|| {
        let value = parse_number(text)?;
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        (value >= 0.0 && value.fract() == 0.0).then_some(value as usize)
    })
}

fn require_column(table: &Table, name: &str, dataset: &str) -> Result<usize> {
    table
        .column_index(name)
        .with_context(|| format!("Dataset '{dataset}' has no column '{name}'"))
}

/// Publication instant implied by the delivery instant
pub fn derive_publication(
    rule: DerivedPublication,
    delivery: DateTime<Utc>,
    zone: Tz,
) -> Result<DateTime<Utc>, calendar::CalendarError> {
    match rule {
        DerivedPublication::DayBeforeAt { time } => {
            let day = calendar::local_date(delivery, zone);
            let before = day
                .checked_sub_days(Days::new(1))
                .ok_or(calendar::CalendarError::DateOutOfRange(day))?;
            calendar::localize(before.and_time(time), zone, Ambiguity::Earlier)
        }
        DerivedPublication::DeliveryPlus { hours } => Ok(delivery + TimeDelta::hours(hours)),
    }
}

/// Turns the rows of one upstream dataset into observations
#[derive(Debug, Clone)]
pub struct SourceAdapter {
    spec: DatasetSpec,
    source: SourceId,
    zone: Tz,
}

impl SourceAdapter {
    #[must_use]
    pub fn new(spec: DatasetSpec, zone: Tz) -> Self {
        let source = SourceId::new(spec.source.clone());
        Self { spec, source, zone }
    }

    #[must_use]
    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    #[must_use]
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Convert `table` into observations.
    ///
    /// Row `i` gets sequence number `first_sequence + i`.
    pub fn ingest(&self, table: &Table, first_sequence: u64) -> Result<AdapterOutput> {
        let dataset = self.spec.dataset.as_str();
        let mut skipped = SkipCounts::default();

        let value_columns = self.value_columns(table)?;
        let keep = self.deduplicate(table, &mut skipped)?;
        let deliveries = self.deliveries(table, &keep, &mut skipped)?;
        let publications = self.publications(table, &deliveries, &mut skipped)?;

        let mut observations = Vec::new();
        for row in 0..table.len() {
            let (Some(delivery), Some(published)) = (deliveries[row], publications[row]) else {
                continue;
            };
            if !self.within_date_range(delivery) {
                skipped.outside_date_range += 1;
                continue;
            }

            let instants: Vec<DateTime<Utc>> = if self.spec.expand_hourly {
                (0..4).map(|q| delivery + TimeDelta::minutes(15 * q)).collect()
            } else {
                vec![delivery]
            };
            let sequence = first_sequence + row as u64;

            for (column, series) in &value_columns {
                let text = table.cell(row, *column);
                if text.trim().is_empty() {
                    skipped.empty_values += 1;
                    continue;
                }
                let Some(value) = self.parse_value(&table.headers()[*column], text) else {
                    skipped.bad_values += 1;
                    continue;
                };
                for instant in &instants {
                    observations.push(
                        Observation::new(
                            series.clone(),
                            *instant,
                            published,
                            self.source.clone(),
                            value.clone(),
                        )
                        .with_sequence(sequence),
                    );
                }
            }
        }

        if skipped.total_rows() > 0 {
            warn!(
                "Dataset {} from {}: dropped {} of {} rows ({:?})",
                dataset,
                self.source,
                skipped.total_rows(),
                table.len(),
                skipped
            );
        }
        info!(
            "Ingested {} observations from {}/{}",
            observations.len(),
            self.source,
            dataset
        );

        Ok(AdapterOutput {
            observations,
            skipped,
        })
    }

    fn value_columns(&self, table: &Table) -> Result<Vec<(usize, String)>> {
        self.spec
            .columns
            .iter()
            .map(|(upstream, series)| {
                Ok((
                    require_column(table, upstream, &self.spec.dataset)?,
                    series.clone(),
                ))
            })
            .collect()
    }

    fn parse_value(&self, column: &str, text: &str) -> Option<Value> {
        match self.spec.categories.get(column) {
            Some(codes) => {
                let label = text.trim();
                codes.get(label).map(|code| Value::Category {
                    label: label.to_owned(),
                    code: *code,
                })
            }
            None => parse_number(text).map(Value::Number),
        }
    }

    fn within_date_range(&self, delivery: DateTime<Utc>) -> bool {
        let day = calendar::local_date(delivery, self.zone);
        self.spec.from_local.is_none_or(|from| day >= from)
            && self.spec.until_local.is_none_or(|until| day < until)
    }

    fn deduplicate(&self, table: &Table, skipped: &mut SkipCounts) -> Result<Vec<bool>> {
        if self.spec.dedup_on.is_empty() {
            return Ok(vec![true; table.len()]);
        }
        let key_columns = self
            .spec
            .dedup_on
            .iter()
            .map(|name| require_column(table, name, &self.spec.dataset))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let keep = (0..table.len())
            .map(|row| {
                let key: Vec<&str> = key_columns.iter().map(|c| table.cell(row, *c)).collect();
                let fresh = seen.insert(key);
                if !fresh {
                    skipped.duplicate_rows += 1;
                }
                fresh
            })
            .collect();
        Ok(keep)
    }

    fn deliveries(
        &self,
        table: &Table,
        keep: &[bool],
        skipped: &mut SkipCounts,
    ) -> Result<Vec<Option<DateTime<Utc>>>> {
        let dataset = self.spec.dataset.as_str();
        let mut out = vec![None; table.len()];

        match &self.spec.delivery {
            DeliveryAxis::UtcColumn { column, format } => {
                let idx = require_column(table, column, dataset)?;
                for row in (0..table.len()).filter(|r| keep[*r]) {
                    out[row] = parse_utc(table.cell(row, idx), format.as_deref());
                    if out[row].is_none() {
                        skipped.bad_delivery += 1;
                    }
                }
            }
            DeliveryAxis::LocalColumn {
                column,
                format,
                ambiguity,
            } => {
                let idx = require_column(table, column, dataset)?;
                let parsed: Vec<(usize, NaiveDateTime)> = (0..table.len())
                    .filter(|r| keep[*r])
                    .filter_map(|row| {
                        let naive = parse_naive(table.cell(row, idx), format.as_deref());
                        if naive.is_none() {
                            skipped.bad_delivery += 1;
                        }
                        naive.map(|n| (row, n))
                    })
                    .collect();
                let repeated = RepeatedStamp::NextOccurrence;
                for (row, instant) in self.localize_rows(&parsed, *ambiguity, repeated)? {
                    out[row] = Some(instant);
                }
            }
            DeliveryAxis::LocalSlots {
                date_column,
                date_format,
                granularity,
                index_column,
                index_base,
                group_by,
            } => {
                let date_idx = require_column(table, date_column, dataset)?;
                let slot_idx = index_column
                    .as_deref()
                    .map(|c| require_column(table, c, dataset))
                    .transpose()?;
                let group_idx = group_by
                    .iter()
                    .map(|c| require_column(table, c, dataset))
                    .collect::<Result<Vec<_>>>()?;

                let mut slots = SlotCalendar::new(self.zone, *granularity);
                let mut counters: HashMap<(NaiveDate, Vec<&str>), usize> = HashMap::new();

                for row in (0..table.len()).filter(|r| keep[*r]) {
                    let Some(date) = parse_date(table.cell(row, date_idx), date_format.as_deref())
                    else {
                        skipped.bad_delivery += 1;
                        continue;
                    };
                    let index = match slot_idx {
                        Some(col) => {
                            parse_index(table.cell(row, col)).and_then(|i| i.checked_sub(*index_base))
                        }
                        None => {
                            let group = group_idx.iter().map(|c| table.cell(row, *c)).collect();
                            let counter = counters.entry((date, group)).or_insert(0);
                            let index = *counter;
                            *counter += 1;
                            Some(index)
                        }
                    };
                    let Some(index) = index else {
                        skipped.bad_delivery += 1;
                        continue;
                    };
                    match slots.lookup(date, index)? {
                        Some(instant) => out[row] = Some(instant),
                        None => skipped.slot_out_of_range += 1,
                    }
                }
            }
        }

        if skipped.slot_out_of_range > 0 {
            warn!(
                "Dataset {}: {} rows had a slot index beyond the length of their day",
                dataset, skipped.slot_out_of_range
            );
        }
        Ok(out)
    }

    fn publications(
        &self,
        table: &Table,
        deliveries: &[Option<DateTime<Utc>>],
        skipped: &mut SkipCounts,
    ) -> Result<Vec<Option<DateTime<Utc>>>> {
        let dataset = self.spec.dataset.as_str();
        let fallback = self.spec.publication.derived();
        let mut out = vec![None; table.len()];
        let rows = (0..table.len()).filter(|r| deliveries[*r].is_some());

        match &self.spec.publication {
            PublicationRule::UtcColumn { column, format, .. } => {
                let idx = require_column(table, column, dataset)?;
                for row in rows {
                    let text = table.cell(row, idx);
                    out[row] = if text.trim().is_empty() {
                        None
                    } else {
                        parse_utc(text, format.as_deref())
                    };
                }
            }
            PublicationRule::LocalColumn {
                column,
                format,
                ambiguity,
                ..
            } => {
                let idx = require_column(table, column, dataset)?;
                let parsed: Vec<(usize, NaiveDateTime)> = rows
                    .filter_map(|row| {
                        parse_naive(table.cell(row, idx), format.as_deref()).map(|n| (row, n))
                    })
                    .collect();
                let repeated = RepeatedStamp::SameInstant;
                for (row, instant) in self.localize_rows(&parsed, *ambiguity, repeated)? {
                    out[row] = Some(instant);
                }
            }
            PublicationRule::DayBeforeAt { .. } | PublicationRule::DeliveryPlus { .. } => {}
        }

        for row in 0..table.len() {
            let Some(delivery) = deliveries[row] else {
                continue;
            };
            if out[row].is_some() {
                continue;
            }
            match fallback {
                Some(rule) => out[row] = Some(derive_publication(rule, delivery, self.zone)?),
                None => skipped.bad_publication += 1,
            }
        }

        debug!(
            "Dataset {}: {} rows without a usable publication instant",
            dataset, skipped.bad_publication
        );
        Ok(out)
    }

    fn localize_rows(
        &self,
        parsed: &[(usize, NaiveDateTime)],
        ambiguity: Ambiguity,
        repeated: RepeatedStamp,
    ) -> Result<Vec<(usize, DateTime<Utc>)>> {
        if ambiguity == Ambiguity::Infer {
            let naive: Vec<NaiveDateTime> = parsed.iter().map(|(_, n)| *n).collect();
            let instants = calendar::localize_sequence(&naive, self.zone, repeated)?;
            return Ok(parsed.iter().map(|(row, _)| *row).zip(instants).collect());
        }
        parsed
            .iter()
            .map(|(row, naive)| Ok((*row, calendar::localize(*naive, self.zone, ambiguity)?)))
            .collect()
    }
}

/// Check that a dataset definition can be served by one of the configured providers
pub fn check_source(spec: &DatasetSpec, known: &[SourceId]) -> Result<()> {
    if !known.iter().any(|id| id.as_str() == spec.source) {
        bail!(
            "Dataset '{}' refers to unknown provider '{}'",
            spec.dataset,
            spec.source
        );
    }
    Ok(())
}
