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

//! Column frame indexed by UTC delivery instant.
//!
//! The index is kept sorted and strictly unique; every constructor that
//! accepts external rows verifies this and reports the number of offending
//! rows. Columns are stored by name in sorted order.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use thiserror::Error;

use crate::asof::ResolvedSeries;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("{count} duplicate delivery instants in frame index, first at {first}")]
    DuplicateIndex { count: usize, first: DateTime<Utc> },

    #[error("column '{column}' has {actual} values but the index has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' exists in both frames")]
    ColumnConflict(String),

    #[error("column '{0}' not found")]
    MissingColumn(String),
}

pub type Column = Vec<Option<f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Column>,
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty-column frame over `index`, which must be unique
    pub fn with_index(index: Vec<DateTime<Utc>>) -> Result<Self, FrameError> {
        Self::from_parts(index, BTreeMap::new())
    }

    /// Assemble a frame from raw rows, sorting by instant.
    ///
    /// Fails with [`FrameError::DuplicateIndex`] when an instant repeats.
    pub fn from_parts(
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<String, Column>,
    ) -> Result<Self, FrameError> {
        for (name, values) in &columns {
            if values.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    column: name.clone(),
                    expected: index.len(),
                    actual: values.len(),
                });
            }
        }

        let mut order: Vec<usize> = (0..index.len()).collect();
        order.sort_by_key(|&i| index[i]);

        let frame = Self {
            index: order.iter().map(|&i| index[i]).collect(),
            columns: columns
                .into_iter()
                .map(|(name, values)| (name, order.iter().map(|&i| values[i]).collect()))
                .collect(),
        };
        frame.ensure_unique_index()?;
        Ok(frame)
    }

    /// Single-column frame from (instant, value) points
    pub fn from_points<I>(name: &str, points: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        let (index, values): (Vec<_>, Vec<_>) =
            points.into_iter().map(|(t, v)| (t, Some(v))).unzip();
        let mut columns = BTreeMap::new();
        columns.insert(name.to_owned(), values);
        Self::from_parts(index, columns)
    }

    pub fn from_resolved(series: &ResolvedSeries) -> Result<Self, FrameError> {
        Self::from_points(series.name(), series.values())
    }

    /// Verify the index is strictly increasing.
    ///
    /// The error carries the number of rows repeating an earlier instant.
    pub fn ensure_unique_index(&self) -> Result<(), FrameError> {
        let mut count = 0;
        let mut first = None;
        for pair in self.index.windows(2) {
            if pair[1] <= pair[0] {
                count += 1;
                first.get_or_insert(pair[1]);
            }
        }
        match first {
            Some(first) => Err(FrameError::DuplicateIndex { count, first }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn require(&self, name: &str) -> Result<&[Option<f64>], FrameError> {
        self.column(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_owned()))
    }

    /// Value of `name` at row `row`
    #[must_use]
    pub fn get(&self, name: &str, row: usize) -> Option<f64> {
        self.columns.get(name)?.get(row).copied().flatten()
    }

    /// Row position of an instant
    #[must_use]
    pub fn position(&self, instant: DateTime<Utc>) -> Option<usize> {
        self.index.binary_search(&instant).ok()
    }

    /// Add or replace a column
    pub fn insert_column(&mut self, name: impl Into<String>, values: Column) -> Result<(), FrameError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    /// Outer join on the delivery instant; both frames keep their columns.
    pub fn outer_join(&self, other: &Frame) -> Result<Frame, FrameError> {
        if let Some(conflict) = other.columns.keys().find(|c| self.columns.contains_key(*c)) {
            return Err(FrameError::ColumnConflict(conflict.clone()));
        }

        let index: Vec<DateTime<Utc>> = self
            .index
            .iter()
            .chain(other.index.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut joined = self.reindex(&index);
        for (name, values) in other.reindex(&index).columns {
            joined.columns.insert(name, values);
        }
        joined.ensure_unique_index()?;
        Ok(joined)
    }

    /// Frame over `index` (sorted, unique) with values taken where instants match
    #[must_use]
    pub fn reindex(&self, index: &[DateTime<Utc>]) -> Frame {
        let positions: Vec<Option<usize>> = index.iter().map(|t| self.position(*t)).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let moved = positions
                    .iter()
                    .map(|p| p.and_then(|row| values[row]))
                    .collect();
                (name.clone(), moved)
            })
            .collect();
        Frame {
            index: index.to_vec(),
            columns,
        }
    }

    /// Regular grid with `step` from the floored first instant to the last one
    #[must_use]
    pub fn regular_grid(&self, step: TimeDelta) -> Vec<DateTime<Utc>> {
        let (Some(first), Some(last)) = (self.index.first(), self.index.last()) else {
            return Vec::new();
        };
        let mut current = first.duration_trunc(step).unwrap_or(*first);
        let mut grid = Vec::new();
        while current <= *last {
            grid.push(current);
            current += step;
        }
        grid
    }

    /// Rows whose instant satisfies `keep`
    #[must_use]
    pub fn filter_rows<F>(&self, keep: F) -> Frame
    where
        F: Fn(DateTime<Utc>) -> bool,
    {
        let rows: Vec<usize> = (0..self.index.len())
            .filter(|&i| keep(self.index[i]))
            .collect();
        Frame {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), rows.iter().map(|&i| values[i]).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_parts_sorts_rows() {
        let mut columns = BTreeMap::new();
        columns.insert("price".to_owned(), vec![Some(2.0), Some(1.0)]);
        let frame = Frame::from_parts(
            vec![utc("2024-01-01T00:15:00Z"), utc("2024-01-01T00:00:00Z")],
            columns,
        )
        .unwrap();

        assert_eq!(frame.index()[0], utc("2024-01-01T00:00:00Z"));
        assert_eq!(frame.get("price", 0), Some(1.0));
    }

    #[test]
    fn test_duplicate_rows_are_fatal_and_counted() {
        let err = Frame::from_points(
            "bilans_price",
            vec![
                (utc("2024-01-01T00:00:00Z"), 1.0),
                (utc("2024-01-01T00:15:00Z"), 2.0),
                (utc("2024-01-01T00:15:00Z"), 3.0),
                (utc("2024-01-01T00:15:00Z"), 4.0),
                (utc("2024-01-01T00:30:00Z"), 5.0),
            ],
        )
        .unwrap_err();

        assert_eq!(
            err,
            FrameError::DuplicateIndex {
                count: 2,
                first: utc("2024-01-01T00:15:00Z"),
            }
        );
    }

    #[test]
    fn test_outer_join_unions_index() {
        let left = Frame::from_points(
            "a",
            vec![(utc("2024-01-01T00:00:00Z"), 1.0), (utc("2024-01-01T00:15:00Z"), 2.0)],
        )
        .unwrap();
        let right = Frame::from_points(
            "b",
            vec![(utc("2024-01-01T00:15:00Z"), 20.0), (utc("2024-01-01T00:30:00Z"), 30.0)],
        )
        .unwrap();

        let joined = left.outer_join(&right).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.column("a").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(joined.column("b").unwrap(), &[None, Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_outer_join_rejects_column_conflict() {
        let left = Frame::from_points("a", vec![(utc("2024-01-01T00:00:00Z"), 1.0)]).unwrap();
        let err = left.outer_join(&left).unwrap_err();
        assert_eq!(err, FrameError::ColumnConflict("a".to_owned()));
    }

    #[test]
    fn test_regular_grid_fills_gaps() {
        let frame = Frame::from_points(
            "a",
            vec![(utc("2024-01-01T00:00:00Z"), 1.0), (utc("2024-01-01T01:00:00Z"), 2.0)],
        )
        .unwrap();
        let grid = frame.regular_grid(TimeDelta::minutes(15));
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[4], utc("2024-01-01T01:00:00Z"));
    }

    #[test]
    fn test_insert_column_checks_length() {
        let mut frame = Frame::with_index(vec![utc("2024-01-01T00:00:00Z")]).unwrap();
        let err = frame.insert_column("x", vec![None, None]).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { actual: 2, .. }));
    }
}
