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

//! Publication-time aware as-of merge.
//!
//! For every delivery instant the engine picks one observation out of all
//! revisions reported by all sources:
//!
//! 1. candidates not admitted by the policy are dropped,
//! 2. the newest publication instant wins,
//! 3. among equally new candidates of one source the later row wins,
//! 4. among different sources the precedence list decides,
//! 5. remaining disagreement is an [`MergeError::UnresolvableTie`].
//!
//! Resolution looks at all candidates of a delivery instant at once, so the
//! result does not depend on input order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use settle_types::{Ambiguity, CutoffBound, Observation, SourceId, Value};
use thiserror::Error;
use tracing::debug;

use crate::calendar::{self, CalendarError};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(
        "unresolvable tie in '{series}' at {delivery}: {first} and {second} both published at \
         {published} with different values and no precedence between them"
    )]
    UnresolvableTie {
        series: String,
        delivery: DateTime<Utc>,
        published: DateTime<Utc>,
        first: SourceId,
        second: SourceId,
    },

    #[error("{count} duplicate delivery instants in '{series}', first at {first}")]
    DuplicateDeliveryInstant {
        series: String,
        count: usize,
        first: DateTime<Utc>,
    },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Source ids ordered from most to least trusted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePrecedence {
    order: Vec<SourceId>,
}

impl SourcePrecedence {
    #[must_use]
    pub fn new(order: Vec<SourceId>) -> Self {
        Self { order }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(names.into_iter().map(|n| SourceId::from(n.as_ref())).collect())
    }

    /// Position in the list; lower is more trusted
    #[must_use]
    pub fn rank(&self, source: &SourceId) -> Option<usize> {
        self.order.iter().position(|s| s == source)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Start of the window of usable publications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// Local midnight of the day before the delivery's local date
    PreviousLocalDay,
    /// Fixed duration before the delivery instant
    Fixed(TimeDelta),
}

/// Publications usable for a day-ahead decision.
///
/// A candidate for delivery on local day `D` must be published between the
/// lookback start and `cutoff` local time on day `D - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffWindow {
    pub zone: Tz,
    pub cutoff: NaiveTime,
    pub bound: CutoffBound,
    pub lookback: Lookback,
}

impl CutoffWindow {
    /// Window opening at local midnight of the previous day, cutoff inclusive
    #[must_use]
    pub fn day_ahead(zone: Tz, cutoff: NaiveTime) -> Self {
        Self {
            zone,
            cutoff,
            bound: CutoffBound::Inclusive,
            lookback: Lookback::PreviousLocalDay,
        }
    }

    #[must_use]
    pub fn with_bound(mut self, bound: CutoffBound) -> Self {
        self.bound = bound;
        self
    }

    #[must_use]
    pub fn with_lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = lookback;
        self
    }

    /// Earliest and latest admissible publication for `delivery`
    pub fn bounds(
        &self,
        delivery: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let delivery_day = calendar::local_date(delivery, self.zone);
        let decision_day = delivery_day
            .checked_sub_days(Days::new(1))
            .ok_or(CalendarError::DateOutOfRange(delivery_day))?;

        let cutoff = calendar::localize(
            decision_day.and_time(self.cutoff),
            self.zone,
            Ambiguity::Earlier,
        )?;
        let start = match self.lookback {
            Lookback::PreviousLocalDay => calendar::local_midnight(decision_day, self.zone)?,
            Lookback::Fixed(span) => delivery - span,
        };

        Ok((start, cutoff))
    }

    pub fn admits(
        &self,
        delivery: DateTime<Utc>,
        published: DateTime<Utc>,
    ) -> Result<bool, CalendarError> {
        let (start, cutoff) = self.bounds(delivery)?;
        let before_cutoff = match self.bound {
            CutoffBound::Inclusive => published <= cutoff,
            CutoffBound::Exclusive => published < cutoff,
        };
        Ok(published >= start && before_cutoff)
    }
}

/// Candidate selection rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsOfPolicy {
    /// Every publication is admissible
    LatestAlways,
    /// Only publications inside the day-ahead window are admissible
    LatestBeforeCutoff(CutoffWindow),
}

impl AsOfPolicy {
    fn admits(&self, observation: &Observation) -> Result<bool, CalendarError> {
        match self {
            Self::LatestAlways => Ok(true),
            Self::LatestBeforeCutoff(window) => {
                window.admits(observation.delivery, observation.published)
            }
        }
    }
}

/// The observation chosen for one delivery instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPoint {
    pub value: Value,
    pub published: DateTime<Utc>,
    pub source: SourceId,
}

/// One value per delivery instant
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSeries {
    name: String,
    points: BTreeMap<DateTime<Utc>, ResolvedPoint>,
}

impl ResolvedSeries {
    /// Build a series from explicit points, rejecting repeated instants
    pub fn try_from_points(
        name: impl Into<String>,
        points: Vec<(DateTime<Utc>, ResolvedPoint)>,
    ) -> Result<Self, MergeError> {
        let name = name.into();
        let total = points.len();
        let mut first_duplicate = None;
        let mut map = BTreeMap::new();

        for (delivery, point) in points {
            if map.insert(delivery, point).is_some() {
                first_duplicate = Some(first_duplicate.map_or(delivery, |f: DateTime<Utc>| f.min(delivery)));
            }
        }

        if let Some(first) = first_duplicate {
            return Err(MergeError::DuplicateDeliveryInstant {
                series: name,
                count: total - map.len(),
                first,
            });
        }

        Ok(Self { name, points: map })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn get(&self, delivery: DateTime<Utc>) -> Option<&ResolvedPoint> {
        self.points.get(&delivery)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, &ResolvedPoint)> + '_ {
        self.points.iter().map(|(t, p)| (*t, p))
    }

    /// Numeric values keyed by delivery instant
    pub fn values(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points.iter().map(|(t, p)| (*t, p.value.as_f64()))
    }
}

/// Counts gathered while resolving one series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub series: String,
    pub candidates: usize,
    pub eligible: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AsOfEngine {
    precedence: SourcePrecedence,
}

impl AsOfEngine {
    #[must_use]
    pub fn new(precedence: SourcePrecedence) -> Self {
        Self { precedence }
    }

    #[must_use]
    pub fn precedence(&self) -> &SourcePrecedence {
        &self.precedence
    }

    /// Resolve the observations of one series under `policy`.
    ///
    /// Observations of other series are ignored.
    pub fn resolve<'a, I>(
        &self,
        series: &str,
        observations: I,
        policy: &AsOfPolicy,
    ) -> Result<(ResolvedSeries, MergeReport), MergeError>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut report = MergeReport {
            series: series.to_owned(),
            ..MergeReport::default()
        };
        let mut candidates: BTreeMap<DateTime<Utc>, Candidates<'a>> = BTreeMap::new();

        for observation in observations {
            if observation.series != series {
                continue;
            }
            report.candidates += 1;
            if !policy.admits(observation)? {
                continue;
            }
            report.eligible += 1;
            candidates
                .entry(observation.delivery)
                .and_modify(|group| group.push(observation))
                .or_insert_with(|| Candidates::new(observation));
        }

        let mut points = Vec::with_capacity(candidates.len());
        for (delivery, group) in candidates {
            let chosen = self.pick(series, delivery, &group)?;
            points.push((
                delivery,
                ResolvedPoint {
                    value: chosen.value.clone(),
                    published: chosen.published,
                    source: chosen.source.clone(),
                },
            ));
        }

        let resolved = ResolvedSeries::try_from_points(series, points)?;
        report.resolved = resolved.len();
        debug!(
            "Resolved '{}': {} candidates, {} eligible, {} delivery instants",
            series, report.candidates, report.eligible, report.resolved
        );

        Ok((resolved, report))
    }

    fn pick<'a>(
        &self,
        series: &str,
        delivery: DateTime<Utc>,
        group: &Candidates<'a>,
    ) -> Result<&'a Observation, MergeError> {
        let newest = group.newest;

        // Latest row per source among the newest publications
        let mut per_source: HashMap<&SourceId, &'a Observation> = HashMap::new();
        for &observation in group.members.iter().filter(|o| o.published == newest) {
            match per_source.get(&observation.source) {
                Some(current) if current.sequence > observation.sequence => {}
                Some(current)
                    if current.sequence == observation.sequence
                        && current.value != observation.value =>
                {
                    return Err(MergeError::UnresolvableTie {
                        series: series.to_owned(),
                        delivery,
                        published: newest,
                        first: current.source.clone(),
                        second: observation.source.clone(),
                    });
                }
                Some(current) if current.sequence == observation.sequence => {}
                _ => {
                    per_source.insert(&observation.source, observation);
                }
            }
        }

        let mut finalists: Vec<&'a Observation> = per_source.into_values().collect();
        finalists.sort_by(|a, b| a.source.cmp(&b.source));

        let Some((&first, others)) = finalists.split_first() else {
            return Ok(group.first);
        };
        if others.is_empty() {
            return Ok(first);
        }

        let ranked: Option<Vec<usize>> = finalists
            .iter()
            .map(|o| self.precedence.rank(&o.source))
            .collect();
        if let Some(ranks) = ranked {
            let best = ranks
                .iter()
                .zip(&finalists)
                .min_by_key(|(rank, _)| **rank)
                .map_or(first, |(_, o)| *o);
            return Ok(best);
        }

        match others.iter().find(|o| o.value != first.value) {
            None => Ok(first),
            Some(conflict) => Err(MergeError::UnresolvableTie {
                series: series.to_owned(),
                delivery,
                published: newest,
                first: first.source.clone(),
                second: conflict.source.clone(),
            }),
        }
    }
}

/// Admitted observations of one delivery instant
struct Candidates<'a> {
    first: &'a Observation,
    newest: DateTime<Utc>,
    members: Vec<&'a Observation>,
}

impl<'a> Candidates<'a> {
    fn new(observation: &'a Observation) -> Self {
        Self {
            first: observation,
            newest: observation.published,
            members: vec![observation],
        }
    }

    fn push(&mut self, observation: &'a Observation) {
        self.newest = self.newest.max(observation.published);
        self.members.push(observation);
    }
}
