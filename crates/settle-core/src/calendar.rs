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

//! Local-to-UTC calendar mapper.
//!
//! Upstream reports label delivery periods as "trading day + hour/quarter-hour
//! index" in local time. The number of slots in such a day depends on the
//! daylight-saving rules of the zone: 24/96 on ordinary days, 23/92 when
//! clocks spring forward and 25/100 when they fall back. The slot table for a
//! day is always derived from the actual span between two local midnights.

use std::collections::HashMap;

use chrono::{
    DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use settle_types::{Ambiguity, ConfigError, DayKind, Granularity};
use thiserror::Error;

/// Longest daylight-saving gap searched when shifting a nonexistent local time
const MAX_GAP_MINUTES: i64 = 180;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("date {0} is outside the supported calendar range")]
    DateOutOfRange(NaiveDate),

    #[error("local time {0} does not exist in {1} and cannot be shifted forward")]
    NonexistentLocalTime(NaiveDateTime, Tz),
}

/// Parse an IANA zone name
pub fn parse_zone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimeZone(name.to_owned()))
}

/// Convert a local wall-clock time to UTC.
///
/// Repeated times are resolved by `ambiguity` (`Infer` picks the earlier
/// instant when there is no sequence to infer from). Times falling into a
/// spring-forward gap are shifted forward to the first existing instant.
pub fn localize(
    naive: NaiveDateTime,
    zone: Tz,
    ambiguity: Ambiguity,
) -> Result<DateTime<Utc>, CalendarError> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, later) => Ok(match ambiguity {
            Ambiguity::Later => later.with_timezone(&Utc),
            Ambiguity::Earlier | Ambiguity::Infer => earlier.with_timezone(&Utc),
        }),
        LocalResult::None => shift_forward(naive, zone),
    }
}

fn shift_forward(naive: NaiveDateTime, zone: Tz) -> Result<DateTime<Utc>, CalendarError> {
    (1..=MAX_GAP_MINUTES)
        .filter_map(|minutes| naive.checked_add_signed(TimeDelta::minutes(minutes)))
        .find_map(|candidate| zone.from_local_datetime(&candidate).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(CalendarError::NonexistentLocalTime(naive, zone))
}

/// How [`localize_sequence`] reads an ambiguous time equal to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatedStamp {
    /// Every entry is a distinct instant, so a repeated label starts the
    /// second occurrence (delivery axes)
    NextOccurrence,
    /// Entries may share an instant; only a backwards step starts the second
    /// occurrence (publication stamps)
    SameInstant,
}

/// Convert an ordered sequence of local wall-clock times, inferring which
/// occurrence of a repeated hour each entry refers to.
///
/// Inside a run of ambiguous times the earlier offset is used until the wall
/// clock steps backwards (or repeats, with [`RepeatedStamp::NextOccurrence`]);
/// from then on the later offset is used until the run ends.
pub fn localize_sequence(
    naive: &[NaiveDateTime],
    zone: Tz,
    repeated: RepeatedStamp,
) -> Result<Vec<DateTime<Utc>>, CalendarError> {
    let mut out = Vec::with_capacity(naive.len());
    let mut previous_ambiguous: Option<NaiveDateTime> = None;
    let mut second_pass = false;

    for &local in naive {
        match zone.from_local_datetime(&local) {
            LocalResult::Ambiguous(earlier, later) => {
                let steps_back = previous_ambiguous.is_some_and(|prev| match repeated {
                    RepeatedStamp::NextOccurrence => local <= prev,
                    RepeatedStamp::SameInstant => local < prev,
                });
                if steps_back {
                    second_pass = true;
                }
                previous_ambiguous = Some(local);
                let resolved = if second_pass { later } else { earlier };
                out.push(resolved.with_timezone(&Utc));
            }
            LocalResult::Single(dt) => {
                previous_ambiguous = None;
                second_pass = false;
                out.push(dt.with_timezone(&Utc));
            }
            LocalResult::None => {
                previous_ambiguous = None;
                second_pass = false;
                out.push(shift_forward(local, zone)?);
            }
        }
    }

    Ok(out)
}

/// Start of the local calendar day as a UTC instant.
///
/// A repeated midnight resolves to its first occurrence; a midnight skipped
/// by a transition resolves to the first existing local instant of the day.
pub fn local_midnight(date: NaiveDate, zone: Tz) -> Result<DateTime<Utc>, CalendarError> {
    localize(date.and_time(NaiveTime::MIN), zone, Ambiguity::Earlier)
}

/// Local calendar date of a UTC instant
#[must_use]
pub fn local_date(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Ordered slot table of one local calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    date: NaiveDate,
    zone: Tz,
    granularity: Granularity,
    instants: Vec<DateTime<Utc>>,
}

impl DaySlots {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    /// UTC start of slot `index`, absent when the day has fewer slots
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DateTime<Utc>> {
        self.instants.get(index).copied()
    }

    /// Local start of slot `index`
    #[must_use]
    pub fn local(&self, index: usize) -> Option<DateTime<Tz>> {
        self.get(index).map(|utc| utc.with_timezone(&self.zone))
    }

    #[must_use]
    pub fn instants(&self) -> &[DateTime<Utc>] {
        &self.instants
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, DateTime<Utc>)> + '_ {
        self.instants.iter().copied().enumerate()
    }

    #[must_use]
    pub fn day_kind(&self) -> DayKind {
        let standard = self.granularity.slots_per_standard_day();
        match self.len().cmp(&standard) {
            std::cmp::Ordering::Less => DayKind::Short,
            std::cmp::Ordering::Equal => DayKind::Standard,
            std::cmp::Ordering::Greater => DayKind::Long,
        }
    }
}

/// Build the slot table for `date` in `zone`.
///
/// Slots cover the half-open interval from local midnight to the next local
/// midnight, evenly spaced in absolute time.
pub fn slots_for_date(
    date: NaiveDate,
    zone: Tz,
    granularity: Granularity,
) -> Result<DaySlots, CalendarError> {
    let next = date
        .succ_opt()
        .ok_or(CalendarError::DateOutOfRange(date))?;
    let start = local_midnight(date, zone)?;
    let end = local_midnight(next, zone)?;

    let step = granularity.step();
    let mut instants = Vec::with_capacity(granularity.slots_per_standard_day() + 4);
    let mut current = start;
    while current < end {
        instants.push(current);
        current += step;
    }

    Ok(DaySlots {
        date,
        zone,
        granularity,
        instants,
    })
}

/// Map an upstream (date, slot index) label to its UTC instant.
///
/// Indices beyond the slot count of that particular day yield `None`.
#[must_use]
pub fn map_index_to_utc(
    date: NaiveDate,
    slot_index: usize,
    zone: Tz,
    granularity: Granularity,
) -> Option<DateTime<Utc>> {
    slots_for_date(date, zone, granularity)
        .ok()?
        .get(slot_index)
}

/// Slot tables cached per day, for mapping many rows of one dataset
#[derive(Debug, Clone)]
pub struct SlotCalendar {
    zone: Tz,
    granularity: Granularity,
    days: HashMap<NaiveDate, DaySlots>,
}

impl SlotCalendar {
    #[must_use]
    pub fn new(zone: Tz, granularity: Granularity) -> Self {
        Self {
            zone,
            granularity,
            days: HashMap::new(),
        }
    }

    #[must_use]
    pub fn zone(&self) -> Tz {
        self.zone
    }

    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn day(&mut self, date: NaiveDate) -> Result<&DaySlots, CalendarError> {
        if !self.days.contains_key(&date) {
            let slots = slots_for_date(date, self.zone, self.granularity)?;
            self.days.insert(date, slots);
        }
        self.days
            .get(&date)
            .ok_or(CalendarError::DateOutOfRange(date))
    }

    pub fn lookup(
        &mut self,
        date: NaiveDate,
        slot_index: usize,
    ) -> Result<Option<DateTime<Utc>>, CalendarError> {
        Ok(self.day(date)?.get(slot_index))
    }
}
