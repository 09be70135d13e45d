// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Write};
use std::str::FromStr;

use jiff::civil::{Date, DateTime, Weekday};
use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    const fn as_str(self) -> &'static str {
        match self {
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MINUTELY" => Ok(Frequency::Minutely),
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(Error::Ics(format!("Unsupported frequency: {s}"))),
        }
    }
}

/// A `BYDAY` entry: a weekday, optionally with its position in the month (`-1FR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    /// A plain weekday without position.
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }
}

/// End of a bounded series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// The last date an all-day occurrence may fall on, inclusive.
    Date(Date),
    /// The last instant an occurrence may start at, inclusive.
    Instant(Timestamp),
}

impl Until {
    /// Whether an occurrence starting at `start` lies beyond the end.
    #[must_use]
    pub fn is_before(&self, start: &Zoned) -> bool {
        match self {
            Until::Date(d) => start.date() > *d,
            Until::Instant(ts) => start.timestamp() > *ts,
        }
    }

    /// Whether the end lies past an occurrence starting at `start`.
    #[must_use]
    pub fn is_after(&self, start: &Zoned) -> bool {
        match self {
            Until::Date(d) => start.date() < *d,
            Until::Instant(ts) => start.timestamp() < *ts,
        }
    }
}

/// A recurrence rule together with the instances it excludes.
///
/// Excluded instances are kept as instance keys, the same keys used for
/// occurrence rows, so no timestamp conversion can make them drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecurrenceRepr", try_from = "RecurrenceRepr")]
pub struct Recurrence {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<Until>,
    pub by_day: Vec<WeekdayNum>,
    pub by_month_day: Vec<i8>,
    pub by_month: Vec<i8>,
    pub week_start: Weekday,

    /// Rule parts without a field of their own, kept verbatim (`BYSETPOS=-1`).
    pub other_parts: Vec<String>,
    pub exdates: Vec<String>,
}

impl Recurrence {
    /// Creates an unbounded rule with interval 1.
    #[must_use]
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            week_start: Weekday::Monday,
            other_parts: Vec::new(),
            exdates: Vec::new(),
        }
    }

    /// Sets `COUNT`.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets `INTERVAL`.
    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Sets `UNTIL`.
    #[must_use]
    pub fn with_until(mut self, until: Until) -> Self {
        self.until = Some(until);
        self
    }

    /// Whether the series ends by itself.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Parses an `RRULE` value, e.g. `FREQ=WEEKLY;COUNT=5;BYDAY=MO,WE`.
    ///
    /// A date-only `UNTIL` is kept as a date; a floating `UNTIL` is read in `tz`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ics`] if a part is malformed or `FREQ` is missing.
    pub fn parse(rrule: &str, tz: &TimeZone) -> Result<Self, Error> {
        let bad = |part: &str| Error::Ics(format!("Invalid RRULE part: {part}"));

        let mut freq = None;
        let mut rule = Recurrence::new(Frequency::Daily);
        for part in rrule.trim().trim_start_matches("RRULE:").split(';') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| bad(part))?;
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => freq = Some(value.to_ascii_uppercase().parse()?),
                "INTERVAL" => rule.interval = value.parse::<u32>().map_err(|_| bad(part))?.max(1),
                "COUNT" => rule.count = Some(value.parse().map_err(|_| bad(part))?),
                "UNTIL" => rule.until = Some(parse_until(value, tz).ok_or_else(|| bad(part))?),
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(|v| parse_weekday_num(v).ok_or_else(|| bad(part)))
                        .collect::<Result<_, _>>()?;
                }
                "BYMONTHDAY" => rule.by_month_day = parse_numbers(value, 31).ok_or_else(|| bad(part))?,
                "BYMONTH" => rule.by_month = parse_numbers(value, 12).ok_or_else(|| bad(part))?,
                "WKST" => rule.week_start = parse_weekday(value).ok_or_else(|| bad(part))?,
                key @ ("BYSETPOS" | "BYYEARDAY" | "BYWEEKNO" | "BYHOUR" | "BYMINUTE"
                | "BYSECOND") => {
                    if value.is_empty() {
                        return Err(bad(part));
                    }
                    rule.other_parts.push(format!("{key}={value}"));
                }
                _ => tracing::debug!(part, "ignoring unknown RRULE part"),
            }
        }

        rule.freq = freq.ok_or_else(|| Error::Ics(format!("RRULE without FREQ: {rrule}")))?;
        Ok(rule)
    }

    /// Formats the rule as an `RRULE` value; exclusions are not part of it.
    #[must_use]
    pub fn to_rrule(&self) -> String {
        let mut out = format!("FREQ={}", self.freq.as_str());
        if self.interval > 1 {
            let _ = write!(out, ";INTERVAL={}", self.interval);
        }
        if let Some(count) = self.count {
            let _ = write!(out, ";COUNT={count}");
        }
        match self.until {
            Some(Until::Date(d)) => {
                let _ = write!(out, ";UNTIL={}", d.strftime("%Y%m%d"));
            }
            Some(Until::Instant(ts)) => {
                let _ = write!(out, ";UNTIL={}", ts.strftime("%Y%m%dT%H%M%SZ"));
            }
            None => {}
        }
        if !self.by_day.is_empty() {
            let days: Vec<String> = self
                .by_day
                .iter()
                .map(|d| match d.ordinal {
                    Some(n) => format!("{n}{}", weekday_code(d.weekday)),
                    None => weekday_code(d.weekday).to_string(),
                })
                .collect();
            let _ = write!(out, ";BYDAY={}", days.join(","));
        }
        if !self.by_month_day.is_empty() {
            let _ = write!(out, ";BYMONTHDAY={}", join_numbers(&self.by_month_day));
        }
        if !self.by_month.is_empty() {
            let _ = write!(out, ";BYMONTH={}", join_numbers(&self.by_month));
        }
        for part in &self.other_parts {
            let _ = write!(out, ";{part}");
        }
        if self.week_start != Weekday::Monday {
            let _ = write!(out, ";WKST={}", weekday_code(self.week_start));
        }
        out
    }

    /// Compares two rules while ignoring the excluded instances.
    #[must_use]
    pub fn same_pattern(&self, other: &Self) -> bool {
        self.freq == other.freq
            && self.interval == other.interval
            && self.count == other.count
            && self.until == other.until
            && self.by_day == other.by_day
            && self.by_month_day == other.by_month_day
            && self.by_month == other.by_month
            && self.week_start == other.week_start
            && self.other_parts == other.other_parts
    }

    /// Whether `other` is this rule ending earlier: same pattern, with a
    /// smaller `COUNT` or an earlier `UNTIL`.
    ///
    /// A `COUNT` replaced by an `UNTIL` is compared against `last_slot`, the
    /// start of the final instance of this rule, which is only computed then.
    #[must_use]
    pub fn is_shortened_by(&self, other: &Self, last_slot: impl FnOnce() -> Option<Zoned>) -> bool {
        let pattern_kept = self.freq == other.freq
            && self.interval == other.interval
            && self.by_day == other.by_day
            && self.by_month_day == other.by_month_day
            && self.by_month == other.by_month
            && self.week_start == other.week_start
            && self.other_parts == other.other_parts;
        if !pattern_kept {
            return false;
        }

        if self.count.is_some() && self.until.is_none() && other.count.is_none() {
            return match (other.until, last_slot()) {
                (Some(until), Some(last)) => !until.is_after(&last),
                _ => false,
            };
        }

        let count_shortened = match (self.count, other.count) {
            (Some(old), Some(new)) => new <= old,
            (None, Some(_)) => true,
            (old, new) => old == new,
        };
        let until_shortened = match (&self.until, &other.until) {
            (Some(old), Some(new)) => until_key(new) <= until_key(old),
            (None, Some(_)) => true,
            (old, new) => old == new,
        };
        let changed = self.count != other.count || self.until != other.until;
        changed && count_shortened && until_shortened
    }
}

impl Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rrule())
    }
}

/// Stored JSON shape of a [`Recurrence`].
#[derive(Serialize, Deserialize)]
struct RecurrenceRepr {
    rrule: String,
    #[serde(default)]
    exdates: Vec<String>,
}

impl From<Recurrence> for RecurrenceRepr {
    fn from(r: Recurrence) -> Self {
        Self {
            rrule: r.to_rrule(),
            exdates: r.exdates,
        }
    }
}

impl TryFrom<RecurrenceRepr> for Recurrence {
    type Error = Error;

    fn try_from(repr: RecurrenceRepr) -> Result<Self, Self::Error> {
        // Stored rules only carry UTC or date-only UNTIL values
        let mut rule = Recurrence::parse(&repr.rrule, &TimeZone::UTC)?;
        rule.exdates = repr.exdates;
        Ok(rule)
    }
}

fn until_key(until: &Until) -> Timestamp {
    match until {
        Until::Date(d) => d
            .to_datetime(jiff::civil::Time::MAX)
            .to_zoned(TimeZone::UTC)
            .map_or(Timestamp::MAX, |z| z.timestamp()),
        Until::Instant(ts) => *ts,
    }
}

fn parse_until(value: &str, tz: &TimeZone) -> Option<Until> {
    if value.len() == 8 {
        return Date::strptime("%Y%m%d", value).ok().map(Until::Date);
    }
    if let Some(utc) = value.strip_suffix('Z') {
        let dt = DateTime::strptime("%Y%m%dT%H%M%S", utc).ok()?;
        return dt.to_zoned(TimeZone::UTC).ok().map(|z| Until::Instant(z.timestamp()));
    }
    let dt = DateTime::strptime("%Y%m%dT%H%M%S", value).ok()?;
    dt.to_zoned(tz.clone()).ok().map(|z| Until::Instant(z.timestamp()))
}

fn parse_numbers(value: &str, max: i8) -> Option<Vec<i8>> {
    value
        .split(',')
        .map(|v| {
            let n: i8 = v.trim().parse().ok()?;
            (n != 0 && n.unsigned_abs() <= max.unsigned_abs()).then_some(n)
        })
        .collect()
}

fn join_numbers(values: &[i8]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_weekday_num(value: &str) -> Option<WeekdayNum> {
    let value = value.trim();
    let split = value.len().checked_sub(2)?;
    let (ordinal, code) = value.split_at(split);
    let weekday = parse_weekday(code)?;
    if ordinal.is_empty() {
        return Some(WeekdayNum::every(weekday));
    }

    let n: i8 = ordinal.trim_start_matches('+').parse().ok()?;
    if n == 0 || n.unsigned_abs() > 53 {
        return None;
    }
    Some(WeekdayNum {
        ordinal: Some(n),
        weekday,
    })
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Monday),
        "TU" => Some(Weekday::Tuesday),
        "WE" => Some(Weekday::Wednesday),
        "TH" => Some(Weekday::Thursday),
        "FR" => Some(Weekday::Friday),
        "SA" => Some(Weekday::Saturday),
        "SU" => Some(Weekday::Sunday),
        _ => None,
    }
}

const fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "MO",
        Weekday::Tuesday => "TU",
        Weekday::Wednesday => "WE",
        Weekday::Thursday => "TH",
        Weekday::Friday => "FR",
        Weekday::Saturday => "SA",
        Weekday::Sunday => "SU",
    }
}
