// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Zoned};
use unicode_width::UnicodeWidthStr;

/// The output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

/// A point in time typed by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum LooseTime {
    /// A whole day.
    Date(Date),
    /// A wall-clock time in the agenda's zone.
    DateTime(Zoned),
}

impl LooseTime {
    /// The instant it starts at, reading dates in `tz`.
    pub fn to_zoned(self, tz: &TimeZone) -> Result<Zoned, Box<dyn Error>> {
        match self {
            LooseTime::Date(date) => Ok(date.to_zoned(tz.clone())?),
            LooseTime::DateTime(zoned) => Ok(zoned),
        }
    }
}

const FORMAT_HELP: &str =
    "Invalid date format. Expected format: YYYY-MM-DD, HH:MM and YYYY-MM-DD HH:MM";

/// Parses `YYYY-MM-DD HH:MM`, `YYYY-MM-DD`, or `HH:MM` for a time today.
pub fn parse_datetime(now: &Zoned, dt: &str) -> Result<LooseTime, Box<dyn Error>> {
    let dt = dt.trim();
    if let Ok(datetime) = DateTime::strptime("%Y-%m-%d %H:%M", dt) {
        Ok(LooseTime::DateTime(datetime.to_zoned(now.time_zone().clone())?))
    } else if let Ok(time) = Time::strptime("%H:%M", dt) {
        // If the input is just a time, we assume it's today
        let datetime = now.date().to_datetime(time);
        Ok(LooseTime::DateTime(datetime.to_zoned(now.time_zone().clone())?))
    } else if let Ok(date) = Date::strptime("%Y-%m-%d", dt) {
        Ok(LooseTime::Date(date))
    } else {
        Err(FORMAT_HELP.into())
    }
}

/// Parses a start and end typed by the user into zoned bounds and an all-day
/// flag. A bare time as end falls on the start's day, or the next one if it
/// would come before the start.
pub fn parse_datetime_range(
    now: &Zoned,
    start: &str,
    end: Option<&str>,
) -> Result<(Zoned, Zoned, bool), Box<dyn Error>> {
    let tz = now.time_zone().clone();
    match parse_datetime(now, start)? {
        LooseTime::Date(first) => {
            let last = match end.map(|e| parse_datetime(now, e)).transpose()? {
                None => first,
                Some(LooseTime::Date(last)) => last,
                Some(LooseTime::DateTime(_)) => {
                    return Err("An all-day event must end on a date".into());
                }
            };
            let start = first.to_zoned(tz.clone())?;
            let end = last.at(23, 0, 0, 0).to_zoned(tz)?;
            Ok((start, end, true))
        }
        LooseTime::DateTime(start) => {
            let end = match end {
                None => start.checked_add(SignedDuration::from_hours(1))?,
                Some(end) => match Time::strptime("%H:%M", end.trim()) {
                    Ok(time) => {
                        let mut date = start.date();
                        if time < start.time() {
                            date = date.tomorrow()?;
                        }
                        date.to_datetime(time).to_zoned(tz)?
                    }
                    Err(_) => parse_datetime(now, end)?.to_zoned(&tz)?,
                },
            };
            Ok((start, end, false))
        }
    }
}

pub fn format_datetime(t: &Zoned, all_day: bool) -> String {
    if all_day {
        t.strftime("%Y-%m-%d").to_string()
    } else {
        t.strftime("%Y-%m-%d %H:%M").to_string()
    }
}

/// Renders the span of an event compactly, e.g. `2025-03-03 09:00~09:30`.
pub fn format_span(start: &Zoned, end: &Zoned, all_day: bool) -> String {
    match (all_day, start.date() == end.date()) {
        (true, true) => format_datetime(start, true),
        (true, false) => format!(
            "{}~{}",
            format_datetime(start, true),
            format_datetime(end, true)
        ),
        (false, true) => format!(
            "{} {}~{}",
            start.strftime("%Y-%m-%d"),
            start.strftime("%H:%M"),
            end.strftime("%H:%M")
        ),
        (false, false) => format!(
            "{}~{}",
            format_datetime(start, false),
            format_datetime(end, false)
        ),
    }
}

/// Cuts a string to at most `width` display columns, marking the cut with `…`.
pub fn ellipsize(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.to_string().width();
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
