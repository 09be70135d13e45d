// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp, Zoned};

use crate::Error;

/// NOTE: Used for storing in the database, so it should be stable across different runs.
/// Values of this format sort chronologically as plain text.
pub(crate) const STABLE_FORMAT_UTC: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Instance key of an all-day occurrence.
pub(crate) const INSTANCE_FORMAT_DATE: &str = "%Y%m%d";

/// Instance key of a timed occurrence, in the series' own time zone.
pub(crate) const INSTANCE_FORMAT_DATETIME: &str = "%Y%m%dT%H%M%S";

/// Derives the instance key of an occurrence from its nominal start.
///
/// The same key is used when generating occurrences, when matching exceptions
/// and when resolving `RECURRENCE-ID` values, so it must never change format.
#[must_use]
pub fn instance_key(start: &Zoned, all_day: bool) -> String {
    if all_day {
        start.date().strftime(INSTANCE_FORMAT_DATE).to_string()
    } else {
        start.datetime().strftime(INSTANCE_FORMAT_DATETIME).to_string()
    }
}

/// Parses an instance key back into the nominal start, in the given zone.
#[must_use]
pub fn parse_instance_key(key: &str, tz: &TimeZone) -> Option<Zoned> {
    let dt = if key.len() == 8 {
        Date::strptime(INSTANCE_FORMAT_DATE, key).ok()?.to_datetime(jiff::civil::Time::midnight())
    } else {
        DateTime::strptime(INSTANCE_FORMAT_DATETIME, key).ok()?
    };
    dt.to_zoned(tz.clone()).ok()
}

/// Builds the public reference of an occurrence: `uid` for a master, `uid@instance`
/// for anything else.
#[must_use]
pub fn reference_id(uid: &str, instance: &str) -> String {
    if instance.is_empty() {
        uid.to_string()
    } else {
        format!("{uid}@{instance}")
    }
}

/// Splits a reference built by [`reference_id`]. UIDs containing `@` are left
/// intact unless the suffix looks like an instance key.
#[must_use]
pub fn parse_reference_id(reference: &str) -> (String, Option<String>) {
    if let Some((uid, suffix)) = reference.rsplit_once('@') {
        let looks_like_key = match suffix.len() {
            8 => suffix.bytes().all(|b| b.is_ascii_digit()),
            15 => {
                suffix.as_bytes().get(8) == Some(&b'T')
                    && suffix
                        .bytes()
                        .enumerate()
                        .all(|(i, b)| i == 8 || b.is_ascii_digit())
            }
            _ => false,
        };
        if looks_like_key && !uid.is_empty() {
            return (uid.to_string(), Some(suffix.to_string()));
        }
    }
    (reference.to_string(), None)
}

pub(crate) fn format_utc(ts: Timestamp) -> String {
    ts.strftime(STABLE_FORMAT_UTC).to_string()
}

pub(crate) fn parse_utc(s: &str) -> Result<Timestamp, Error> {
    DateTime::strptime(STABLE_FORMAT_UTC, s)
        .and_then(|dt| dt.to_zoned(TimeZone::UTC))
        .map(|z| z.timestamp())
        .map_err(|e| Error::Ics(format!("Invalid stored timestamp {s}: {e}")))
}

/// The IANA name of the zone, or `UTC` for zones without one.
pub(crate) fn zone_name(z: &Zoned) -> &str {
    z.time_zone().iana_name().unwrap_or("UTC")
}

/// Looks up a zone by name, falling back when the name is unknown.
pub(crate) fn resolve_zone(name: &str, fallback: &TimeZone) -> TimeZone {
    TimeZone::get(name).unwrap_or_else(|_| {
        tracing::debug!(tzid = name, "unknown time zone, using default");
        fallback.clone()
    })
}

/// Shifts a wall-clock time, keeping its zone. DST gaps resolve forward.
pub(crate) fn shift_civil(z: &Zoned, delta: SignedDuration) -> Result<Zoned, Error> {
    z.datetime()
        .checked_add(delta)
        .and_then(|dt| dt.to_zoned(z.time_zone().clone()))
        .map_err(|e| Error::validation(format!("Date out of range: {e}")))
}

/// Wall-clock distance between two instants, as read in the zone of `from`.
pub(crate) fn civil_delta(from: &Zoned, to: &Zoned) -> SignedDuration {
    let to = to.with_time_zone(from.time_zone().clone());
    from.datetime().duration_until(to.datetime())
}
