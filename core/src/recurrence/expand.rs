// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::{SignedDuration, Span, Timestamp, Zoned};
use rrule::RRuleSet;

use crate::datetime::instance_key;
use crate::event::Event;
use crate::recurrence::Recurrence;

/// Bounds applied to every expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of occurrences produced, the first one included.
    pub max_occurrences: usize,

    /// How far past now an open-ended rule is expanded.
    pub horizon_years: i16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_occurrences: 999,
            horizon_years: 20,
        }
    }
}

/// One concrete occurrence of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Instance key derived from the nominal start.
    pub instance: String,
    pub start: Zoned,
    pub end: Zoned,
    /// Whether this is the first instance, which the master itself represents.
    pub is_base: bool,
}

/// Result of expanding a series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Occurrences in chronological order, without excluded or overridden instances.
    pub occurrences: Vec<Occurrence>,

    /// Start of the final instance, when the rule itself ended the series
    /// through `COUNT` or `UNTIL`. `None` when expansion stopped at a limit.
    pub last_slot: Option<Zoned>,
}

/// Expands a master event into its occurrences.
///
/// Instances whose key is listed in the rule's exclusions or in `exceptions` are
/// skipped but still count towards `COUNT`. A master without a rule yields only
/// its base occurrence. The result depends only on the inputs, so expanding the
/// same master twice yields the same keys in the same order.
#[must_use]
pub fn expand(master: &Event, exceptions: &[String], now: Timestamp, limits: &Limits) -> Expansion {
    let tz = master.start.time_zone().clone();
    let duration = master
        .start
        .datetime()
        .duration_until(master.end.with_time_zone(tz.clone()).datetime());
    let excluded = |key: &str, rule: Option<&Recurrence>| {
        exceptions.iter().any(|e| e == key)
            || rule.is_some_and(|r| r.exdates.iter().any(|e| e == key))
    };

    let mut expansion = Expansion::default();
    let base_key = instance_key(&master.start, master.all_day);
    if !excluded(&base_key, master.recurrence.as_ref()) {
        expansion.occurrences.push(Occurrence {
            instance: base_key,
            start: master.start.clone(),
            end: end_of(&master.start, duration),
            is_base: true,
        });
    }

    let Some(rule) = master.recurrence.as_ref() else {
        expansion.last_slot = Some(master.start.clone());
        return expansion;
    };

    let mut slots: u32 = 1;
    let mut last = master.start.clone();
    let mut ended = true;
    let set = match rule.count {
        Some(count) if count <= 1 => None,
        _ => match rule_set(&master.start, rule) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(
                    uid = %master.uid,
                    rule = %rule,
                    err = %e,
                    "cannot expand recurrence rule"
                );
                ended = false;
                None
            }
        },
    };

    if let Some(set) = set {
        let horizon = Span::new()
            .try_years(limits.horizon_years)
            .and_then(|span| now.to_zoned(tz.clone()).checked_add(span))
            .map_or(Timestamp::MAX, |z| z.timestamp());

        for dt in &set {
            let Ok(start) = Timestamp::from_second(dt.timestamp()).map(|ts| ts.to_zoned(tz.clone()))
            else {
                continue;
            };
            // The first instance is the master itself, even when the rule does not match it
            if start.timestamp() <= master.start.timestamp() {
                continue;
            }
            if rule.until.is_some_and(|until| until.is_before(&start)) {
                break;
            }
            if !rule.is_bounded() && start.timestamp() > horizon {
                ended = false;
                break;
            }

            slots += 1;
            let key = instance_key(&start, master.all_day);
            if !excluded(&key, Some(rule)) {
                expansion.occurrences.push(Occurrence {
                    instance: key,
                    end: end_of(&start, duration),
                    start: start.clone(),
                    is_base: false,
                });
            }
            last = start;

            if rule.count.is_some_and(|c| slots >= c) {
                break;
            }
            if expansion.occurrences.len() >= limits.max_occurrences {
                ended = false;
                break;
            }
        }
    }

    if ended && rule.is_bounded() {
        expansion.last_slot = Some(last);
    }
    expansion
}

/// Counts the instances of the series that start before `before`.
#[must_use]
pub(crate) fn slots_before(master: &Event, before: &Zoned, now: Timestamp, limits: &Limits) -> u32 {
    let Some(rule) = master.recurrence.as_ref() else {
        return u32::from(master.start < *before);
    };
    // Count slots, not occurrences: exclusions still consume COUNT
    let mut open = master.clone();
    if let Some(r) = open.recurrence.as_mut() {
        r.exdates.clear();
    }
    let limits = Limits {
        max_occurrences: rule.count.map_or(limits.max_occurrences, |c| c as usize),
        ..*limits
    };
    let expansion = expand(&open, &[], now, &limits);
    let below = expansion
        .occurrences
        .iter()
        .filter(|o| o.start < *before)
        .count();
    u32::try_from(below).unwrap_or(u32::MAX)
}

/// The unbounded form of `rule` anchored at `start`. `COUNT`, `UNTIL` and
/// exclusions are applied while iterating, on instance keys.
fn rule_set(start: &Zoned, rule: &Recurrence) -> Result<RRuleSet, rrule::RRuleError> {
    let open = Recurrence {
        count: None,
        until: None,
        exdates: Vec::new(),
        ..rule.clone()
    };
    let dtstart = match start.time_zone().iana_name() {
        Some(name) if name != "UTC" => format!(
            "DTSTART;TZID={name}:{}",
            start.datetime().strftime("%Y%m%dT%H%M%S")
        ),
        _ => format!(
            "DTSTART:{}",
            start.timestamp().strftime("%Y%m%dT%H%M%SZ")
        ),
    };
    format!("{dtstart}\nRRULE:{}", open.to_rrule()).parse()
}

fn end_of(start: &Zoned, duration: SignedDuration) -> Zoned {
    start
        .datetime()
        .checked_add(duration)
        .and_then(|dt| dt.to_zoned(start.time_zone().clone()))
        .unwrap_or_else(|_| start.clone())
}
