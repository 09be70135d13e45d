// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! iCalendar encoding and decoding of calendar objects.
//!
//! One calendar object holds a series master and the exceptions that override
//! single occurrences of it, all sharing one UID.

use std::collections::HashMap;

use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{Calendar, Component as _, EventLike, ValueType};
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use jiff::{Span, Timestamp, Zoned};

use crate::Error;
use crate::datetime::{instance_key, resolve_zone};
use crate::event::Event;
use crate::recurrence::Recurrence;
use crate::types::{
    Alarm, Attendee, CalendarId, EventStatus, FreeBusy, PartStat, Role, Sensitivity,
};

const ICS_DATE: &str = "%Y%m%d";
const ICS_DATETIME: &str = "%Y%m%dT%H%M%S";
const ICS_UTC: &str = "%Y%m%dT%H%M%SZ";

/// A master event together with its exceptions.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarObject {
    pub master: Event,
    pub exceptions: Vec<Event>,
}

impl CalendarObject {
    /// A version tag derived from the revision data of every component.
    #[must_use]
    pub fn version(&self) -> String {
        std::iter::once(&self.master)
            .chain(&self.exceptions)
            .map(|e| format!("{}-{}", e.sequence, e.changed.as_second()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Decodes every `VEVENT` of an iCalendar document, grouped by UID in order of
/// first appearance.
///
/// Floating and unknown-zone times are read in `default_tz`. All-day end dates
/// are moved from the exclusive `DTEND` to 23:00 of the last day.
///
/// # Errors
///
/// Returns [`Error::Ics`] if the document cannot be parsed or an event lacks
/// `UID` or `DTSTART`.
pub fn decode(
    data: &str,
    calendar_id: CalendarId,
    default_tz: &TimeZone,
) -> Result<Vec<CalendarObject>, Error> {
    let unfolded = unfold(data);
    let calendar = read_calendar(&unfolded).map_err(|e| Error::Ics(e.to_string()))?;

    let mut order: Vec<String> = Vec::new();
    let mut masters: HashMap<String, Event> = HashMap::new();
    let mut overrides: HashMap<String, Vec<(Event, Zoned)>> = HashMap::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let event = decode_vevent(vevent, calendar_id, default_tz)?;
        if !order.contains(&event.uid) {
            order.push(event.uid.clone());
        }

        let rid = vevent
            .find_prop("RECURRENCE-ID")
            .and_then(|p| parse_time(p, default_tz))
            .map(|(z, _)| z);
        match rid {
            Some(rid) => overrides
                .entry(event.uid.clone())
                .or_default()
                .push((event, rid)),
            None => {
                masters.insert(event.uid.clone(), event);
            }
        }
    }

    let mut objects = Vec::with_capacity(order.len());
    for uid in order {
        let mut exceptions = overrides.remove(&uid).unwrap_or_default();
        let master = match masters.remove(&uid) {
            Some(master) => master,
            None => {
                // Overrides without their master are kept as a standalone event
                let (mut first, _) = exceptions.remove(0);
                first.is_exception = false;
                first
            }
        };

        let tz = master.start.time_zone().clone();
        let exceptions = exceptions
            .into_iter()
            .map(|(mut event, rid)| {
                event.is_exception = true;
                event.instance = instance_key(&rid.with_time_zone(tz.clone()), master.all_day);
                event
            })
            .collect();
        objects.push(CalendarObject { master, exceptions });
    }
    Ok(objects)
}

fn decode_vevent(
    vevent: &Component<'_>,
    calendar_id: CalendarId,
    default_tz: &TimeZone,
) -> Result<Event, Error> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| Error::Ics("VEVENT without UID".to_string()))?;
    let (start, all_day) = vevent
        .find_prop("DTSTART")
        .and_then(|p| parse_time(p, default_tz))
        .ok_or_else(|| Error::Ics(format!("VEVENT {uid} without valid DTSTART")))?;

    let end = match vevent.find_prop("DTEND").and_then(|p| parse_time(p, default_tz)) {
        Some((end, _)) if all_day => inclusive_all_day_end(&start, end.date()),
        Some((end, _)) if end >= start => end,
        _ => match vevent
            .find_prop("DURATION")
            .and_then(|p| p.val.as_ref().parse::<Span>().ok())
        {
            Some(span) if all_day => {
                let last = start.date().checked_add(span).unwrap_or_else(|_| start.date());
                inclusive_all_day_end(&start, last)
            }
            Some(span) => start.checked_add(span).unwrap_or_else(|_| start.clone()),
            None if all_day => inclusive_all_day_end(&start, start.date().tomorrow().unwrap_or(start.date())),
            None => start.clone(),
        },
    };

    let mut event = Event::new(calendar_id, String::new(), start, end);
    event.uid = uid;
    event.all_day = all_day;
    event.summary = text_prop(vevent, "SUMMARY").unwrap_or_default();
    event.description = text_prop(vevent, "DESCRIPTION").unwrap_or_default();
    event.location = text_prop(vevent, "LOCATION").unwrap_or_default();
    event.sequence = vevent
        .find_prop("SEQUENCE")
        .and_then(|p| p.val.as_ref().trim().parse().ok())
        .unwrap_or(0);
    event.status = vevent
        .find_prop("STATUS")
        .and_then(|p| p.val.as_ref().parse().ok())
        .unwrap_or(EventStatus::Confirmed);
    event.sensitivity = vevent
        .find_prop("CLASS")
        .and_then(|p| p.val.as_ref().parse().ok())
        .unwrap_or(Sensitivity::Public);
    event.free_busy = decode_free_busy(vevent);

    let tz = event.start.time_zone().clone();
    if let Some(rrule) = vevent.find_prop("RRULE") {
        let mut rule = Recurrence::parse(rrule.val.as_ref(), &tz)?;
        rule.exdates = vevent
            .properties
            .iter()
            .filter(|p| p.name == "EXDATE")
            .flat_map(|p| parse_time_list(p, &tz))
            .map(|z| instance_key(&z.with_time_zone(tz.clone()), all_day))
            .collect();
        event.recurrence = Some(rule);
    }

    let organizer = vevent.find_prop("ORGANIZER").map(|p| {
        let mut organizer = Attendee::organizer(mail_address(p.val.as_ref()));
        organizer.name = param(p, "CN");
        organizer
    });
    let attendees: Vec<Attendee> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(decode_attendee)
        .filter(|a| organizer.as_ref().is_none_or(|o| !o.email.eq_ignore_ascii_case(&a.email)))
        .collect();
    event.attendees = organizer.into_iter().chain(attendees).collect();

    event.alarms = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| alarm.find_prop("TRIGGER"))
        .filter_map(|trigger| decode_trigger(trigger, &event.start))
        .map(|offset_minutes| Alarm { offset_minutes })
        .collect();

    let created = timestamp_prop(vevent, "CREATED");
    let changed = timestamp_prop(vevent, "LAST-MODIFIED").or_else(|| timestamp_prop(vevent, "DTSTAMP"));
    if let Some(created) = created.or(changed) {
        event.created = created;
    }
    if let Some(changed) = changed.or(created) {
        event.changed = changed;
    }
    Ok(event)
}

fn inclusive_all_day_end(start: &Zoned, exclusive_end: Date) -> Zoned {
    // The day before the exclusive end, one hour before midnight
    exclusive_end
        .yesterday()
        .ok()
        .filter(|last| *last >= start.date())
        .unwrap_or(start.date())
        .at(23, 0, 0, 0)
        .to_zoned(start.time_zone().clone())
        .unwrap_or_else(|_| start.clone())
}

fn decode_free_busy(vevent: &Component<'_>) -> FreeBusy {
    let busy_status = vevent.find_prop("X-MICROSOFT-CDO-BUSYSTATUS").map(|p| p.val.to_string());
    match busy_status.as_deref() {
        Some("OOF") => return FreeBusy::OutOfOffice,
        Some("TENTATIVE") => return FreeBusy::Tentative,
        _ => {}
    }
    match vevent.find_prop("TRANSP") {
        Some(p) if p.val == "TRANSPARENT" => FreeBusy::Free,
        _ => FreeBusy::Busy,
    }
}

fn decode_attendee(prop: &Property<'_>) -> Attendee {
    let mut attendee = Attendee::new(mail_address(prop.val.as_ref()));
    attendee.name = param(prop, "CN");
    attendee.role = param(prop, "ROLE")
        .and_then(|r| r.parse().ok())
        .unwrap_or(Role::Required);
    attendee.status = param(prop, "PARTSTAT")
        .and_then(|s| s.parse().ok())
        .unwrap_or(PartStat::NeedsAction);
    attendee.rsvp = param(prop, "RSVP").is_some_and(|v| v.eq_ignore_ascii_case("TRUE"));
    attendee.delegated_to = param(prop, "DELEGATED-TO").map(|v| mail_address(&v));
    attendee
}

/// Reads a `TRIGGER` as minutes before the start.
fn decode_trigger(prop: &Property<'_>, start: &Zoned) -> Option<i64> {
    let value = prop.val.as_ref().trim();
    if param(prop, "VALUE").is_some_and(|v| v == "DATE-TIME") || value.ends_with('Z') {
        let at = parse_utc_value(value)?;
        return Some(at.duration_until(start.timestamp()).as_mins());
    }

    let (sign, iso) = match value.strip_prefix('-') {
        Some(rest) => (1, rest),
        None => (-1, value.trim_start_matches('+')),
    };
    let span: Span = iso.parse().ok()?;
    let minutes = i64::from(span.get_weeks()) * 7 * 24 * 60
        + i64::from(span.get_days()) * 24 * 60
        + i64::from(span.get_hours()) * 60
        + span.get_minutes()
        + span.get_seconds() / 60;
    Some(sign * minutes)
}

fn parse_utc_value(value: &str) -> Option<Timestamp> {
    DateTime::strptime(ICS_UTC, value)
        .ok()?
        .to_zoned(TimeZone::UTC)
        .ok()
        .map(|z| z.timestamp())
}

/// Parses a date or date-time property. Returns the time and whether it was a date.
fn parse_time(prop: &Property<'_>, default_tz: &TimeZone) -> Option<(Zoned, bool)> {
    let value = prop.val.as_ref().trim();
    let tz = param(prop, "TZID").map_or_else(|| default_tz.clone(), |name| resolve_zone(&name, default_tz));
    let is_date = param(prop, "VALUE").is_some_and(|v| v == "DATE") || value.len() == 8;
    parse_time_value(value, is_date, &tz).map(|z| (z, is_date))
}

fn parse_time_list(prop: &Property<'_>, default_tz: &TimeZone) -> Vec<Zoned> {
    let tz = param(prop, "TZID").map_or_else(|| default_tz.clone(), |name| resolve_zone(&name, default_tz));
    let date_param = param(prop, "VALUE").is_some_and(|v| v == "DATE");
    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .filter_map(|v| parse_time_value(v, date_param || v.len() == 8, &tz))
        .collect()
}

fn parse_time_value(value: &str, is_date: bool, tz: &TimeZone) -> Option<Zoned> {
    if is_date {
        let date = Date::strptime(ICS_DATE, value).ok()?;
        return date.at(0, 0, 0, 0).to_zoned(tz.clone()).ok();
    }
    if value.ends_with('Z') {
        let utc = DateTime::strptime(ICS_UTC, value).ok()?;
        return utc.to_zoned(TimeZone::UTC).ok();
    }
    DateTime::strptime(ICS_DATETIME, value)
        .ok()?
        .to_zoned(tz.clone())
        .ok()
}

fn timestamp_prop(vevent: &Component<'_>, name: &str) -> Option<Timestamp> {
    vevent
        .find_prop(name)
        .and_then(|p| parse_utc_value(p.val.as_ref().trim()))
}

fn text_prop(vevent: &Component<'_>, name: &str) -> Option<String> {
    vevent.find_prop(name).map(|p| unescape_text(p.val.as_ref()))
}

fn param(prop: &Property<'_>, key: &str) -> Option<String> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref().map(|v| v.as_ref().trim_matches('"').to_string()))
}

fn mail_address(value: &str) -> String {
    let value = value.trim().trim_matches('"');
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("mailto:") {
        value.get(7..).unwrap_or_default().to_string()
    } else {
        value.to_string()
    }
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Encodes a master and its exceptions as one iCalendar document.
#[must_use]
pub fn encode(master: &Event, exceptions: &[Event]) -> String {
    let mut calendar = Calendar::new();
    calendar.push(encode_vevent(master, None));
    for exception in exceptions {
        calendar.push(encode_vevent(exception, Some(master)));
    }
    calendar.done().to_string()
}

fn encode_vevent(event: &Event, master: Option<&Event>) -> icalendar::Event {
    let mut ev = icalendar::Event::new();
    ev.uid(&event.uid);
    ev.summary(&event.summary);
    ev.add_property("DTSTAMP", event.changed.strftime(ICS_UTC).to_string());
    ev.add_property("CREATED", event.created.strftime(ICS_UTC).to_string());
    ev.add_property("LAST-MODIFIED", event.changed.strftime(ICS_UTC).to_string());
    ev.add_property("SEQUENCE", event.sequence.to_string());

    if event.all_day {
        ev.append_property(date_property("DTSTART", event.start.date()));
        let end = event.end.date().tomorrow().unwrap_or(event.end.date());
        ev.append_property(date_property("DTEND", end));
    } else {
        ev.append_property(time_property("DTSTART", &event.start));
        ev.append_property(time_property("DTEND", &event.end));
    }

    if !event.description.is_empty() {
        ev.description(&event.description);
    }
    if !event.location.is_empty() {
        ev.location(&event.location);
    }
    ev.add_property("STATUS", event.status.as_ref());
    ev.add_property("CLASS", event.sensitivity.as_ref());
    match event.free_busy {
        FreeBusy::Free => {
            ev.add_property("TRANSP", "TRANSPARENT");
        }
        FreeBusy::Busy => {
            ev.add_property("TRANSP", "OPAQUE");
        }
        FreeBusy::Tentative => {
            ev.add_property("TRANSP", "OPAQUE");
            ev.add_property("X-MICROSOFT-CDO-BUSYSTATUS", "TENTATIVE");
        }
        FreeBusy::OutOfOffice => {
            ev.add_property("TRANSP", "OPAQUE");
            ev.add_property("X-MICROSOFT-CDO-BUSYSTATUS", "OOF");
        }
    }

    if let Some(rule) = event.recurrence.as_ref().filter(|_| master.is_none()) {
        ev.add_property("RRULE", rule.to_rrule());
        for key in &rule.exdates {
            ev.append_multi_property(instance_property("EXDATE", key, event));
        }
    }
    if let Some(master) = master {
        ev.append_property(instance_property("RECURRENCE-ID", &event.instance, master));
    }

    if let Some(organizer) = event.organizer() {
        let mut prop = icalendar::Property::new("ORGANIZER", format!("mailto:{}", organizer.email));
        if let Some(name) = &organizer.name {
            prop.add_parameter("CN", name);
        }
        ev.append_property(prop);
    }
    for attendee in event.attendees.iter().filter(|a| !a.is_organizer()) {
        let mut prop = icalendar::Property::new("ATTENDEE", format!("mailto:{}", attendee.email));
        if let Some(name) = &attendee.name {
            prop.add_parameter("CN", name);
        }
        prop.add_parameter("ROLE", attendee.role.as_ref());
        prop.add_parameter("PARTSTAT", attendee.status.as_ref());
        if attendee.rsvp {
            prop.add_parameter("RSVP", "TRUE");
        }
        if let Some(delegate) = &attendee.delegated_to {
            prop.add_parameter("DELEGATED-TO", &format!("\"mailto:{delegate}\""));
        }
        ev.append_multi_property(prop);
    }

    for alarm in &event.alarms {
        let minutes = chrono::Duration::minutes(alarm.offset_minutes.abs());
        let trigger = if alarm.offset_minutes >= 0 {
            icalendar::Trigger::before_start(minutes)
        } else {
            icalendar::Trigger::after_start(minutes)
        };
        let description = if event.summary.is_empty() { "Reminder" } else { &event.summary };
        ev.alarm(icalendar::Alarm::display(description, trigger));
    }

    ev.done()
}

fn date_property(name: &str, date: Date) -> icalendar::Property {
    let mut prop = icalendar::Property::new(name, date.strftime(ICS_DATE).to_string());
    prop.append_parameter(ValueType::Date);
    prop
}

fn time_property(name: &str, time: &Zoned) -> icalendar::Property {
    match time.time_zone().iana_name() {
        Some(tzid) if tzid != "UTC" && tzid != "Etc/UTC" => {
            let mut prop =
                icalendar::Property::new(name, time.datetime().strftime(ICS_DATETIME).to_string());
            prop.add_parameter("TZID", tzid);
            prop
        }
        _ => icalendar::Property::new(name, time.timestamp().strftime(ICS_UTC).to_string()),
    }
}

/// A property naming one instance of `master`'s series by its instance key.
fn instance_property(name: &str, key: &str, master: &Event) -> icalendar::Property {
    if master.all_day {
        let mut prop = icalendar::Property::new(name, key);
        prop.append_parameter(ValueType::Date);
        return prop;
    }
    match crate::datetime::parse_instance_key(key, master.start.time_zone()) {
        Some(nominal) => time_property(name, &nominal),
        None => icalendar::Property::new(name, key),
    }
}
