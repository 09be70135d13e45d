// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::{SignedDuration, Timestamp, Zoned};

use crate::datetime::{instance_key, parse_instance_key, reference_id};
use crate::recurrence::{Occurrence, Recurrence};
use crate::types::{
    Alarm, Attendee, CalendarId, EventId, EventStatus, FreeBusy, Role, Sensitivity,
};

/// A stored event row: a series master, a generated occurrence or an exception.
///
/// Masters have no `recurrence_id`. Rows owned by a master carry its id, the
/// master's `uid`, and the `instance` key of the occurrence they stand for.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// `None` until the row is stored.
    pub id: Option<EventId>,
    pub calendar_id: CalendarId,
    pub uid: String,

    /// The owning master, `None` for masters.
    pub recurrence_id: Option<EventId>,

    /// Explicit override of one occurrence; never regenerated.
    pub is_exception: bool,

    /// Instance key of the occurrence; empty for masters.
    pub instance: String,

    pub start: Zoned,

    /// End of the event. All-day events end at 23:00 of their last day.
    pub end: Zoned,
    pub all_day: bool,

    /// Recurrence rule, masters only.
    pub recurrence: Option<Recurrence>,

    /// Scheduling revision, only ever increased.
    pub sequence: i64,

    pub summary: String,
    pub description: String,
    pub location: String,
    pub free_busy: FreeBusy,
    pub sensitivity: Sensitivity,
    pub status: EventStatus,
    pub attendees: Vec<Attendee>,
    pub alarms: Vec<Alarm>,

    /// Remote href of the calendar object, masters only.
    pub url: Option<String>,

    /// Remote version of the calendar object, masters only.
    pub etag: Option<String>,

    pub created: Timestamp,
    pub changed: Timestamp,

    /// When the next alarm of this row fires.
    pub notify_at: Option<Timestamp>,
}

impl Event {
    /// Creates a standalone event with a fresh UID.
    #[must_use]
    pub fn new(calendar_id: CalendarId, summary: impl Into<String>, start: Zoned, end: Zoned) -> Self {
        let now = Timestamp::now();
        Self {
            id: None,
            calendar_id,
            uid: new_uid(),
            recurrence_id: None,
            is_exception: false,
            instance: String::new(),
            start,
            end,
            all_day: false,
            recurrence: None,
            sequence: 0,
            summary: summary.into(),
            description: String::new(),
            location: String::new(),
            free_busy: FreeBusy::default(),
            sensitivity: Sensitivity::default(),
            status: EventStatus::default(),
            attendees: Vec::new(),
            alarms: Vec::new(),
            url: None,
            etag: None,
            created: now,
            changed: now,
            notify_at: None,
        }
    }

    /// Whether the row is a series master or a standalone event.
    #[must_use]
    pub const fn is_master(&self) -> bool {
        self.recurrence_id.is_none()
    }

    /// Whether the row belongs to a recurring series.
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.recurrence.is_some() || self.recurrence_id.is_some()
    }

    /// Public reference: `uid` for masters, `uid@instance` otherwise.
    #[must_use]
    pub fn reference(&self) -> String {
        reference_id(&self.uid, &self.instance)
    }

    /// Instance key of the master's own first occurrence.
    #[must_use]
    pub fn base_instance(&self) -> String {
        instance_key(&self.start, self.all_day)
    }

    /// The instance key this row stands for: its own key, or the base key for a master.
    #[must_use]
    pub fn instance_key(&self) -> String {
        if self.instance.is_empty() {
            self.base_instance()
        } else {
            self.instance.clone()
        }
    }

    /// Nominal start of the occurrence this row stands for, read in `master`'s zone.
    #[must_use]
    pub fn nominal_start(&self, master: &Event) -> Option<Zoned> {
        if self.is_master() {
            return Some(self.start.clone());
        }
        parse_instance_key(&self.instance, master.start.time_zone())
    }

    /// The organizer, stored as an attendee with the organizer role.
    #[must_use]
    pub fn organizer(&self) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.role == Role::Organizer)
    }

    /// Length of the event in wall-clock time.
    #[must_use]
    pub fn duration(&self) -> SignedDuration {
        crate::datetime::civil_delta(&self.start, &self.end)
    }

    /// The earliest alarm at or after `now`, if any.
    #[must_use]
    pub fn next_alarm(&self, now: Timestamp) -> Option<Timestamp> {
        self.alarms
            .iter()
            .filter_map(|alarm| {
                let offset = SignedDuration::from_mins(alarm.offset_minutes);
                self.start.timestamp().checked_sub(offset).ok()
            })
            .filter(|at| *at >= now)
            .min()
    }

    /// Builds the generated row standing for one occurrence of this master.
    pub(crate) fn occurrence(&self, occurrence: &Occurrence, now: Timestamp) -> Event {
        let mut row = Event {
            id: None,
            recurrence_id: self.id,
            is_exception: false,
            instance: occurrence.instance.clone(),
            start: occurrence.start.clone(),
            end: occurrence.end.clone(),
            recurrence: None,
            url: None,
            etag: None,
            notify_at: None,
            ..self.clone()
        };
        row.notify_at = row.next_alarm(now);
        row
    }

    /// Copies the event into a new, independent series.
    pub(crate) fn detached(&self) -> Event {
        Event {
            id: None,
            uid: new_uid(),
            recurrence_id: None,
            is_exception: false,
            instance: String::new(),
            sequence: 0,
            url: None,
            etag: None,
            ..self.clone()
        }
    }
}

pub(crate) fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}
