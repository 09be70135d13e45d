// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, fmt};

use calsync_core::{Event, EventStatus};
use colored::Color;
use jiff::Timestamp;

use crate::table::{Column, PaddingDirection, Table};
use crate::util::{OutputFormat, ellipsize, format_span};

#[derive(Debug)]
pub struct EventFormatter {
    columns: Vec<EventColumn>,
    now: Timestamp,
    format: OutputFormat,
}

impl EventFormatter {
    pub fn new(now: Timestamp, columns: Vec<EventColumn>) -> Self {
        Self {
            columns,
            now,
            format: OutputFormat::Table,
        }
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format<'a>(&'a self, events: &'a [Event]) -> Display<'a> {
        Display {
            events,
            formatter: self,
        }
    }
}

pub struct Display<'a> {
    events: &'a [Event],
    formatter: &'a EventFormatter,
}

impl fmt::Display for Display<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<Bound<'_>> = self
            .formatter
            .columns
            .iter()
            .map(|column| Bound {
                column,
                now: self.formatter.now,
            })
            .collect();
        write!(
            f,
            "{}",
            Table::new(&columns, self.events, self.formatter.format)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventColumn {
    Id,
    Reference,
    Span,
    Summary,
    Location,
    Flags,
}

impl EventColumn {
    fn name(self) -> &'static str {
        match self {
            EventColumn::Id => "Id",
            EventColumn::Reference => "Reference",
            EventColumn::Span => "Time Range",
            EventColumn::Summary => "Summary",
            EventColumn::Location => "Location",
            EventColumn::Flags => "Flags",
        }
    }

    fn format(self, event: &Event, width: Option<usize>) -> Cow<'_, str> {
        match self {
            EventColumn::Id => event.id.map(|id| id.to_string()).unwrap_or_default().into(),
            EventColumn::Reference => event.reference().into(),
            EventColumn::Span => format_span(&event.start, &event.end, event.all_day).into(),
            EventColumn::Summary => match width {
                Some(width) => ellipsize(&event.summary, width).into(),
                None => event.summary.as_str().into(),
            },
            EventColumn::Location => event.location.as_str().into(),
            EventColumn::Flags => flags(event).into(),
        }
    }
}

/// A column bound to the time it is rendered at.
struct Bound<'a> {
    column: &'a EventColumn,
    now: Timestamp,
}

const SUMMARY_WIDTH: usize = 48;

impl Column<Event> for Bound<'_> {
    fn name(&self) -> Cow<'_, str> {
        self.column.name().into()
    }

    fn format<'a>(&self, data: &'a Event) -> Cow<'a, str> {
        self.column.format(data, Some(SUMMARY_WIDTH))
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self.column {
            EventColumn::Id => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn color(&self, event: &Event) -> Option<Color> {
        if event.status == EventStatus::Cancelled || event.end.timestamp() < self.now {
            Some(Color::BrightBlack)
        } else if *self.column == EventColumn::Span && event.start.timestamp() <= self.now {
            Some(Color::Yellow)
        } else {
            None
        }
    }
}

/// Short markers: `R` recurring, `E` exception, `A` alarm, `C` cancelled.
fn flags(event: &Event) -> String {
    let mut out = String::new();
    if event.is_recurring() {
        out.push('R');
    }
    if event.is_exception {
        out.push('E');
    }
    if !event.alarms.is_empty() {
        out.push('A');
    }
    if event.status == EventStatus::Cancelled {
        out.push('C');
    }
    out
}

/// Multi-line view of one event and its exceptions.
pub fn describe(event: &Event, exceptions: &[Event]) -> String {
    let mut lines = vec![
        format!("Summary:   {}", event.summary),
        format!(
            "When:      {}",
            format_span(&event.start, &event.end, event.all_day)
        ),
        format!("Reference: {}", event.reference()),
        format!("Status:    {}", event.status),
    ];
    if let Some(id) = event.id {
        lines.insert(0, format!("Id:        {id}"));
    }
    if !event.location.is_empty() {
        lines.push(format!("Location:  {}", event.location));
    }
    if let Some(rule) = &event.recurrence {
        lines.push(format!("Repeats:   {}", rule.to_rrule()));
    }
    if let Some(organizer) = event.organizer() {
        lines.push(format!("Organizer: {}", organizer.email));
    }
    for attendee in event.attendees.iter().filter(|a| a.role != calsync_core::Role::Organizer) {
        lines.push(format!("Attendee:  {} ({})", attendee.email, attendee.status));
    }
    if !event.description.is_empty() {
        lines.push(String::new());
        lines.push(event.description.clone());
    }
    for exception in exceptions {
        lines.push(format!(
            "Exception: {} {}",
            exception.instance,
            format_span(&exception.start, &exception.end, exception.all_day)
        ));
    }
    lines.join("\n")
}
