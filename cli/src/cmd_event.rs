// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use calsync_core::{
    Agenda, Alarm, CalendarFilter, CalendarId, Event, EventId, EventQuery, EventRef, EventStatus,
    Frequency, Recurrence, SaveMode,
};
use clap::{Arg, ArgAction, ArgMatches, Command, arg, value_parser};
use colored::Colorize;
use jiff::{SignedDuration, Timestamp, Zoned};

use crate::arg::{CommonArgs, EventArgs};
use crate::config::Config;
use crate::event_formatter::{EventColumn, EventFormatter, describe};
use crate::util::{OutputFormat, parse_datetime, parse_datetime_range};

#[derive(Debug, Clone)]
pub struct CmdEventList {
    pub days: Option<i64>,
    pub query: Option<String>,
    pub calendars: Option<Vec<CalendarId>>,
    pub include_virtual: bool,

    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl Default for CmdEventList {
    fn default() -> Self {
        Self {
            days: None,
            query: None,
            calendars: None,
            include_virtual: false,

            output_format: OutputFormat::Table,
            verbose: false,
        }
    }
}

impl CmdEventList {
    pub const NAME: &str = "list";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("ls")
            .about("List upcoming events")
            .arg(
                arg!(--days <DAYS> "How many days ahead to look")
                    .value_parser(value_parser!(i64).range(1..)),
            )
            .arg(arg!(-q --query <TEXT> "Only events mentioning this text"))
            .arg(CommonArgs::calendars())
            .arg(
                Arg::new("virtual")
                    .long("virtual")
                    .action(ArgAction::SetTrue)
                    .help("Include calendars mirrored from .ics files"),
            )
            .arg(CommonArgs::output_format())
            .arg(CommonArgs::verbose())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            days: matches.get_one("days").copied(),
            query: matches.get_one("query").cloned(),
            calendars: CommonArgs::get_calendars(matches),
            include_virtual: matches.get_flag("virtual"),

            output_format: CommonArgs::get_output_format(matches),
            verbose: CommonArgs::get_verbose(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda, config: &Config) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "listing events...");
        let now = Timestamp::now();
        let days = self.days.unwrap_or(config.days);
        let end = now.checked_add(SignedDuration::from_hours(24 * days))?;
        let query = EventQuery {
            start: Some(now),
            end: Some(end),
            query: self.query,
            calendar_ids: self.calendars,
            include_virtual: self.include_virtual,
            modified_since: None,
        };

        let mut events = agenda.load_events(&query).await?;
        let total = events.len();
        events.truncate(config.max_events);

        if events.is_empty() && self.output_format == OutputFormat::Table {
            println!("{}", "No upcoming events".italic());
            return Ok(());
        }
        print_events(now, &events, self.output_format, self.verbose);
        if total > events.len() && self.output_format == OutputFormat::Table {
            println!(
                "{}",
                format!("... {} more not shown", total - events.len()).italic()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdEventShow {
    pub reference: EventRef,
}

impl CmdEventShow {
    pub const NAME: &str = "show";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Show an event and the exceptions of its series")
            .arg(EventArgs::reference())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            reference: EventArgs::get_reference(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "showing event...");
        let details = agenda
            .get_event(&self.reference, CalendarFilter::All, true)
            .await?
            .ok_or("Event not found")?;
        println!("{}", describe(&details.event, &details.exceptions));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdEventNew {
    pub summary: String,
    pub start: String,
    pub end: Option<String>,
    pub calendar: Option<CalendarId>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<EventStatus>,
    pub repeat: Option<Frequency>,
    pub count: Option<u32>,
    pub alarm: Option<i64>,

    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl CmdEventNew {
    pub const NAME: &str = "new";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("add")
            .about("Add a new event")
            .arg(EventArgs::summary(true))
            .arg(EventArgs::start().required(true))
            .arg(EventArgs::end())
            .arg(CommonArgs::calendar())
            .arg(EventArgs::description())
            .arg(EventArgs::location())
            .arg(EventArgs::status())
            .arg(EventArgs::repeat())
            .arg(EventArgs::count().requires("repeat"))
            .arg(EventArgs::alarm())
            .arg(CommonArgs::output_format())
            .arg(CommonArgs::verbose())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            summary: EventArgs::get_summary(matches).unwrap_or_default(),
            start: EventArgs::get_start(matches).unwrap_or_default(),
            end: EventArgs::get_end(matches),
            calendar: CommonArgs::get_calendar(matches),
            description: EventArgs::get_description(matches),
            location: EventArgs::get_location(matches),
            status: EventArgs::get_status(matches),
            repeat: EventArgs::get_repeat(matches),
            count: EventArgs::get_count(matches),
            alarm: EventArgs::get_alarm(matches),

            output_format: CommonArgs::get_output_format(matches),
            verbose: CommonArgs::get_verbose(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "adding new event...");
        let now = Timestamp::now().to_zoned(agenda.time_zone().clone());
        let (start, end, all_day) = parse_datetime_range(&now, &self.start, self.end.as_deref())?;

        let calendar_id = match self.calendar {
            Some(id) => id,
            None => agenda
                .list_calendars(CalendarFilter::Writable)
                .await?
                .first()
                .map(|c| c.id)
                .ok_or("No writable calendar, add one with `calendar new`")?,
        };

        let mut event = Event::new(calendar_id, self.summary, start, end);
        event.all_day = all_day;
        event.description = self.description.unwrap_or_default();
        event.location = self.location.unwrap_or_default();
        event.status = self.status.unwrap_or_default();
        event.recurrence = self.repeat.map(|freq| Recurrence {
            count: self.count,
            ..Recurrence::new(freq)
        });
        if let Some(minutes) = self.alarm {
            event.alarms.push(Alarm {
                offset_minutes: minutes,
            });
        }

        let event = agenda.new_event(event).await?;
        print_events(now.timestamp(), &[event], self.output_format, self.verbose);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdEventEdit {
    pub id: EventId,
    pub mode: SaveMode,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<EventStatus>,
    pub alarm: Option<i64>,

    pub output_format: OutputFormat,
    pub verbose: bool,
}

impl CmdEventEdit {
    pub const NAME: &str = "edit";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Edit an event")
            .arg(EventArgs::id())
            .arg(EventArgs::mode())
            .arg(EventArgs::summary(false))
            .arg(EventArgs::start())
            .arg(EventArgs::end())
            .arg(EventArgs::description())
            .arg(EventArgs::location())
            .arg(EventArgs::status())
            .arg(EventArgs::alarm())
            .arg(CommonArgs::output_format())
            .arg(CommonArgs::verbose())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: EventArgs::get_id(matches),
            mode: EventArgs::get_mode(matches),
            summary: EventArgs::get_summary(matches),
            start: EventArgs::get_start(matches),
            end: EventArgs::get_end(matches),
            description: EventArgs::get_description(matches),
            location: EventArgs::get_location(matches),
            status: EventArgs::get_status(matches),
            alarm: EventArgs::get_alarm(matches),

            output_format: CommonArgs::get_output_format(matches),
            verbose: CommonArgs::get_verbose(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "editing event...");
        let now = Timestamp::now().to_zoned(agenda.time_zone().clone());
        let mut event = agenda
            .get_event(&EventRef::Id(self.id), CalendarFilter::Writable, false)
            .await?
            .ok_or("Event not found in a writable calendar")?
            .event;

        apply_times(&now, &mut event, self.start.as_deref(), self.end.as_deref())?;
        if let Some(summary) = self.summary {
            event.summary = summary;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(minutes) = self.alarm {
            event.alarms = vec![Alarm {
                offset_minutes: minutes,
            }];
        }

        let event = agenda
            .edit_event(event, self.mode)
            .await?
            .ok_or("Event not found in a writable calendar")?;
        print_events(now.timestamp(), &[event], self.output_format, self.verbose);
        Ok(())
    }
}

/// Replaces the bounds of `event` with the ones typed by the user, keeping the
/// length when only the start changes.
fn apply_times(
    now: &Zoned,
    event: &mut Event,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    match (start, end) {
        (Some(start), end) => {
            let length = event.duration();
            let (start, parsed_end, all_day) = parse_datetime_range(now, start, end)?;
            event.end = match end {
                Some(_) => parsed_end,
                None if all_day == event.all_day => start.checked_add(length)?,
                None => parsed_end,
            };
            event.start = start;
            event.all_day = all_day;
        }
        (None, Some(end)) => {
            event.end = parse_datetime(now, end)?.to_zoned(now.time_zone())?;
        }
        (None, None) => {}
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CmdEventMove {
    pub id: EventId,
    pub start: String,
    pub mode: SaveMode,

    pub output_format: OutputFormat,
}

impl CmdEventMove {
    pub const NAME: &str = "move";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("mv")
            .about("Move an event to a new start, keeping its length")
            .arg(EventArgs::id())
            .arg(arg!(start: <START> "New start: YYYY-MM-DD HH:MM or HH:MM today"))
            .arg(EventArgs::mode())
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: EventArgs::get_id(matches),
            start: matches.get_one::<String>("start").cloned().unwrap_or_default(),
            mode: EventArgs::get_mode(matches),
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "moving event...");
        let now = Timestamp::now().to_zoned(agenda.time_zone().clone());
        let start = parse_datetime(&now, &self.start)?.to_zoned(agenda.time_zone())?;
        let event = agenda
            .move_event(self.id, start, self.mode)
            .await?
            .ok_or("Event not found in a writable calendar")?;
        print_events(now.timestamp(), &[event], self.output_format, false);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdEventResize {
    pub id: EventId,
    pub end: String,
    pub mode: SaveMode,

    pub output_format: OutputFormat,
}

impl CmdEventResize {
    pub const NAME: &str = "resize";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Change the end of an event, keeping its start")
            .arg(EventArgs::id())
            .arg(arg!(end: <END> "New end: YYYY-MM-DD HH:MM or HH:MM today"))
            .arg(EventArgs::mode())
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: EventArgs::get_id(matches),
            end: matches.get_one::<String>("end").cloned().unwrap_or_default(),
            mode: EventArgs::get_mode(matches),
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "resizing event...");
        let now = Timestamp::now().to_zoned(agenda.time_zone().clone());
        let end = parse_datetime(&now, &self.end)?.to_zoned(agenda.time_zone())?;
        let event = agenda
            .resize_event(self.id, end, self.mode)
            .await?
            .ok_or("Event not found in a writable calendar")?;
        print_events(now.timestamp(), &[event], self.output_format, false);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdEventRemove {
    pub id: EventId,
    pub mode: SaveMode,
}

impl CmdEventRemove {
    pub const NAME: &str = "remove";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("rm")
            .about("Remove an event, an occurrence, or the rest of a series")
            .arg(EventArgs::id())
            .arg(EventArgs::mode())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: EventArgs::get_id(matches),
            mode: EventArgs::get_mode(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "removing event...");
        if agenda.remove_event(self.id, self.mode).await? {
            println!("Removed event {}", self.id);
            Ok(())
        } else {
            Err("Event not found in a writable calendar".into())
        }
    }
}

fn print_events(now: Timestamp, events: &[Event], output_format: OutputFormat, verbose: bool) {
    let columns = if verbose {
        vec![
            EventColumn::Id,
            EventColumn::Reference,
            EventColumn::Span,
            EventColumn::Summary,
            EventColumn::Location,
            EventColumn::Flags,
        ]
    } else {
        vec![
            EventColumn::Id,
            EventColumn::Span,
            EventColumn::Summary,
            EventColumn::Flags,
        ]
    };
    let formatter = EventFormatter::new(now, columns).with_output_format(output_format);
    println!("{}", formatter.format(events));
}
