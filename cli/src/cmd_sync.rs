// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use calsync_core::{Agenda, CalendarFilter, CalendarId, EventId};
use clap::{ArgMatches, Command, arg, value_parser};
use colored::Colorize;
use futures::future::join_all;
use jiff::Timestamp;

use crate::arg::{CommonArgs, EventArgs};
use crate::event_formatter::{EventColumn, EventFormatter};
use crate::util::OutputFormat;

#[derive(Debug, Clone)]
pub struct CmdSync {
    pub calendars: Option<Vec<CalendarId>>,
}

impl CmdSync {
    pub const NAME: &str = "sync";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Bring calendars up to date with their origin now")
            .arg(CommonArgs::calendars())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            calendars: CommonArgs::get_calendars(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "synchronizing calendars...");
        let ids: Vec<CalendarId> = match self.calendars {
            Some(ids) => ids,
            None => agenda
                .list_calendars(CalendarFilter::Active)
                .await?
                .into_iter()
                .filter(|c| c.is_synced())
                .map(|c| c.id)
                .collect(),
        };
        if ids.is_empty() {
            println!("{}", "Nothing to synchronize".italic());
            return Ok(());
        }

        let results = join_all(ids.iter().map(|&id| agenda.sync_now(id))).await;
        let mut failed = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Some(report)) => println!(
                    "Calendar {id}: {} created, {} updated, {} deleted",
                    report.created, report.updated, report.deleted
                ),
                Ok(None) => {
                    failed += 1;
                    println!("{} calendar {id} not found", "Error:".red());
                }
                Err(e) => {
                    failed += 1;
                    println!("{} calendar {id}: {e}", "Error:".red());
                }
            }
        }

        if failed > 0 {
            return Err(format!("{failed} calendar(s) failed to synchronize").into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdAlarms {
    pub calendars: Option<Vec<CalendarId>>,
    pub output_format: OutputFormat,
}

impl CmdAlarms {
    pub const NAME: &str = "alarms";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("List events whose reminder is due")
            .arg(CommonArgs::calendars())
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            calendars: CommonArgs::get_calendars(matches),
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "listing due alarms...");
        let now = Timestamp::now();
        let events = agenda
            .pending_alarms(now, self.calendars.as_deref())
            .await?;
        if events.is_empty() && self.output_format == OutputFormat::Table {
            println!("{}", "No reminders due".italic());
            return Ok(());
        }

        let columns = vec![
            EventColumn::Id,
            EventColumn::Span,
            EventColumn::Summary,
            EventColumn::Location,
        ];
        let formatter = EventFormatter::new(now, columns).with_output_format(self.output_format);
        println!("{}", formatter.format(&events));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdDismiss {
    pub id: EventId,
    pub snooze_minutes: Option<i64>,
}

impl CmdDismiss {
    pub const NAME: &str = "dismiss";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Silence the reminder of an event, or snooze it")
            .arg(EventArgs::id())
            .arg(
                arg!(--snooze <MINUTES> "Remind again after this many minutes")
                    .value_parser(value_parser!(i64).range(1..)),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: EventArgs::get_id(matches),
            snooze_minutes: matches.get_one("snooze").copied(),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "dismissing alarm...");
        let snooze_secs = self.snooze_minutes.map_or(0, |m| m * 60);
        if !agenda.dismiss_alarm(self.id, snooze_secs).await? {
            return Err("Event not found".into());
        }
        match self.snooze_minutes {
            Some(minutes) => println!("Snoozed event {} for {minutes} minute(s)", self.id),
            None => println!("Dismissed reminder of event {}", self.id),
        }
        Ok(())
    }
}
