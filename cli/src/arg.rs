// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use calsync_core::{CalendarFilter, CalendarId, EventRef, EventStatus, Frequency, SaveMode};
use clap::{Arg, ArgMatches, arg, value_parser};

use crate::util::OutputFormat;

#[derive(Debug, Clone, Copy)]
pub struct CommonArgs;

impl CommonArgs {
    pub fn verbose() -> Arg {
        arg!(-v --verbose "Show more detailed information")
    }

    pub fn get_verbose(matches: &ArgMatches) -> bool {
        matches.get_flag("verbose")
    }

    pub fn output_format() -> Arg {
        arg!(--"output-format" <FORMAT> "Output format")
            .value_parser(value_parser!(OutputFormat))
            .default_value("table")
    }

    pub fn get_output_format(matches: &ArgMatches) -> OutputFormat {
        matches
            .get_one("output-format")
            .copied()
            .unwrap_or(OutputFormat::Table)
    }

    pub fn calendar() -> Arg {
        arg!(--calendar <ID> "Calendar id").value_parser(value_parser!(i64))
    }

    pub fn get_calendar(matches: &ArgMatches) -> Option<CalendarId> {
        matches.get_one::<i64>("calendar").copied().map(CalendarId)
    }

    pub fn calendars() -> Arg {
        arg!(--calendar <ID> "Only these calendars")
            .value_parser(value_parser!(i64))
            .num_args(1..)
    }

    pub fn get_calendars(matches: &ArgMatches) -> Option<Vec<CalendarId>> {
        matches
            .get_many::<i64>("calendar")
            .map(|ids| ids.copied().map(CalendarId).collect())
    }

    pub fn filter() -> Arg {
        arg!(--filter <FILTER> "Which calendars to include")
            .value_parser(value_parser!(CalendarFilter))
            .default_value("all")
    }

    pub fn get_filter(matches: &ArgMatches) -> CalendarFilter {
        matches.get_one("filter").copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventArgs;

impl EventArgs {
    pub fn id() -> Arg {
        arg!(id: <ID> "The row id of the event").value_parser(value_parser!(i64))
    }

    pub fn get_id(matches: &ArgMatches) -> calsync_core::EventId {
        let id = matches.get_one::<i64>("id").copied().unwrap_or_default();
        calsync_core::EventId(id)
    }

    pub fn reference() -> Arg {
        arg!(reference: <REF> "Row id, UID, or UID@instance of the event")
    }

    pub fn get_reference(matches: &ArgMatches) -> EventRef {
        let reference = matches
            .get_one::<String>("reference")
            .map_or("", String::as_str);
        let Ok(reference) = reference.parse::<EventRef>();
        reference
    }

    pub fn summary(positional: bool) -> Arg {
        if positional {
            arg!(summary: <SUMMARY> "Summary of the event")
        } else {
            arg!(summary: -s --summary <SUMMARY> "Summary of the event")
        }
    }

    pub fn get_summary(matches: &ArgMatches) -> Option<String> {
        matches.get_one("summary").cloned()
    }

    pub fn description() -> Arg {
        arg!(--description <DESCRIPTION> "Description of the event")
    }

    pub fn get_description(matches: &ArgMatches) -> Option<String> {
        matches.get_one("description").cloned()
    }

    pub fn location() -> Arg {
        arg!(--location <LOCATION> "Location of the event")
    }

    pub fn get_location(matches: &ArgMatches) -> Option<String> {
        matches.get_one("location").cloned()
    }

    pub fn start() -> Arg {
        arg!(--start <START> "Start: YYYY-MM-DD HH:MM, YYYY-MM-DD for all-day, or HH:MM today")
    }

    pub fn get_start(matches: &ArgMatches) -> Option<String> {
        matches.get_one("start").cloned()
    }

    pub fn end() -> Arg {
        arg!(--end <END> "End of the event, defaults to one hour after the start")
    }

    pub fn get_end(matches: &ArgMatches) -> Option<String> {
        matches.get_one("end").cloned()
    }

    pub fn status() -> Arg {
        arg!(--status <STATUS> "Status of the event").value_parser(value_parser!(EventStatus))
    }

    pub fn get_status(matches: &ArgMatches) -> Option<EventStatus> {
        matches.get_one("status").copied()
    }

    pub fn mode() -> Arg {
        arg!(-m --mode <MODE> "Which occurrences of a series to change")
            .value_parser(value_parser!(SaveMode))
            .default_value("current")
    }

    pub fn get_mode(matches: &ArgMatches) -> SaveMode {
        matches.get_one("mode").copied().unwrap_or(SaveMode::Current)
    }

    pub fn repeat() -> Arg {
        arg!(--repeat <FREQ> "Repeat daily, weekly, monthly, or yearly").value_parser(parse_frequency)
    }

    pub fn get_repeat(matches: &ArgMatches) -> Option<Frequency> {
        matches.get_one("repeat").copied()
    }

    pub fn count() -> Arg {
        arg!(--count <COUNT> "Number of occurrences").value_parser(value_parser!(u32).range(1..))
    }

    pub fn get_count(matches: &ArgMatches) -> Option<u32> {
        matches.get_one("count").copied()
    }

    pub fn alarm() -> Arg {
        arg!(--alarm <MINUTES> "Remind this many minutes before the start")
            .value_parser(value_parser!(i64))
    }

    pub fn get_alarm(matches: &ArgMatches) -> Option<i64> {
        matches.get_one("alarm").copied()
    }
}

fn parse_frequency(s: &str) -> Result<Frequency, String> {
    s.to_ascii_uppercase().parse().map_err(|e| format!("{e}"))
}
