// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, error::Error, path::PathBuf};

use calsync_core::{Agenda, Calendar, CalendarFilter, NewCalendar, NewSource, expand_path};
use clap::{ArgMatches, Command, arg, value_parser};
use colored::{Color, Colorize};

use crate::arg::CommonArgs;
use crate::table::{Column, PaddingDirection, Table};
use crate::util::OutputFormat;

#[derive(Debug, Clone, Copy)]
pub struct CmdCalendarList {
    pub filter: CalendarFilter,
    pub output_format: OutputFormat,
}

impl CmdCalendarList {
    pub const NAME: &str = "list";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("ls")
            .about("List calendars")
            .arg(CommonArgs::filter())
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            filter: CommonArgs::get_filter(matches),
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "listing calendars...");
        let calendars = agenda.list_calendars(self.filter).await?;
        if calendars.is_empty() && self.output_format == OutputFormat::Table {
            println!("{}", "No calendars found".italic());
            return Ok(());
        }
        print_calendars(&calendars, self.output_format);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdCalendarNew {
    pub name: String,
    pub ics: Option<PathBuf>,
    pub color: Option<String>,
}

impl CmdCalendarNew {
    pub const NAME: &str = "new";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("add")
            .about("Add a local calendar, or one mirroring an .ics file")
            .arg(arg!(name: <NAME> "Name of the calendar"))
            .arg(
                arg!(--ics <PATH> "Mirror this .ics file, read-only")
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(arg!(--color <COLOR> "Display color, e.g. #336699"))
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            name: matches.get_one::<String>("name").cloned().unwrap_or_default(),
            ics: matches.get_one("ics").cloned(),
            color: matches.get_one("color").cloned(),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "adding calendar...");
        let mut calendar = match self.ics {
            Some(path) => {
                let path = expand_path(&path)?;
                let path = path.to_str().ok_or("Invalid path")?.to_string();
                NewCalendar::ics_file(self.name, path)
            }
            None => NewCalendar::local(self.name),
        };
        calendar.color = self.color;

        let calendar = agenda.create_calendar(calendar).await?;
        print_calendars(&[calendar], OutputFormat::Table);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdSourceAdd {
    pub name: String,
    pub base_url: String,
    pub principal: String,
    pub credential: Option<String>,
}

impl CmdSourceAdd {
    pub const NAME: &str = "add-source";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Register a CalDAV account and add every calendar found on it")
            .arg(arg!(name: <NAME> "Name of the account"))
            .arg(arg!(url: <URL> "Base URL of the server"))
            .arg(arg!(principal: <PRINCIPAL> "Principal path the calendars are found under"))
            .arg(arg!(--credential <NAME> "Name of the credentials in the configuration"))
    }

    pub fn from(matches: &ArgMatches) -> Self {
        let get = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
        Self {
            name: get("name"),
            base_url: get("url"),
            principal: get("principal"),
            credential: matches.get_one("credential").cloned(),
        }
    }

    pub async fn run(self, agenda: &Agenda) -> Result<(), Box<dyn Error>> {
        tracing::debug!(name = %self.name, url = %self.base_url, "adding source...");
        let calendars = agenda
            .create_source(NewSource {
                name: self.name,
                base_url: self.base_url,
                principal: self.principal,
                credential: self.credential,
            })
            .await?;
        println!("Found {} calendar(s)", calendars.len());
        print_calendars(&calendars, OutputFormat::Table);
        Ok(())
    }
}

fn print_calendars(calendars: &[Calendar], output_format: OutputFormat) {
    let columns = [
        CalendarColumn::Id,
        CalendarColumn::Name,
        CalendarColumn::Kind,
        CalendarColumn::Url,
        CalendarColumn::Flags,
    ];
    println!("{}", Table::new(&columns, calendars, output_format));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarColumn {
    Id,
    Name,
    Kind,
    Url,
    Flags,
}

impl Column<Calendar> for CalendarColumn {
    fn name(&self) -> Cow<'_, str> {
        match self {
            CalendarColumn::Id => "Id",
            CalendarColumn::Name => "Name",
            CalendarColumn::Kind => "Kind",
            CalendarColumn::Url => "Url",
            CalendarColumn::Flags => "Flags",
        }
        .into()
    }

    fn format<'a>(&self, data: &'a Calendar) -> Cow<'a, str> {
        match self {
            CalendarColumn::Id => data.id.to_string().into(),
            CalendarColumn::Name => data.name.as_str().into(),
            CalendarColumn::Kind => data.kind.to_string().into(),
            CalendarColumn::Url => data.url.as_deref().unwrap_or_default().into(),
            CalendarColumn::Flags => {
                let mut flags = String::new();
                if !data.active {
                    flags.push_str("hidden ");
                }
                if !data.is_writable() {
                    flags.push_str("read-only");
                }
                flags.trim_end().to_string().into()
            }
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            CalendarColumn::Id => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn color(&self, data: &Calendar) -> Option<Color> {
        (!data.active).then_some(Color::BrightBlack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    #[test]
    fn test_parse_calendar_new() {
        let cmd = Command::new("test")
            .subcommand_required(true)
            .subcommand(CmdCalendarNew::command());

        let matches = cmd
            .try_get_matches_from(["test", "new", "Holidays", "--ics", "/tmp/holidays.ics"])
            .unwrap();
        let sub_matches = matches.subcommand_matches("new").unwrap();
        let parsed = CmdCalendarNew::from(sub_matches);

        assert_eq!(parsed.name, "Holidays");
        assert_eq!(parsed.ics, Some(PathBuf::from("/tmp/holidays.ics")));
        assert_eq!(parsed.color, None);
    }

    #[test]
    fn test_parse_source_add() {
        let cmd = Command::new("test")
            .subcommand_required(true)
            .subcommand(CmdSourceAdd::command());

        let matches = cmd
            .try_get_matches_from([
                "test",
                "add-source",
                "Work",
                "https://dav.example.com",
                "/principals/me/",
                "--credential",
                "work",
            ])
            .unwrap();
        let sub_matches = matches.subcommand_matches("add-source").unwrap();
        let parsed = CmdSourceAdd::from(sub_matches);

        assert_eq!(parsed.base_url, "https://dav.example.com");
        assert_eq!(parsed.principal, "/principals/me/");
        assert_eq!(parsed.credential.as_deref(), Some("work"));
    }

    #[test]
    fn test_parse_calendar_list() {
        let cmd = Command::new("test")
            .subcommand_required(true)
            .subcommand(CmdCalendarList::command());

        let matches = cmd
            .try_get_matches_from(["test", "list", "--filter", "remote", "--output-format", "json"])
            .unwrap();
        let sub_matches = matches.subcommand_matches("list").unwrap();
        let parsed = CmdCalendarList::from(sub_matches);

        assert_eq!(parsed.filter, CalendarFilter::Remote);
        assert_eq!(parsed.output_format, OutputFormat::Json);
    }

    #[tokio::test]
    async fn new_local_calendar_is_listed() {
        let agenda = Agenda::new(calsync_core::Config::default()).await.unwrap();
        let cmd = CmdCalendarNew {
            name: "Personal".to_string(),
            ics: None,
            color: Some("#ff0000".to_string()),
        };

        cmd.run(&agenda).await.unwrap();

        let calendars = agenda.list_calendars(CalendarFilter::All).await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].color.as_deref(), Some("#ff0000"));
    }
}
