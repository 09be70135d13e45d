// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf};

use calsync_core::{APP_NAME, Agenda};
use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use colored::Colorize;
use futures::{FutureExt, future::BoxFuture};
use tracing_subscriber::EnvFilter;

use crate::cmd_calendar::{CmdCalendarList, CmdCalendarNew, CmdSourceAdd};
use crate::cmd_event::{
    CmdEventEdit, CmdEventList, CmdEventMove, CmdEventNew, CmdEventRemove, CmdEventResize,
    CmdEventShow,
};
use crate::cmd_generate_completion::CmdGenerateCompletion;
use crate::cmd_sync::{CmdAlarms, CmdDismiss, CmdSync};
use crate::config::{Config, parse_config};

/// Run the calsync command-line interface.
pub async fn run() -> Result<(), Box<dyn Error>> {
    match Cli::parse() {
        Ok(cli) => {
            init_tracing(cli.debug);
            if let Err(e) = cli.run().await {
                println!("{} {}", "Error:".red(), e);
            }
        }
        Err(e) => println!("{} {}", "Error:".red(), e),
    };
    Ok(())
}

/// Logs go to stderr, filtered by `RUST_LOG` when set.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file
    pub config: Option<PathBuf>,

    /// Verbose logging, including the traffic with `CalDAV` servers
    pub debug: bool,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("Keep local calendars in step with CalDAV servers and .ics files")
            .author("Zexin Yuan <aim@yzx9.xyz>")
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(false) // allow default to upcoming events
            .arg_required_else_help(false)
            .arg(
                arg!(-c --config [CONFIG] "Path to the configuration file")
                    .long_help(
                        "\
Path to the configuration file. Defaults to $XDG_CONFIG_HOME/calsync/config.toml on Linux and MacOS, \
%LOCALAPPDATA%/calsync/config.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath)
                    .global(true),
            )
            .arg(arg!(-d --debug "Print debug logs to stderr").global(true))
            .subcommand(
                Command::new("calendar")
                    .alias("c")
                    .about("Manage your calendars")
                    .arg_required_else_help(true)
                    .subcommand_required(true)
                    .subcommand(CmdCalendarList::command())
                    .subcommand(CmdCalendarNew::command()),
            )
            .subcommand(CmdSourceAdd::command())
            .subcommand(
                Command::new("event")
                    .alias("e")
                    .about("Manage your events")
                    .arg_required_else_help(true)
                    .subcommand_required(true)
                    .subcommand(CmdEventList::command())
                    .subcommand(CmdEventShow::command())
                    .subcommand(CmdEventNew::command())
                    .subcommand(CmdEventEdit::command())
                    .subcommand(CmdEventMove::command())
                    .subcommand(CmdEventResize::command())
                    .subcommand(CmdEventRemove::command()),
            )
            .subcommand(CmdEventNew::command())
            .subcommand(CmdEventEdit::command())
            .subcommand(CmdEventShow::command())
            .subcommand(CmdSync::command())
            .subcommand(CmdAlarms::command())
            .subcommand(CmdDismiss::command())
            .subcommand(CmdGenerateCompletion::command())
    }

    /// Parse the command-line arguments
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Ok(Self::from(matches))
    }

    /// Parse the specified arguments
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Ok(Self::from(matches))
    }

    /// Create a CLI instance from the `ArgMatches`
    pub fn from(matches: ArgMatches) -> Self {
        use Commands::*;
        let command = match matches.subcommand() {
            Some(("calendar", matches)) => match matches.subcommand() {
                Some((CmdCalendarList::NAME, matches)) => {
                    CalendarList(CmdCalendarList::from(matches))
                }
                Some((CmdCalendarNew::NAME, matches)) => CalendarNew(CmdCalendarNew::from(matches)),
                _ => unreachable!(),
            },
            Some((CmdSourceAdd::NAME, matches)) => SourceAdd(CmdSourceAdd::from(matches)),
            Some(("event", matches)) => match matches.subcommand() {
                Some((CmdEventList::NAME, matches)) => EventList(CmdEventList::from(matches)),
                Some((CmdEventShow::NAME, matches)) => EventShow(CmdEventShow::from(matches)),
                Some((CmdEventNew::NAME, matches)) => EventNew(CmdEventNew::from(matches)),
                Some((CmdEventEdit::NAME, matches)) => EventEdit(CmdEventEdit::from(matches)),
                Some((CmdEventMove::NAME, matches)) => EventMove(CmdEventMove::from(matches)),
                Some((CmdEventResize::NAME, matches)) => EventResize(CmdEventResize::from(matches)),
                Some((CmdEventRemove::NAME, matches)) => EventRemove(CmdEventRemove::from(matches)),
                _ => unreachable!(),
            },
            Some((CmdEventNew::NAME, matches)) => EventNew(CmdEventNew::from(matches)),
            Some((CmdEventEdit::NAME, matches)) => EventEdit(CmdEventEdit::from(matches)),
            Some((CmdEventShow::NAME, matches)) => EventShow(CmdEventShow::from(matches)),
            Some((CmdSync::NAME, matches)) => Sync(CmdSync::from(matches)),
            Some((CmdAlarms::NAME, matches)) => Alarms(CmdAlarms::from(matches)),
            Some((CmdDismiss::NAME, matches)) => Dismiss(CmdDismiss::from(matches)),
            Some((CmdGenerateCompletion::NAME, matches)) => {
                GenerateCompletion(CmdGenerateCompletion::from(matches))
            }
            None => EventList(CmdEventList::default()),
            _ => unreachable!(),
        };

        let config = matches.get_one("config").cloned();
        let debug = matches.get_flag("debug");
        Cli {
            config,
            debug,
            command,
        }
    }

    /// Run the command
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        self.command.run(self.config, self.debug).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// List calendars
    CalendarList(CmdCalendarList),

    /// Add a local or `.ics` calendar
    CalendarNew(CmdCalendarNew),

    /// Register a `CalDAV` account
    SourceAdd(CmdSourceAdd),

    /// List upcoming events
    EventList(CmdEventList),

    /// Show one event
    EventShow(CmdEventShow),

    /// Add a new event
    EventNew(CmdEventNew),

    /// Edit an event
    EventEdit(CmdEventEdit),

    /// Move an event
    EventMove(CmdEventMove),

    /// Change the end of an event
    EventResize(CmdEventResize),

    /// Remove an event
    EventRemove(CmdEventRemove),

    /// Synchronize calendars now
    Sync(CmdSync),

    /// List due reminders
    Alarms(CmdAlarms),

    /// Dismiss or snooze a reminder
    Dismiss(CmdDismiss),

    /// Generate shell completion
    GenerateCompletion(CmdGenerateCompletion),
}

impl Commands {
    /// Run the command with the given configuration
    #[rustfmt::skip]
    pub async fn run(self, config: Option<PathBuf>, debug: bool) -> Result<(), Box<dyn Error>> {
        use Commands::*;
        match self {
            CalendarList(a) => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            CalendarNew(a)  => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            SourceAdd(a)    => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventList(a)    => Self::run_with(config, debug, |x, y| a.run(x, y).boxed()).await,
            EventShow(a)    => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventNew(a)     => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventEdit(a)    => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventMove(a)    => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventResize(a)  => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            EventRemove(a)  => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            Sync(a)         => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            Alarms(a)       => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            Dismiss(a)      => Self::run_with(config, debug, |x, _| a.run(x).boxed()).await,
            GenerateCompletion(a) => a.run(),
        }
    }

    async fn run_with<F>(config: Option<PathBuf>, debug: bool, f: F) -> Result<(), Box<dyn Error>>
    where
        F: for<'a> FnOnce(&'a Agenda, &'a Config) -> BoxFuture<'a, Result<(), Box<dyn Error>>>,
    {
        tracing::debug!("parsing configuration...");
        let (mut core_config, config) = parse_config(config).await?;
        core_config.debug |= debug;
        let agenda = Agenda::new(core_config).await?;

        let result = f(&agenda, &config).await;

        agenda.close().await;
        result
    }
}
