// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end of calsync.

mod arg;
mod cli;
mod cmd_calendar;
mod cmd_event;
mod cmd_generate_completion;
mod cmd_sync;
mod config;
mod event_formatter;
mod table;
mod util;

pub use crate::cli::{Cli, Commands, run};
pub use crate::config::Config;
