// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! A local calendar store kept in step with `CalDAV` collections and `.ics`
//! files, with recurring series materialized into occurrence rows and edits
//! applied per occurrence, from an occurrence on, or to the whole series.

mod agenda;
mod calendar;
mod config;
mod datetime;
mod diff;
mod error;
mod event;
mod ics;
mod localdb;
mod memo;
mod plan;
mod push;
mod recurrence;
mod remote;
mod series;
mod sync;
mod types;

pub use crate::agenda::{Agenda, EventDetails, EventQuery, EventRef, NewSource};
pub use crate::calendar::{Calendar, CalendarFilter, NewCalendar, Source};
pub use crate::config::{APP_NAME, Config, default_state_dir, expand_path, get_config_dir};
pub use crate::datetime::{instance_key, parse_instance_key, parse_reference_id, reference_id};
pub use crate::diff::{DiffOutcome, LocalItem, PendingUpdate, RemoteEntry, UpdateAction, diff};
pub use crate::error::Error;
pub use crate::event::Event;
pub use crate::ics::{CalendarObject, decode, encode};
pub use crate::plan::{
    EditContext, Mutation, MutationPlan, is_rescheduled, plan_edit, plan_remove, resolve_mode,
};
pub use crate::recurrence::{Expansion, Frequency, Limits, Occurrence, Recurrence, Until, WeekdayNum, expand};
pub use crate::remote::{CalDavConnector, CalDavRemote, DavClient, DavConnector, PutOutcome, RemoteCalendar, RemoteObject};
pub use crate::sync::{SyncReport, SyncState};
pub use crate::types::{
    Alarm, Attendee, CalendarId, CalendarKind, EventId, EventStatus, FreeBusy, PartStat, Role,
    SaveMode, Scope, Sensitivity, SourceId,
};
