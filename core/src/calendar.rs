// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::{CalendarId, CalendarKind, Scope, SourceId};

/// A remote account holding calendar collections.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Source {
    pub id: SourceId,
    pub user_id: i64,
    pub name: String,

    /// Server root, e.g. `https://dav.example.com`.
    pub base_url: String,

    /// Principal path used for calendar discovery.
    pub principal: String,

    /// Key into the configured credentials.
    pub credential: Option<String>,
}

/// A calendar and its synchronization state.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Calendar {
    pub id: CalendarId,
    pub user_id: i64,
    pub source_id: Option<SourceId>,
    pub kind: CalendarKind,
    pub name: String,
    pub color: Option<String>,

    /// Collection href for `CalDAV` calendars, file path for ICS calendars.
    pub url: Option<String>,

    /// Remote collection tag seen at the last successful sync.
    pub ctag: Option<String>,

    /// Unix seconds of the last freshness check.
    pub last_check: i64,
    pub active: bool,
    pub readonly: bool,
}

impl Calendar {
    /// The calendar alone, as its owner sees it.
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope {
            user_id: self.user_id,
            calendar_ids: vec![self.id],
        }
    }

    /// Whether events of this calendar can be changed.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !self.readonly && !matches!(self.kind, CalendarKind::IcsFile)
    }

    /// Whether the calendar mirrors an outside origin.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        !matches!(self.kind, CalendarKind::Local)
    }
}

/// Fields of a calendar about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendar {
    pub source_id: Option<SourceId>,
    pub kind: CalendarKind,
    pub name: String,
    pub color: Option<String>,
    pub url: Option<String>,
    pub readonly: bool,
}

impl NewCalendar {
    /// A calendar that lives only in the local store.
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            source_id: None,
            kind: CalendarKind::Local,
            name: name.into(),
            color: None,
            url: None,
            readonly: false,
        }
    }

    /// A read-only calendar mirroring an `.ics` file.
    #[must_use]
    pub fn ics_file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source_id: None,
            kind: CalendarKind::IcsFile,
            name: name.into(),
            color: None,
            url: Some(path.into()),
            readonly: true,
        }
    }
}

/// Which calendars [`crate::Agenda::list_calendars`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum CalendarFilter {
    /// Every calendar of the user.
    #[default]
    All,
    /// Calendars shown in listings.
    Active,
    /// Calendars events can be written to.
    Writable,
    /// Calendars mirrored from a remote server.
    Remote,
}

impl CalendarFilter {
    #[must_use]
    pub const fn matches(self, calendar: &Calendar) -> bool {
        match self {
            CalendarFilter::All => true,
            CalendarFilter::Active => calendar.active,
            CalendarFilter::Writable => calendar.active && calendar.is_writable(),
            CalendarFilter::Remote => matches!(calendar.kind, CalendarKind::CalDav),
        }
    }
}
