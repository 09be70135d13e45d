// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

row_id!(
    /// Identity of a stored event row.
    EventId
);
row_id!(
    /// Identity of a calendar.
    CalendarId
);
row_id!(
    /// Identity of a remote account.
    SourceId
);

/// The calendars a request may touch: the owning user plus the entitled set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// The user the calendars belong to.
    pub user_id: i64,

    /// Calendars the request is entitled to read or write.
    pub calendar_ids: Vec<CalendarId>,
}

impl Scope {
    /// Restricts the scope to the given calendars, dropping those outside it.
    #[must_use]
    pub fn narrow(&self, ids: &[CalendarId]) -> Self {
        Self {
            user_id: self.user_id,
            calendar_ids: self
                .calendar_ids
                .iter()
                .copied()
                .filter(|id| ids.contains(id))
                .collect(),
        }
    }

    /// Whether the calendar belongs to the scope.
    #[must_use]
    pub fn contains(&self, id: CalendarId) -> bool {
        self.calendar_ids.contains(&id)
    }
}

/// How an edit to a recurring event is applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SaveMode {
    /// Detach the edited occurrence into a brand-new series.
    New,

    /// Change only the selected occurrence.
    Current,

    /// Change the selected occurrence and every later one.
    Future,

    /// Change the entire series.
    #[default]
    All,
}

impl SaveMode {
    const fn as_str(self) -> &'static str {
        match self {
            SaveMode::New => "new",
            SaveMode::Current => "current",
            SaveMode::Future => "future",
            SaveMode::All => "all",
        }
    }
}

impl Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! ical_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_ref())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.to_ascii_uppercase().as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(()),
                }
            }
        }
    };
}

ical_enum!(
    /// How the event shows up in free/busy lookups.
    #[derive(Default)]
    FreeBusy {
        /// The time stays available.
        Free => "FREE",
        /// The time is blocked.
        #[default]
        Busy => "BUSY",
        /// The time is tentatively blocked.
        Tentative => "TENTATIVE",
        /// The owner is away.
        OutOfOffice => "OUTOFOFFICE",
    }
);

ical_enum!(
    /// Access classification of an event.
    #[derive(Default)]
    Sensitivity {
        /// Visible to everyone.
        #[default]
        Public => "PUBLIC",
        /// Only the time is visible.
        Private => "PRIVATE",
        /// Hidden entirely.
        Confidential => "CONFIDENTIAL",
    }
);

ical_enum!(
    /// Status of an event.
    #[derive(Default)]
    #[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
    EventStatus {
        /// The event is tentative.
        Tentative => "TENTATIVE",
        /// The event is confirmed.
        #[default]
        Confirmed => "CONFIRMED",
        /// The event is cancelled.
        Cancelled => "CANCELLED",
    }
);

ical_enum!(
    /// Participation status of an attendee.
    #[derive(Default)]
    PartStat {
        /// No answer yet.
        #[default]
        NeedsAction => "NEEDS-ACTION",
        /// Accepted.
        Accepted => "ACCEPTED",
        /// Declined.
        Declined => "DECLINED",
        /// Tentatively accepted.
        Tentative => "TENTATIVE",
        /// Passed on to someone else.
        Delegated => "DELEGATED",
    }
);

ical_enum!(
    /// Role of a participant.
    #[derive(Default)]
    Role {
        /// The organizer of the event.
        Organizer => "ORGANIZER",
        /// Chairs the event.
        Chair => "CHAIR",
        /// Participation is required.
        #[default]
        Required => "REQ-PARTICIPANT",
        /// Participation is optional.
        Optional => "OPT-PARTICIPANT",
        /// Copied for information only.
        NonParticipant => "NON-PARTICIPANT",
    }
);

/// A participant of an event. The organizer is stored as an attendee with
/// [`Role::Organizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Email address, without the `mailto:` prefix.
    pub email: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub status: PartStat,

    /// Whether a reply is expected.
    #[serde(default)]
    pub rsvp: bool,

    /// Delegate the invitation was passed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<String>,
}

impl Attendee {
    /// Creates a required participant that has not answered yet.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            role: Role::Required,
            status: PartStat::NeedsAction,
            rsvp: false,
            delegated_to: None,
        }
    }

    /// Creates the organizer entry.
    #[must_use]
    pub fn organizer(email: impl Into<String>) -> Self {
        Self {
            role: Role::Organizer,
            status: PartStat::Accepted,
            ..Self::new(email)
        }
    }

    /// Whether the attendee is the organizer.
    #[must_use]
    pub fn is_organizer(&self) -> bool {
        self.role == Role::Organizer
    }
}

/// A display reminder, relative to the start of the occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// Minutes before the start; negative values fire after the start.
    pub offset_minutes: i64,
}

/// Kind of calendar, which decides how it is kept in step with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i64)]
pub enum CalendarKind {
    /// Lives only in the local store.
    Local = 0,
    /// Mirrors a `CalDAV` collection.
    CalDav = 1,
    /// Mirrors a local `.ics` file, read-only.
    IcsFile = 2,
}

impl Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CalendarKind::Local => "local",
            CalendarKind::CalDav => "caldav",
            CalendarKind::IcsFile => "ics",
        })
    }
}
