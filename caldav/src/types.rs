// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string value.
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Returns the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(
    /// Path of a resource on the server, such as `/calendars/user/work/e1.ics`.
    Href
);

string_newtype!(
    /// Entity tag of a resource or collection.
    ///
    /// Compared byte for byte; the quotes sent by the server are kept.
    ETag
);

/// One member of a calendar collection as reported by a depth-1 PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    /// The href of the member.
    pub href: Href,
    /// The current entity tag of the member.
    pub etag: ETag,
}

/// A calendar object resource together with its raw iCalendar text.
#[derive(Debug, Clone)]
pub struct CalendarObject {
    /// The href of the resource.
    pub href: Href,
    /// The entity tag returned alongside the body.
    pub etag: ETag,
    /// Raw `text/calendar` payload.
    pub data: String,
}

/// Calendar collection metadata.
#[derive(Debug, Clone)]
pub struct CalendarCollection {
    /// The href of the calendar collection.
    pub href: Href,
    /// The display name of the calendar.
    pub display_name: Option<String>,
    /// The description of the calendar.
    pub description: Option<String>,
    /// Apple `calendar-color`, when the server exposes it.
    pub color: Option<String>,
    /// The collection tag (`CTag`) for change detection.
    pub ctag: Option<ETag>,
}

impl CalendarCollection {
    /// Creates a new `CalendarCollection`.
    #[must_use]
    pub fn new(href: Href) -> Self {
        Self {
            href,
            display_name: None,
            description: None,
            color: None,
            ctag: None,
        }
    }
}
