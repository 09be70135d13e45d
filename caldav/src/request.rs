// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::CalDavError;
use crate::xml::ns;

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Collection tag.
    GetCTag,
    /// Principal of the authenticated user.
    CurrentUserPrincipal,
    /// Calendar home set.
    CalendarHomeSet,
    /// Calendar description.
    CalendarDescription,
    /// Calendar color.
    CalendarColor,
}

impl Prop {
    /// Qualified element name, using the prefixes declared by [`PropFindRequest::build`].
    const fn qname(self) -> &'static str {
        match self {
            Self::DisplayName => "D:displayname",
            Self::ResourceType => "D:resourcetype",
            Self::GetETag => "D:getetag",
            Self::CurrentUserPrincipal => "D:current-user-principal",
            Self::GetCTag => "CS:getctag",
            Self::CalendarHomeSet => "C:calendar-home-set",
            Self::CalendarDescription => "C:calendar-description",
            Self::CalendarColor => "I:calendar-color",
        }
    }
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request for the given properties.
    #[must_use]
    pub fn with(props: &[Prop]) -> Self {
        Self {
            props: props.to_vec(),
        }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        if !self.props.contains(&prop) {
            self.props.push(prop);
        }
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        propfind.push_attribute(("xmlns:C", ns::CALDAV));
        propfind.push_attribute(("xmlns:CS", ns::CALENDARSERVER));
        propfind.push_attribute(("xmlns:I", ns::APPLE_ICAL));
        writer.write_event(Event::Start(propfind))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        for prop in &self.props {
            writer.write_event(Event::Empty(BytesStart::new(prop.qname())))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CalDavError::Xml(format!("UTF-8 error: {e}")))
    }
}
