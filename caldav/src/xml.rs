// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML utilities for WebDAV/CalDAV processing.

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;

use crate::error::CalDavError;

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// Calendar server extensions (`getctag`).
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal extensions (`calendar-color`).
    pub const APPLE_ICAL: &str = "http://apple.com/ns/ical/";
}

/// Reads the text content of the element whose start tag was just consumed.
///
/// Entity references are resolved, so `&quot;abc&quot;` yields `"abc"`.
/// Nested elements are skipped; their text is appended.
pub fn read_text(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<String, CalDavError> {
    let mut text = String::new();
    let mut depth = 1usize;
    loop {
        match reader.read_event_into(buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(e) => text.push_str(&e.decode()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::GeneralRef(e) => {
                let name = e.decode()?;
                if let Some(ch) = e.resolve_char_ref()? {
                    text.push(ch);
                } else if let Some(resolved) = resolve_predefined_entity(&name) {
                    text.push_str(resolved);
                }
            }
            Event::Eof => return Err(CalDavError::Xml("Unexpected EOF".to_string())),
            _ => {}
        }
        buf.clear();
    }
    buf.clear();
    Ok(text.trim().to_string())
}
