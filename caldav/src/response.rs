// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV operations.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::CalDavError;
use crate::types::{CalendarCollection, CollectionEntry, ETag, Href};
use crate::xml::read_text;

/// `WebDAV` multistatus response.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// The href the response describes.
    pub href: Href,
    /// Property groups, one per returned status.
    pub prop_stats: Vec<PropStat>,
}

/// Property stat with status and value.
#[derive(Debug, Clone, Default)]
pub struct PropStat {
    /// The properties carried by this group.
    pub props: Properties,
    /// Raw status line, e.g. `HTTP/1.1 200 OK`.
    pub status: String,
}

impl PropStat {
    fn is_ok(&self) -> bool {
        self.status.contains(" 200")
    }
}

/// WebDAV/CalDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `displayname`.
    pub display_name: Option<String>,
    /// `getetag`.
    pub get_etag: Option<ETag>,
    /// `getctag`.
    pub get_ctag: Option<ETag>,
    /// First href inside `current-user-principal`.
    pub current_user_principal: Option<Href>,
    /// First href inside `calendar-home-set`.
    pub calendar_home_set: Option<Href>,
    /// `calendar-description`.
    pub calendar_description: Option<String>,
    /// `calendar-color`.
    pub calendar_color: Option<String>,
    /// `resourcetype` contains `calendar`.
    pub is_calendar: bool,
    /// `resourcetype` contains `collection`.
    pub is_collection: bool,
}

impl MultiStatusResponse {
    /// Parses multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    pub fn from_xml(xml: &str) -> Result<Self, CalDavError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut responses = Vec::new();
        let mut current: Option<ResponseItem> = None;
        let mut propstat: Option<PropStat> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => {
                    let local = e.local_name();
                    let name = local.as_ref();
                    match name {
                        b"response" => {
                            current = Some(ResponseItem {
                                href: Href::new(String::new()),
                                prop_stats: Vec::new(),
                            });
                        }
                        b"propstat" if current.is_some() => propstat = Some(PropStat::default()),
                        b"href" if propstat.is_none() => {
                            let href = read_text(&mut reader, &mut buf)?;
                            if let Some(resp) = current.as_mut() {
                                resp.href = Href::new(href);
                            }
                        }
                        b"status" => {
                            let status = read_text(&mut reader, &mut buf)?;
                            if let Some(ps) = propstat.as_mut() {
                                ps.status = status;
                            }
                        }
                        _ => {
                            if let Some(ps) = propstat.as_mut() {
                                read_property(&mut reader, &mut buf, name, &mut ps.props)?;
                            }
                        }
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"propstat" => {
                        if let (Some(resp), Some(ps)) = (current.as_mut(), propstat.take()) {
                            resp.prop_stats.push(ps);
                        }
                    }
                    b"response" => {
                        if let Some(resp) = current.take() {
                            responses.push(resp);
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(Self { responses })
    }

    /// Converts the response of a depth-1 PROPFIND on a collection into its members.
    ///
    /// The collection itself and nested collections are skipped, as are members
    /// the server reported without an `ETag`.
    #[must_use]
    pub fn into_entries(self, collection: &Href) -> Vec<CollectionEntry> {
        let own = collection.trim_end_matches('/');
        self.responses
            .into_iter()
            .filter(|r| r.href.trim_end_matches('/') != own)
            .filter_map(|r| {
                let props = r.prop_stats.into_iter().find(PropStat::is_ok)?.props;
                if props.is_collection {
                    return None;
                }
                props.get_etag.map(|etag| CollectionEntry { href: r.href, etag })
            })
            .collect()
    }

    /// Returns the `getctag` of the first response, if present.
    #[must_use]
    pub fn ctag(&self) -> Option<ETag> {
        self.ok_props().find_map(|p| p.get_ctag.clone())
    }

    /// Returns the first `current-user-principal` href.
    #[must_use]
    pub fn current_user_principal(&self) -> Option<Href> {
        self.ok_props()
            .find_map(|p| p.current_user_principal.clone())
    }

    /// Returns the first `calendar-home-set` href.
    #[must_use]
    pub fn calendar_home_set(&self) -> Option<Href> {
        self.ok_props().find_map(|p| p.calendar_home_set.clone())
    }

    /// Converts multistatus response to calendar collections.
    #[must_use]
    pub fn into_collections(self) -> Vec<CalendarCollection> {
        self.responses
            .into_iter()
            .filter_map(|r| {
                let props = r.prop_stats.into_iter().find(PropStat::is_ok)?.props;
                if !(props.is_calendar && props.is_collection) {
                    return None;
                }
                let mut collection = CalendarCollection::new(r.href);
                collection.display_name = props.display_name;
                collection.description = props.calendar_description;
                collection.color = props.calendar_color;
                collection.ctag = props.get_ctag;
                Some(collection)
            })
            .collect()
    }

    fn ok_props(&self) -> impl Iterator<Item = &Properties> {
        self.responses
            .iter()
            .flat_map(|r| r.prop_stats.iter())
            .filter(|ps| ps.is_ok())
            .map(|ps| &ps.props)
    }
}

fn read_property(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    name: &[u8],
    props: &mut Properties,
) -> Result<(), CalDavError> {
    match name {
        b"displayname" => props.display_name = Some(read_text(reader, buf)?),
        b"getetag" => props.get_etag = Some(ETag::new(read_text(reader, buf)?)),
        b"getctag" => props.get_ctag = Some(ETag::new(read_text(reader, buf)?)),
        b"calendar-description" => props.calendar_description = Some(read_text(reader, buf)?),
        b"calendar-color" => props.calendar_color = Some(read_text(reader, buf)?),
        b"current-user-principal" => {
            props.current_user_principal = read_nested_href(reader, buf, name)?;
        }
        b"calendar-home-set" => props.calendar_home_set = read_nested_href(reader, buf, name)?,
        b"resourcetype" => loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"calendar" => props.is_calendar = true,
                    b"collection" => props.is_collection = true,
                    _ => {}
                },
                Event::End(e) if e.local_name().as_ref() == b"resourcetype" => break,
                Event::Eof => return Err(CalDavError::Xml("Unexpected EOF".to_string())),
                _ => {}
            }
        },
        // <D:prop> itself and unknown properties: descend, values are ignored
        _ => {}
    }
    Ok(())
}

fn read_nested_href(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    parent: &[u8],
) -> Result<Option<Href>, CalDavError> {
    let mut href = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"href" => {
                let text = read_text(reader, buf)?;
                href.get_or_insert(Href::new(text));
            }
            Event::End(e) if e.local_name().as_ref() == parent => break,
            Event::Eof => return Err(CalDavError::Xml("Unexpected EOF".to_string())),
            _ => {}
        }
    }
    Ok(href)
}
