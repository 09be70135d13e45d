// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calsync_core::{
    Agenda, Calendar, Config, Event, EventQuery, Frequency, NewSource, Recurrence,
};
use jiff::Zoned;
use jiff::civil::date;
use jiff::tz::TimeZone;

use super::mock_dav::{MockConnector, MockDav};

/// Collection the remote fixture exposes first.
pub const WORK_COLLECTION: &str = "/cal/work/";

/// Configuration for an in-memory agenda in Berlin, syncing on every read.
pub fn test_config() -> Config {
    Config {
        timezone: Some("Europe/Berlin".to_string()),
        sync_throttle_secs: 0,
        user_emails: vec!["me@example.com".to_string()],
        ..Config::default()
    }
}

/// An agenda connected to a mock server, with the discovered calendars.
pub struct RemoteFixture {
    pub agenda: Agenda,
    pub dav: Arc<MockDav>,
    pub calendars: Vec<Calendar>,
}

impl RemoteFixture {
    pub fn calendar(&self) -> &Calendar {
        &self.calendars[0]
    }
}

pub async fn remote_agenda(collections: &[&str]) -> RemoteFixture {
    remote_agenda_with(test_config(), collections).await
}

pub async fn remote_agenda_with(config: Config, collections: &[&str]) -> RemoteFixture {
    let dav = MockDav::with_collections(collections);
    let connector = Arc::new(MockConnector { dav: dav.clone() });
    let agenda = Agenda::with_connector(config, connector).await.unwrap();
    let calendars = agenda
        .create_source(NewSource {
            name: "Work".to_string(),
            base_url: "https://dav.example.com".to_string(),
            principal: "/principals/me/".to_string(),
            credential: None,
        })
        .await
        .unwrap();

    RemoteFixture {
        agenda,
        dav,
        calendars,
    }
}

pub fn berlin(y: i16, m: i8, d: i8, h: i8, min: i8) -> Zoned {
    date(y, m, d)
        .at(h, min, 0, 0)
        .to_zoned(TimeZone::get("Europe/Berlin").unwrap())
        .unwrap()
}

/// Weekly standup on Mondays, five times from 2025-03-03 09:00 Berlin.
pub fn standup(calendar: &Calendar) -> Event {
    let mut event = Event::new(
        calendar.id,
        "Standup",
        berlin(2025, 3, 3, 9, 0),
        berlin(2025, 3, 3, 9, 30),
    );
    event.recurrence = Some(Recurrence {
        count: Some(5),
        ..Recurrence::new(Frequency::Weekly)
    });
    event
}

/// Visible rows of one series, in start order.
pub async fn series_rows(agenda: &Agenda, uid: &str) -> Vec<Event> {
    let query = EventQuery::default();
    agenda
        .load_events(&query)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.uid == uid)
        .collect()
}

/// The occurrence of a series starting on the given day.
pub fn on_day(rows: &[Event], y: i16, m: i8, d: i8) -> Event {
    rows.iter()
        .find(|e| e.start.date() == date(y, m, d))
        .cloned()
        .unwrap()
}

/// A remote calendar object with one event, as another client would write it.
pub fn remote_ics(uid: &str, summary: &str, start: &str, end: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Other Client//EN\r\n\
BEGIN:VEVENT\r\n\
UID:{uid}\r\n\
DTSTAMP:20250101T000000Z\r\n\
DTSTART;TZID=Europe/Berlin:{start}\r\n\
DTEND;TZID=Europe/Berlin:{end}\r\n\
SUMMARY:{summary}\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n"
    )
}
