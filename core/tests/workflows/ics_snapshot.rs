// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Calendars mirrored from `.ics` files next to local and remote ones.

use calsync_core::{Agenda, Calendar, Error, EventQuery, NewCalendar, SaveMode};
use tempfile::TempDir;

use crate::common::{remote_ics, test_config};

async fn agenda_with_file(data: &str) -> (Agenda, Calendar, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("holidays.ics");
    tokio::fs::write(&path, data).await.unwrap();

    let agenda = Agenda::new(test_config()).await.unwrap();
    let calendar = agenda
        .create_calendar(NewCalendar::ics_file(
            "Holidays",
            path.to_string_lossy().into_owned(),
        ))
        .await
        .unwrap();
    (agenda, calendar, dir)
}

#[tokio::test]
async fn file_calendars_are_only_listed_when_asked_for() {
    // Arrange
    let (agenda, _, _dir) = agenda_with_file(&remote_ics(
        "spring",
        "Spring holiday",
        "20250321T000000",
        "20250321T235900",
    ))
    .await;

    // Act
    let hidden = agenda.load_events(&EventQuery::default()).await.unwrap();
    let shown = agenda
        .load_events(&EventQuery {
            include_virtual: true,
            ..EventQuery::default()
        })
        .await
        .unwrap();

    // Assert
    assert!(hidden.is_empty());
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].summary, "Spring holiday");
    assert!(shown[0].url.as_deref().unwrap().ends_with("holidays.ics#spring"));
}

#[tokio::test]
async fn file_changes_show_up_on_the_next_read() {
    // Arrange
    let (agenda, _, dir) = agenda_with_file(&remote_ics(
        "spring",
        "Spring holiday",
        "20250321T000000",
        "20250321T235900",
    ))
    .await;
    let query = EventQuery {
        include_virtual: true,
        ..EventQuery::default()
    };
    assert_eq!(agenda.load_events(&query).await.unwrap().len(), 1);

    // Act
    tokio::fs::write(
        dir.path().join("holidays.ics"),
        remote_ics("autumn", "Autumn school holidays", "20251003T000000", "20251003T235900"),
    )
    .await
    .unwrap();
    let events = agenda.load_events(&query).await.unwrap();

    // Assert
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uid, "autumn");
}

#[tokio::test]
async fn file_calendars_reject_edits() {
    // Arrange
    let (agenda, calendar, _dir) = agenda_with_file(&remote_ics(
        "spring",
        "Spring holiday",
        "20250321T000000",
        "20250321T235900",
    ))
    .await;
    let query = EventQuery {
        include_virtual: true,
        ..EventQuery::default()
    };
    let mut event = agenda.load_events(&query).await.unwrap().remove(0);
    event.summary = "Renamed".to_string();

    // Act
    let edited = agenda.edit_event(event.clone(), SaveMode::All).await;
    let removed = agenda.remove_event(event.id.unwrap(), SaveMode::All).await;
    let created = agenda
        .new_event(calsync_core::Event::new(
            calendar.id,
            "New",
            event.start.clone(),
            event.end.clone(),
        ))
        .await;

    // Assert
    assert!(matches!(edited, Err(Error::Validation(_))));
    assert!(matches!(removed, Err(Error::Validation(_))));
    assert!(matches!(created, Err(Error::Validation(_))));
}
