// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Writes racing with other clients, and writes the server refuses.

use calsync_core::{CalendarFilter, Error, EventQuery, EventRef, SaveMode};

use crate::common::{WORK_COLLECTION, berlin, remote_agenda, series_rows, standup};

async fn stored_summary(agenda: &calsync_core::Agenda, id: calsync_core::EventId) -> String {
    agenda
        .get_event(&EventRef::Id(id), CalendarFilter::All, false)
        .await
        .unwrap()
        .unwrap()
        .event
        .summary
}

#[tokio::test]
async fn a_single_conflict_is_retried_after_syncing() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let href = master.url.clone().unwrap();
    fixture.dav.conflict_next_puts(1);
    let mut edit = master.clone();
    edit.summary = "Daily sync".to_string();

    // Act
    let edited = fixture
        .agenda
        .edit_event(edit, SaveMode::All)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(fixture.dav.put_count(), 3);
    assert_eq!(edited.summary, "Daily sync");
    assert_eq!(edited.etag, fixture.dav.etag(&href));
    assert!(fixture.dav.data(&href).unwrap().contains("SUMMARY:Daily sync"));
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.summary == "Daily sync"));
}

#[tokio::test]
async fn a_second_conflict_restores_the_series_and_fails() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let href = master.url.clone().unwrap();
    fixture.dav.conflict_next_puts(2);
    let mut edit = master.clone();
    edit.summary = "Daily sync".to_string();

    // Act
    let result = fixture.agenda.edit_event(edit, SaveMode::All).await;

    // Assert
    assert!(matches!(result, Err(Error::RemoteConflict { href: h }) if h == href));
    assert_eq!(fixture.dav.put_count(), 3);
    assert!(fixture.dav.data(&href).unwrap().contains("SUMMARY:Standup"));
    assert_eq!(stored_summary(&fixture.agenda, master.id.unwrap()).await, "Standup");

    // The next read resynchronizes with the server
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].etag, fixture.dav.etag(&href));
}

#[tokio::test]
async fn a_transport_failure_rolls_back_the_edit() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    fixture.dav.set_offline(true);
    let mut edit = master.clone();
    edit.summary = "Daily sync".to_string();

    // Act
    let result = fixture.agenda.edit_event(edit, SaveMode::All).await;

    // Assert
    assert!(matches!(result, Err(Error::RemoteTransport(_))));
    assert_eq!(stored_summary(&fixture.agenda, master.id.unwrap()).await, "Standup");
}

#[tokio::test]
async fn a_transport_failure_discards_a_new_event() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    fixture.dav.set_offline(true);
    let event = calsync_core::Event::new(
        fixture.calendar().id,
        "Offsite",
        berlin(2025, 4, 2, 9, 0),
        berlin(2025, 4, 2, 17, 0),
    );

    // Act
    let result = fixture.agenda.new_event(event).await;

    // Assert
    assert!(result.is_err());
    let events = fixture
        .agenda
        .load_events(&EventQuery::default())
        .await
        .unwrap();
    assert!(events.is_empty());
    assert!(fixture.dav.hrefs().is_empty());
}
