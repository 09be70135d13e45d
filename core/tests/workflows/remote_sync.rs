// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Picking up changes other clients made on the server.

use calsync_core::{Error, EventQuery};

use crate::common::{WORK_COLLECTION, remote_agenda, remote_agenda_with, remote_ics, test_config};

const LUNCH: &str = "/cal/work/lunch.ics";

async fn summaries(agenda: &calsync_core::Agenda) -> Vec<String> {
    agenda
        .load_events(&EventQuery::default())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.summary)
        .collect()
}

#[tokio::test]
async fn reading_imports_remote_objects() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let etag = fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );

    // Act
    let events = fixture
        .agenda
        .load_events(&EventQuery::default())
        .await
        .unwrap();

    // Assert
    assert_eq!(events.len(), 1);
    let lunch = &events[0];
    assert_eq!(lunch.uid, "lunch");
    assert_eq!(lunch.url.as_deref(), Some(LUNCH));
    assert_eq!(lunch.etag.as_deref(), Some(etag.as_str()));
    assert_eq!(lunch.start.time_zone().iana_name(), Some("Europe/Berlin"));
}

#[tokio::test]
async fn unchanged_collection_reads_its_tag_once() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );
    assert_eq!(summaries(&fixture.agenda).await, vec!["Lunch"]);
    let before = fixture.dav.ctag_count();

    // Act
    let loaded = summaries(&fixture.agenda).await;

    // Assert
    assert_eq!(loaded, vec!["Lunch"]);
    assert_eq!(fixture.dav.ctag_count() - before, 1);
}

#[tokio::test]
async fn remote_changes_replace_the_stored_copy() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );
    assert_eq!(summaries(&fixture.agenda).await, vec!["Lunch"]);

    // Act
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Team lunch", "20250304T123000", "20250304T133000"),
    );
    let events = fixture
        .agenda
        .load_events(&EventQuery::default())
        .await
        .unwrap();

    // Assert
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].summary, "Team lunch");
    assert_eq!(events[0].start.minute(), 30);
}

#[tokio::test]
async fn remote_deletions_only_touch_the_synced_calendar() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION, "/cal/home/"]).await;
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );
    fixture.dav.store(
        "/cal/home/dentist.ics",
        &remote_ics("dentist", "Dentist", "20250305T080000", "20250305T090000"),
    );
    assert_eq!(summaries(&fixture.agenda).await.len(), 2);

    // Act
    fixture.dav.remove(LUNCH);
    let report = fixture
        .agenda
        .sync_now(fixture.calendars[0].id)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(report.deleted, 1);
    assert_eq!(summaries(&fixture.agenda).await, vec!["Dentist"]);
}

#[tokio::test]
async fn throttled_reads_serve_the_store_until_an_explicit_sync() {
    // Arrange
    let config = calsync_core::Config {
        sync_throttle_secs: 3600,
        ..test_config()
    };
    let fixture = remote_agenda_with(config, &[WORK_COLLECTION]).await;
    assert!(summaries(&fixture.agenda).await.is_empty());
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );

    // Act
    let before = summaries(&fixture.agenda).await;
    let report = fixture
        .agenda
        .sync_now(fixture.calendar().id)
        .await
        .unwrap()
        .unwrap();
    let after = summaries(&fixture.agenda).await;

    // Assert
    assert!(before.is_empty());
    assert_eq!(report.created, 1);
    assert_eq!(after, vec!["Lunch"]);
}

#[tokio::test]
async fn unreachable_server_degrades_to_stored_events() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    fixture.dav.store(
        LUNCH,
        &remote_ics("lunch", "Lunch", "20250304T120000", "20250304T130000"),
    );
    assert_eq!(summaries(&fixture.agenda).await, vec!["Lunch"]);
    fixture.dav.set_offline(true);

    // Act
    let events = fixture.agenda.load_events(&EventQuery::default()).await;
    let explicit = fixture.agenda.sync_now(fixture.calendar().id).await;

    // Assert
    assert_eq!(events.unwrap().len(), 1);
    assert!(matches!(explicit, Err(Error::RemoteTransport(_))));
}

#[tokio::test]
async fn syncing_an_unknown_calendar_reports_none() {
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;

    let report = fixture
        .agenda
        .sync_now(calsync_core::CalendarId(999))
        .await
        .unwrap();

    assert!(report.is_none());
}
