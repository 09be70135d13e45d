// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Editing and removing occurrences of a remote weekly series.

use calsync_core::{Attendee, EventQuery, PartStat, SaveMode};

use crate::common::{WORK_COLLECTION, berlin, on_day, remote_agenda, series_rows, standup};

#[tokio::test]
async fn creating_a_series_pushes_one_object_and_stores_every_occurrence() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;

    // Act
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();

    // Assert
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    let href = format!("/cal/work/{}.ics", master.uid);
    assert_eq!(fixture.dav.hrefs(), vec![href.clone()]);
    assert_eq!(master.url.as_deref(), Some(href.as_str()));
    assert_eq!(master.etag, fixture.dav.etag(&href));
}

#[tokio::test]
async fn editing_the_current_occurrence_creates_one_exception() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut third = on_day(&rows, 2025, 3, 17);
    third.summary = "Planning".to_string();

    // Act
    let edited = fixture
        .agenda
        .edit_event(third, SaveMode::Current)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert!(edited.is_exception);
    assert_eq!(edited.instance, "20250317T090000");
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    let exceptions: Vec<_> = rows.iter().filter(|r| r.is_exception).collect();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].summary, "Planning");
    assert!(rows.iter().filter(|r| !r.is_exception).all(|r| r.summary == "Standup"));

    let data = fixture
        .dav
        .data(&format!("/cal/work/{}.ics", master.uid))
        .unwrap();
    assert!(data.contains("RECURRENCE-ID;TZID=Europe/Berlin:20250317T090000"));
    assert!(data.contains("SUMMARY:Planning"));
}

#[tokio::test]
async fn editing_future_occurrences_splits_the_series() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut third = on_day(&rows, 2025, 3, 17);
    third.summary = "Retro".to_string();

    // Act
    let edited = fixture
        .agenda
        .edit_event(third, SaveMode::Future)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_ne!(edited.uid, master.uid);
    assert_eq!(edited.start, berlin(2025, 3, 17, 9, 0));

    let old = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(old.len(), 2);
    assert!(old.iter().all(|r| r.summary == "Standup"));

    let new = series_rows(&fixture.agenda, &edited.uid).await;
    assert_eq!(new.len(), 3);
    assert!(new.iter().all(|r| r.summary == "Retro"));
    assert_eq!(new.last().unwrap().start, berlin(2025, 3, 31, 9, 0));

    assert_eq!(fixture.dav.hrefs().len(), 2);
    let old_data = fixture
        .dav
        .data(&format!("/cal/work/{}.ics", master.uid))
        .unwrap();
    assert!(old_data.contains("UNTIL="));
}

#[tokio::test]
async fn editing_future_occurrences_keeps_attendee_answers_on_the_old_series() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let mut standup = standup(fixture.calendar());
    standup.attendees = vec![
        Attendee::organizer("me@example.com"),
        Attendee {
            status: PartStat::Accepted,
            ..Attendee::new("ann@example.com")
        },
    ];
    let master = fixture.agenda.new_event(standup).await.unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut third = on_day(&rows, 2025, 3, 17);
    third.summary = "Retro".to_string();

    // Act
    fixture
        .agenda
        .edit_event(third, SaveMode::Future)
        .await
        .unwrap()
        .unwrap();

    // Assert
    let old = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(old.len(), 2);
    for row in &old {
        let ann = row
            .attendees
            .iter()
            .find(|a| a.email == "ann@example.com")
            .unwrap();
        assert_eq!(ann.status, PartStat::Accepted);
    }
    let old_data = fixture
        .dav
        .data(&format!("/cal/work/{}.ics", master.uid))
        .unwrap();
    assert!(old_data.contains("PARTSTAT=ACCEPTED"));
}

#[tokio::test]
async fn editing_future_occurrences_drops_exceptions_past_the_split() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut fourth = on_day(&rows, 2025, 3, 24);
    fourth.summary = "Planning".to_string();
    fixture
        .agenda
        .edit_event(fourth, SaveMode::Current)
        .await
        .unwrap()
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut third = on_day(&rows, 2025, 3, 17);
    third.summary = "Retro".to_string();

    // Act
    let edited = fixture
        .agenda
        .edit_event(third, SaveMode::Future)
        .await
        .unwrap()
        .unwrap();

    // Assert
    let old = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(old.len(), 2);
    assert!(old.iter().all(|r| !r.is_exception && r.summary == "Standup"));

    let new = series_rows(&fixture.agenda, &edited.uid).await;
    assert_eq!(new.len(), 3);
    assert!(new.iter().all(|r| r.summary == "Retro"));

    let old_data = fixture
        .dav
        .data(&format!("/cal/work/{}.ics", master.uid))
        .unwrap();
    assert!(!old_data.contains("RECURRENCE-ID"));
    assert!(!old_data.contains("Planning"));
}

#[tokio::test]
async fn remote_rule_with_set_position_expands_to_last_weekday() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    fixture.dav.store(
        "/cal/work/close.ics",
        "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Other Client//EN\r\n\
BEGIN:VEVENT\r\n\
UID:close\r\n\
DTSTAMP:20250101T000000Z\r\n\
DTSTART;TZID=Europe/Berlin:20250131T170000\r\n\
DTEND;TZID=Europe/Berlin:20250131T180000\r\n\
RRULE:FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=3\r\n\
SUMMARY:Month close\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
    );

    // Act
    let events = fixture
        .agenda
        .load_events(&EventQuery::default())
        .await
        .unwrap();

    // Assert
    let starts: Vec<_> = events
        .iter()
        .filter(|e| e.uid == "close")
        .map(|e| e.start.clone())
        .collect();
    assert_eq!(
        starts,
        vec![
            berlin(2025, 1, 31, 17, 0),
            berlin(2025, 2, 28, 17, 0),
            berlin(2025, 3, 31, 17, 0),
        ]
    );
    let rule = events
        .iter()
        .find_map(|e| e.recurrence.as_ref())
        .unwrap();
    assert_eq!(rule.other_parts, vec!["BYSETPOS=-1".to_string()]);
}

#[tokio::test]
async fn editing_future_from_the_first_occurrence_changes_the_whole_series() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let mut first = on_day(&rows, 2025, 3, 3);
    first.location = "Room 4".to_string();

    // Act
    let edited = fixture
        .agenda
        .edit_event(first, SaveMode::Future)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(edited.uid, master.uid);
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.location == "Room 4"));
    assert_eq!(fixture.dav.hrefs().len(), 1);
}

#[tokio::test]
async fn moving_the_whole_series_shifts_every_occurrence() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let second = on_day(&rows, 2025, 3, 10);

    // Act
    let moved = fixture
        .agenda
        .move_event(second.id.unwrap(), berlin(2025, 3, 10, 10, 0), SaveMode::All)
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert!(moved.sequence > master.sequence);
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].start, berlin(2025, 3, 3, 10, 0));
    assert_eq!(rows[0].end, berlin(2025, 3, 3, 10, 30));
    assert!(rows.iter().all(|r| r.start.hour() == 10));
}

#[tokio::test]
async fn removing_the_current_occurrence_excludes_it() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let fourth = on_day(&rows, 2025, 3, 24);

    // Act
    let removed = fixture
        .agenda
        .remove_event(fourth.id.unwrap(), SaveMode::Current)
        .await
        .unwrap();

    // Assert
    assert!(removed);
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.start.date() != jiff::civil::date(2025, 3, 24)));

    let data = fixture
        .dav
        .data(&format!("/cal/work/{}.ics", master.uid))
        .unwrap();
    assert!(data.contains("EXDATE;TZID=Europe/Berlin:20250324T090000"));
}

#[tokio::test]
async fn removing_future_occurrences_truncates_the_series() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let fourth = on_day(&rows, 2025, 3, 24);

    // Act
    fixture
        .agenda
        .remove_event(fourth.id.unwrap(), SaveMode::Future)
        .await
        .unwrap();

    // Assert
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.last().unwrap().start, berlin(2025, 3, 17, 9, 0));
}

#[tokio::test]
async fn removing_the_whole_series_deletes_the_remote_object() {
    // Arrange
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;
    let master = fixture
        .agenda
        .new_event(standup(fixture.calendar()))
        .await
        .unwrap();
    let rows = series_rows(&fixture.agenda, &master.uid).await;
    let second = on_day(&rows, 2025, 3, 10);

    // Act
    let removed = fixture
        .agenda
        .remove_event(second.id.unwrap(), SaveMode::All)
        .await
        .unwrap();

    // Assert
    assert!(removed);
    assert!(series_rows(&fixture.agenda, &master.uid).await.is_empty());
    assert!(fixture.dav.hrefs().is_empty());
}

#[tokio::test]
async fn removing_an_unknown_row_reports_false() {
    let fixture = remote_agenda(&[WORK_COLLECTION]).await;

    let removed = fixture
        .agenda
        .remove_event(calsync_core::EventId(4242), SaveMode::All)
        .await
        .unwrap();

    assert!(!removed);
}
