// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Writes of whole series: a master, its exceptions and its generated occurrences.

use jiff::Timestamp;

use crate::Error;
use crate::event::Event;
use crate::ics::CalendarObject;
use crate::localdb::LocalDb;
use crate::recurrence::{Limits, expand};
use crate::types::{EventId, Scope};

/// Rows of a series as they were before a change.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub master_id: EventId,
    pub rows: Vec<Event>,
}

#[derive(Debug, Clone)]
pub(crate) struct SeriesWriter {
    db: LocalDb,
    limits: Limits,
}

impl SeriesWriter {
    pub fn new(db: LocalDb, limits: Limits) -> Self {
        Self { db, limits }
    }

    /// Stores a new master with its exceptions and generates its occurrences.
    pub async fn create(
        &self,
        scope: &Scope,
        mut master: Event,
        exceptions: Vec<Event>,
        now: Timestamp,
    ) -> Result<Event, Error> {
        master.recurrence_id = None;
        master.is_exception = false;
        master.instance.clear();
        master.notify_at = master.next_alarm(now);
        let id = self.db.events.insert(scope, &master).await?;
        master.id = Some(id);

        for exception in exceptions {
            self.insert_exception(scope, &master, exception, now).await?;
        }
        self.regenerate(scope, &master, now).await?;
        Ok(master)
    }

    /// Replaces a stored series with a downloaded object, keeping the master id.
    pub async fn overwrite(
        &self,
        scope: &Scope,
        id: EventId,
        object: CalendarObject,
        now: Timestamp,
    ) -> Result<(), Error> {
        let mut master = object.master;
        master.id = Some(id);
        master.recurrence_id = None;
        master.instance.clear();
        master.notify_at = master.next_alarm(now);
        self.db.events.update(scope, &master).await?;

        self.db.events.delete_children(scope, id).await?;
        for exception in object.exceptions {
            self.insert_exception(scope, &master, exception, now).await?;
        }
        self.regenerate(scope, &master, now).await
    }

    /// Overwrites a master, stores the given exceptions and regenerates.
    ///
    /// Exceptions keep their ids; their instance keys may change.
    pub async fn rewrite(
        &self,
        scope: &Scope,
        master: &Event,
        exceptions: Vec<Event>,
        now: Timestamp,
    ) -> Result<(), Error> {
        let master_id = master
            .id
            .ok_or_else(|| Error::validation("cannot update an event that was never stored"))?;
        let mut master = master.clone();
        master.notify_at = master.next_alarm(now);
        self.db.events.update(scope, &master).await?;

        // Free every key first: rekeyed exceptions may take each other's slots
        self.db.events.replace_generated(scope, master_id, &[]).await?;
        for id in exceptions.iter().filter_map(|e| e.id) {
            self.db.events.delete(scope, id).await?;
        }
        for exception in exceptions {
            self.insert_exception(scope, &master, exception, now).await?;
        }
        self.regenerate(scope, &master, now).await
    }

    /// Turns an instance into an exception, or updates an existing one.
    pub async fn upsert_exception(
        &self,
        scope: &Scope,
        master: &Event,
        exception: Event,
        now: Timestamp,
    ) -> Result<EventId, Error> {
        match exception.id {
            Some(id) => {
                let row = exception_row(master, exception, now);
                self.db.events.update(scope, &row).await?;
                Ok(id)
            }
            None => self.insert_exception(scope, master, exception, now).await,
        }
    }

    /// Rebuilds the generated occurrences of a master.
    ///
    /// Exceptions are kept, except those beyond the last instance of a rule that
    /// ends by itself. A master without a rule loses every owned row.
    pub async fn regenerate(&self, scope: &Scope, master: &Event, now: Timestamp) -> Result<(), Error> {
        let master_id = master
            .id
            .ok_or_else(|| Error::validation("cannot expand an event that was never stored"))?;
        if master.recurrence.is_none() {
            return self.db.events.delete_children(scope, master_id).await;
        }

        let mut exceptions = self.db.events.exceptions(scope, master_id).await?;
        let expansion = expand(
            master,
            &exceptions.iter().map(|e| e.instance.clone()).collect::<Vec<_>>(),
            now,
            &self.limits,
        );

        if let Some(last) = &expansion.last_slot {
            let mut kept = Vec::with_capacity(exceptions.len());
            for exception in exceptions {
                let beyond = exception.nominal_start(master).is_some_and(|n| n > *last);
                match exception.id {
                    Some(id) if beyond => {
                        tracing::debug!(%id, instance = %exception.instance, "dropping exception past the series end");
                        self.db.events.delete(scope, id).await?;
                    }
                    _ => kept.push(exception),
                }
            }
            exceptions = kept;
        }

        let rows: Vec<Event> = expansion
            .occurrences
            .iter()
            .filter(|o| !o.is_base)
            .map(|o| master.occurrence(o, now))
            .collect();
        tracing::debug!(
            %master_id,
            occurrences = rows.len(),
            exceptions = exceptions.len(),
            "regenerated series"
        );
        self.db.events.replace_generated(scope, master_id, &rows).await
    }

    pub async fn snapshot(&self, scope: &Scope, master_id: EventId) -> Result<Snapshot, Error> {
        Ok(Snapshot {
            master_id,
            rows: self.db.events.series(scope, master_id).await?,
        })
    }

    pub async fn restore(&self, scope: &Scope, snapshot: &Snapshot) -> Result<(), Error> {
        tracing::debug!(master_id = %snapshot.master_id, rows = snapshot.rows.len(), "restoring series");
        self.db
            .events
            .restore_series(scope, snapshot.master_id, &snapshot.rows)
            .await
    }

    pub async fn delete(&self, scope: &Scope, master_id: EventId) -> Result<(), Error> {
        self.db.events.delete_series(scope, master_id).await
    }

    async fn insert_exception(
        &self,
        scope: &Scope,
        master: &Event,
        exception: Event,
        now: Timestamp,
    ) -> Result<EventId, Error> {
        let row = exception_row(master, exception, now);
        self.db.events.insert(scope, &row).await
    }
}

fn exception_row(master: &Event, mut exception: Event, now: Timestamp) -> Event {
    exception.calendar_id = master.calendar_id;
    exception.uid = master.uid.clone();
    exception.recurrence_id = master.id;
    exception.is_exception = true;
    exception.recurrence = None;
    exception.url = None;
    exception.etag = None;
    exception.notify_at = exception.next_alarm(now);
    exception
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;
    use crate::localdb::tests::store_with_calendar;
    use crate::recurrence::{Frequency, Recurrence};

    fn weekly(scope: &Scope, count: u32) -> Event {
        let start = date(2025, 3, 3).at(9, 0, 0, 0).in_tz("Europe/Berlin").unwrap();
        let end = date(2025, 3, 3).at(10, 0, 0, 0).in_tz("Europe/Berlin").unwrap();
        let mut event = Event::new(scope.calendar_ids[0], "Standup", start, end);
        event.recurrence = Some(Recurrence::new(Frequency::Weekly).with_count(count));
        event
    }

    fn now() -> Timestamp {
        "2025-01-01T00:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn create_generates_children_for_every_other_instance() {
        let (db, scope) = store_with_calendar().await;
        let writer = SeriesWriter::new(db.clone(), Limits::default());

        let master = writer.create(&scope, weekly(&scope, 5), Vec::new(), now()).await.unwrap();

        let rows = db.events.series(&scope, master.id.unwrap()).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows[1..].iter().all(|r| r.recurrence_id == master.id));
        assert_eq!(rows[4].instance, "20250331T090000");
    }

    #[tokio::test]
    async fn regenerate_keeps_exceptions_and_skips_their_instances() {
        let (db, scope) = store_with_calendar().await;
        let writer = SeriesWriter::new(db.clone(), Limits::default());
        let master = weekly(&scope, 5);
        let mut moved = master.clone();
        moved.instance = "20250317T090000".to_string();
        moved.summary = "Moved".to_string();

        let master = writer.create(&scope, master, vec![moved], now()).await.unwrap();
        writer.regenerate(&scope, &master, now()).await.unwrap();

        let rows = db.events.series(&scope, master.id.unwrap()).await.unwrap();
        assert_eq!(rows.len(), 5);
        let exceptions: Vec<_> = rows.iter().filter(|r| r.is_exception).collect();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].summary, "Moved");
    }

    #[tokio::test]
    async fn regenerate_drops_exceptions_past_new_end() {
        let (db, scope) = store_with_calendar().await;
        let writer = SeriesWriter::new(db.clone(), Limits::default());
        let master = weekly(&scope, 5);
        let mut late = master.clone();
        late.instance = "20250331T090000".to_string();
        let mut master = writer.create(&scope, master, vec![late], now()).await.unwrap();

        master.recurrence = Some(Recurrence::new(Frequency::Weekly).with_count(3));
        writer.rewrite(&scope, &master, Vec::new(), now()).await.unwrap();

        let rows = db.events.series(&scope, master.id.unwrap()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| !r.is_exception));
    }

    #[tokio::test]
    async fn regenerate_without_rule_removes_all_children() {
        let (db, scope) = store_with_calendar().await;
        let writer = SeriesWriter::new(db.clone(), Limits::default());
        let mut master = writer.create(&scope, weekly(&scope, 5), Vec::new(), now()).await.unwrap();

        master.recurrence = None;
        writer.rewrite(&scope, &master, Vec::new(), now()).await.unwrap();

        let rows = db.events.series(&scope, master.id.unwrap()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_restore_round_trips_series() {
        let (db, scope) = store_with_calendar().await;
        let writer = SeriesWriter::new(db.clone(), Limits::default());
        let master = writer.create(&scope, weekly(&scope, 3), Vec::new(), now()).await.unwrap();
        let snapshot = writer.snapshot(&scope, master.id.unwrap()).await.unwrap();

        writer.delete(&scope, master.id.unwrap()).await.unwrap();
        writer.restore(&scope, &snapshot).await.unwrap();

        let rows = db.events.series(&scope, master.id.unwrap()).await.unwrap();
        assert_eq!(rows, snapshot.rows);
    }
}
