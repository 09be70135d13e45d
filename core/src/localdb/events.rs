// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::Error;
use crate::datetime::{format_utc, parse_utc, resolve_zone, zone_name};
use crate::event::Event;
use crate::recurrence::Recurrence;
use crate::types::{CalendarId, EventId, Scope};

const COLUMNS: &str = "\
id, calendar_id, recurrence_id, is_exception, instance, uid, tzid, start, end, all_day, \
recurrence, sequence, summary, description, location, free_busy, sensitivity, status, \
attendees, alarms, url, etag, created, changed, notify_at";

/// Conditions for [`Events::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Only rows ending at or after this instant.
    pub start: Option<Timestamp>,

    /// Only rows starting before this instant.
    pub end: Option<Timestamp>,

    /// Substring of summary, description or location.
    pub query: Option<String>,
    pub modified_since: Option<Timestamp>,

    /// Leave out calendars mirrored from `.ics` files.
    pub exclude_ics: bool,
}

#[derive(Debug, Clone)]
pub struct Events {
    pool: SqlitePool,
}

impl Events {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a row of an entitled calendar. A row that already carries an id keeps it.
    pub async fn insert(&self, scope: &Scope, event: &Event) -> Result<EventId, Error> {
        insert_on(&self.pool, scope, event).await
    }

    /// Overwrites a row of the scope; it may not leave the entitled calendars.
    pub async fn update(&self, scope: &Scope, event: &Event) -> Result<(), Error> {
        let id = event
            .id
            .ok_or_else(|| Error::validation("cannot update an event that was never stored"))?;
        let row = EventRow::try_from(event)?;
        let calendar_id = row.calendar_id;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE events SET ");
        let mut set = qb.separated(", ");
        set.push("calendar_id = ").push_bind_unseparated(row.calendar_id);
        set.push("recurrence_id = ").push_bind_unseparated(row.recurrence_id);
        set.push("is_exception = ").push_bind_unseparated(row.is_exception);
        set.push("instance = ").push_bind_unseparated(row.instance);
        set.push("uid = ").push_bind_unseparated(row.uid);
        set.push("tzid = ").push_bind_unseparated(row.tzid);
        set.push("start = ").push_bind_unseparated(row.start);
        set.push("end = ").push_bind_unseparated(row.end);
        set.push("all_day = ").push_bind_unseparated(row.all_day);
        set.push("recurrence = ").push_bind_unseparated(row.recurrence);
        set.push("sequence = ").push_bind_unseparated(row.sequence);
        set.push("summary = ").push_bind_unseparated(row.summary);
        set.push("description = ").push_bind_unseparated(row.description);
        set.push("location = ").push_bind_unseparated(row.location);
        set.push("free_busy = ").push_bind_unseparated(row.free_busy);
        set.push("sensitivity = ").push_bind_unseparated(row.sensitivity);
        set.push("status = ").push_bind_unseparated(row.status);
        set.push("attendees = ").push_bind_unseparated(row.attendees);
        set.push("alarms = ").push_bind_unseparated(row.alarms);
        set.push("url = ").push_bind_unseparated(row.url);
        set.push("etag = ").push_bind_unseparated(row.etag);
        set.push("created = ").push_bind_unseparated(row.created);
        set.push("changed = ").push_bind_unseparated(row.changed);
        set.push("notify_at = ").push_bind_unseparated(row.notify_at);
        qb.push(" WHERE id = ").push_bind(id.0).push(" AND ");
        push_scope(&mut qb, scope);
        qb.push(" AND ");
        push_calendar_scope(&mut qb, scope, calendar_id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::validation(format!("Event {id} is not in scope")));
        }
        Ok(())
    }

    pub async fn get(&self, scope: &Scope, id: EventId) -> Result<Option<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND id = ").push_bind(id.0);
        fetch_optional(&self.pool, qb).await
    }

    /// Looks up a master by UID, or the row of one of its instances.
    pub async fn find(
        &self,
        scope: &Scope,
        uid: &str,
        instance: Option<&str>,
    ) -> Result<Option<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND uid = ").push_bind(uid.to_string());
        match instance {
            Some(instance) => {
                qb.push(" AND recurrence_id <> 0 AND instance = ")
                    .push_bind(instance.to_string());
            }
            None => {
                qb.push(" AND recurrence_id = 0");
            }
        }
        qb.push(" ORDER BY id LIMIT 1");
        fetch_optional(&self.pool, qb).await
    }

    /// The master stored under a remote href.
    pub async fn find_by_href(&self, scope: &Scope, href: &str) -> Result<Option<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND recurrence_id = 0 AND url = ")
            .push_bind(href.to_string());
        fetch_optional(&self.pool, qb).await
    }

    /// All masters of the scope.
    pub async fn masters(&self, scope: &Scope) -> Result<Vec<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND recurrence_id = 0 ORDER BY id");
        fetch_all(&self.pool, qb).await
    }

    /// Exceptions of a master, ordered by instance.
    pub async fn exceptions(&self, scope: &Scope, master_id: EventId) -> Result<Vec<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND recurrence_id = ")
            .push_bind(master_id.0)
            .push(" AND is_exception = 1 ORDER BY instance");
        fetch_all(&self.pool, qb).await
    }

    /// A master followed by every row it owns.
    pub async fn series(&self, scope: &Scope, master_id: EventId) -> Result<Vec<Event>, Error> {
        let mut qb = select(scope);
        push_series(&mut qb, master_id);
        qb.push(" ORDER BY recurrence_id, instance");
        fetch_all(&self.pool, qb).await
    }

    /// Visible rows of the scope: occurrences, exceptions, and masters whose
    /// base instance is not overridden by an exception.
    pub async fn list(&self, scope: &Scope, filter: &EventFilter) -> Result<Vec<Event>, Error> {
        let mut qb = select(scope);
        if let Some(start) = filter.start {
            qb.push(" AND end >= ").push_bind(format_utc(start));
        }
        if let Some(end) = filter.end {
            qb.push(" AND start < ").push_bind(format_utc(end));
        }
        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{query}%");
            qb.push(" AND (summary LIKE ")
                .push_bind(pattern.clone())
                .push(" OR description LIKE ")
                .push_bind(pattern.clone())
                .push(" OR location LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(since) = filter.modified_since {
            qb.push(" AND changed >= ").push_bind(format_utc(since));
        }
        if filter.exclude_ics {
            qb.push(" AND calendar_id NOT IN (SELECT id FROM calendars WHERE kind = 2)");
        }
        qb.push(" ORDER BY start, id");
        let rows = fetch_all(&self.pool, qb).await?;

        let masters: Vec<EventId> = rows
            .iter()
            .filter(|e| e.is_master() && e.recurrence.is_some())
            .filter_map(|e| e.id)
            .collect();
        let shadows = self.shadowed(scope, &masters).await?;
        Ok(rows
            .into_iter()
            .filter(|e| {
                !e.is_master()
                    || e.id
                        .is_none_or(|id| !shadows.contains(&(id, e.base_instance())))
            })
            .collect())
    }

    /// Rows of active calendars whose alarm is due at `time`.
    pub async fn pending_alarms(&self, scope: &Scope, time: Timestamp) -> Result<Vec<Event>, Error> {
        let mut qb = select(scope);
        qb.push(" AND notify_at IS NOT NULL AND notify_at <= ")
            .push_bind(format_utc(time))
            .push(" AND calendar_id IN (SELECT id FROM calendars WHERE active = 1)")
            .push(" ORDER BY notify_at, id");
        fetch_all(&self.pool, qb).await
    }

    /// Returns whether a row of the scope was changed.
    pub async fn set_notify_at(
        &self,
        scope: &Scope,
        id: EventId,
        notify_at: Option<Timestamp>,
    ) -> Result<bool, Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE events SET notify_at = ");
        qb.push_bind(notify_at.map(format_utc))
            .push(" WHERE id = ")
            .push_bind(id.0)
            .push(" AND ");
        push_scope(&mut qb, scope);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_remote(
        &self,
        scope: &Scope,
        id: EventId,
        url: &str,
        etag: &str,
    ) -> Result<(), Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE events SET url = ");
        qb.push_bind(url.to_string())
            .push(", etag = ")
            .push_bind(etag.to_string())
            .push(" WHERE id = ")
            .push_bind(id.0)
            .push(" AND ");
        push_scope(&mut qb, scope);
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn delete(&self, scope: &Scope, id: EventId) -> Result<(), Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE id = ");
        qb.push_bind(id.0).push(" AND ");
        push_scope(&mut qb, scope);
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Deletes a master and every row it owns.
    pub async fn delete_series(&self, scope: &Scope, master_id: EventId) -> Result<(), Error> {
        delete_series_on(&self.pool, scope, master_id).await
    }

    /// Deletes every row owned by a master, exceptions included.
    pub async fn delete_children(&self, scope: &Scope, master_id: EventId) -> Result<(), Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE recurrence_id = ");
        qb.push_bind(master_id.0).push(" AND ");
        push_scope(&mut qb, scope);
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Replaces the generated occurrences of a master, leaving exceptions alone.
    pub async fn replace_generated(
        &self,
        scope: &Scope,
        master_id: EventId,
        rows: &[Event],
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE recurrence_id = ");
        qb.push_bind(master_id.0).push(" AND is_exception = 0 AND ");
        push_scope(&mut qb, scope);
        qb.build().execute(&mut *tx).await?;
        for row in rows {
            insert_on(&mut *tx, scope, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Puts a series back exactly as captured, ids included.
    pub async fn restore_series(
        &self,
        scope: &Scope,
        master_id: EventId,
        rows: &[Event],
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        delete_series_on(&mut *tx, scope, master_id).await?;
        for row in rows {
            insert_on(&mut *tx, scope, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn shadowed(
        &self,
        scope: &Scope,
        masters: &[EventId],
    ) -> Result<HashSet<(EventId, String)>, Error> {
        if masters.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT recurrence_id, instance FROM events WHERE is_exception = 1 AND recurrence_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in masters {
            ids.push_bind(id.0);
        }
        ids.push_unseparated(")");
        qb.push(" AND ");
        push_scope(&mut qb, scope);
        let pairs: Vec<(i64, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(pairs
            .into_iter()
            .map(|(id, instance)| (EventId(id), instance))
            .collect())
    }
}

async fn insert_on<'e, E>(executor: E, scope: &Scope, event: &Event) -> Result<EventId, Error>
where
    E: SqliteExecutor<'e>,
{
    let row = EventRow::try_from(event)?;
    let calendar_id = row.calendar_id;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO events ({COLUMNS}) SELECT "));
    let mut values = qb.separated(", ");
    values.push_bind(event.id.map(|id| id.0));
    values.push_bind(row.calendar_id);
    values.push_bind(row.recurrence_id);
    values.push_bind(row.is_exception);
    values.push_bind(row.instance);
    values.push_bind(row.uid);
    values.push_bind(row.tzid);
    values.push_bind(row.start);
    values.push_bind(row.end);
    values.push_bind(row.all_day);
    values.push_bind(row.recurrence);
    values.push_bind(row.sequence);
    values.push_bind(row.summary);
    values.push_bind(row.description);
    values.push_bind(row.location);
    values.push_bind(row.free_busy);
    values.push_bind(row.sensitivity);
    values.push_bind(row.status);
    values.push_bind(row.attendees);
    values.push_bind(row.alarms);
    values.push_bind(row.url);
    values.push_bind(row.etag);
    values.push_bind(row.created);
    values.push_bind(row.changed);
    values.push_bind(row.notify_at);
    qb.push(" WHERE ");
    push_calendar_scope(&mut qb, scope, calendar_id);

    let result = qb.build().execute(executor).await?;
    if result.rows_affected() == 0 {
        return Err(Error::validation(format!(
            "Calendar {calendar_id} is not in scope"
        )));
    }
    Ok(EventId(result.last_insert_rowid()))
}

async fn delete_series_on<'e, E>(executor: E, scope: &Scope, master_id: EventId) -> Result<(), Error>
where
    E: SqliteExecutor<'e>,
{
    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM events WHERE ");
    push_scope(&mut qb, scope);
    push_series(&mut qb, master_id);
    qb.build().execute(executor).await?;
    Ok(())
}

fn select(scope: &Scope) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM events WHERE "));
    push_scope(&mut qb, scope);
    qb
}

/// Restricts a query to the entitled calendars of the scope's user.
fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &Scope) {
    if scope.calendar_ids.is_empty() {
        qb.push("1 = 0");
        return;
    }

    qb.push("calendar_id IN (");
    let mut ids = qb.separated(", ");
    for id in &scope.calendar_ids {
        ids.push_bind(id.0);
    }
    ids.push_unseparated(")");
    qb.push(" AND calendar_id IN (SELECT id FROM calendars WHERE user_id = ")
        .push_bind(scope.user_id)
        .push(")");
}

/// Restricts a statement to rows going into `calendar`, which must be entitled.
fn push_calendar_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &Scope, calendar: CalendarId) {
    if !scope.calendar_ids.contains(&calendar) {
        qb.push("1 = 0");
        return;
    }

    qb.push("EXISTS (SELECT 1 FROM calendars WHERE id = ")
        .push_bind(calendar.0)
        .push(" AND user_id = ")
        .push_bind(scope.user_id)
        .push(")");
}

/// Appends the rows of a series: the master and the rows it owns.
fn push_series(qb: &mut QueryBuilder<'_, Sqlite>, master_id: EventId) {
    qb.push(" AND (id = ")
        .push_bind(master_id.0)
        .push(" OR recurrence_id = ")
        .push_bind(master_id.0)
        .push(")");
}

async fn fetch_optional(
    pool: &SqlitePool,
    mut qb: QueryBuilder<'_, Sqlite>,
) -> Result<Option<Event>, Error> {
    let record: Option<EventRecord> = qb.build_query_as().fetch_optional(pool).await?;
    record.map(Event::try_from).transpose()
}

async fn fetch_all(pool: &SqlitePool, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<Event>, Error> {
    let records: Vec<EventRecord> = qb.build_query_as().fetch_all(pool).await?;
    records.into_iter().map(Event::try_from).collect()
}

/// Column values of an event, ready to bind.
struct EventRow {
    calendar_id: CalendarId,
    recurrence_id: i64,
    is_exception: bool,
    instance: String,
    uid: String,
    tzid: String,
    start: String,
    end: String,
    all_day: bool,
    recurrence: Option<String>,
    sequence: i64,
    summary: String,
    description: String,
    location: String,
    free_busy: String,
    sensitivity: String,
    status: String,
    attendees: String,
    alarms: String,
    url: Option<String>,
    etag: Option<String>,
    created: String,
    changed: String,
    notify_at: Option<String>,
}

impl TryFrom<&Event> for EventRow {
    type Error = Error;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        let json = |e: serde_json::Error| Error::Store(sqlx::Error::Encode(Box::new(e)));
        Ok(Self {
            calendar_id: event.calendar_id,
            recurrence_id: event.recurrence_id.map_or(0, |id| id.0),
            is_exception: event.is_exception,
            instance: event.instance.clone(),
            uid: event.uid.clone(),
            tzid: zone_name(&event.start).to_string(),
            start: format_utc(event.start.timestamp()),
            end: format_utc(event.end.timestamp()),
            all_day: event.all_day,
            recurrence: event
                .recurrence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(json)?,
            sequence: event.sequence,
            summary: event.summary.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            free_busy: event.free_busy.to_string(),
            sensitivity: event.sensitivity.to_string(),
            status: event.status.to_string(),
            attendees: serde_json::to_string(&event.attendees).map_err(json)?,
            alarms: serde_json::to_string(&event.alarms).map_err(json)?,
            url: event.url.clone(),
            etag: event.etag.clone(),
            created: format_utc(event.created),
            changed: format_utc(event.changed),
            notify_at: event.notify_at.map(format_utc),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRecord {
    id: i64,
    calendar_id: i64,
    recurrence_id: i64,
    is_exception: bool,
    instance: String,
    uid: String,
    tzid: String,
    start: String,
    end: String,
    all_day: bool,
    recurrence: Option<String>,
    sequence: i64,
    summary: String,
    description: String,
    location: String,
    free_busy: String,
    sensitivity: String,
    status: String,
    attendees: String,
    alarms: String,
    url: Option<String>,
    etag: Option<String>,
    created: String,
    changed: String,
    notify_at: Option<String>,
}

impl TryFrom<EventRecord> for Event {
    type Error = Error;

    fn try_from(r: EventRecord) -> Result<Self, Self::Error> {
        let json = |e: serde_json::Error| Error::Store(sqlx::Error::Decode(Box::new(e)));
        let invalid = |column: &str, value: &str| {
            Error::Ics(format!("Invalid stored {column} of event {}: {value}", r.id))
        };

        let tz = resolve_zone(&r.tzid, &TimeZone::UTC);
        let recurrence: Option<Recurrence> = r
            .recurrence
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(json)?;
        Ok(Event {
            id: Some(EventId(r.id)),
            calendar_id: CalendarId(r.calendar_id),
            uid: r.uid.clone(),
            recurrence_id: (r.recurrence_id != 0).then_some(EventId(r.recurrence_id)),
            is_exception: r.is_exception,
            instance: r.instance.clone(),
            start: parse_utc(&r.start)?.to_zoned(tz.clone()),
            end: parse_utc(&r.end)?.to_zoned(tz),
            all_day: r.all_day,
            recurrence,
            sequence: r.sequence,
            summary: r.summary.clone(),
            description: r.description.clone(),
            location: r.location.clone(),
            free_busy: r
                .free_busy
                .parse()
                .map_err(|()| invalid("free_busy", &r.free_busy))?,
            sensitivity: r
                .sensitivity
                .parse()
                .map_err(|()| invalid("sensitivity", &r.sensitivity))?,
            status: r.status.parse().map_err(|()| invalid("status", &r.status))?,
            attendees: serde_json::from_str(&r.attendees).map_err(json)?,
            alarms: serde_json::from_str(&r.alarms).map_err(json)?,
            url: r.url.clone(),
            etag: r.etag.clone(),
            created: parse_utc(&r.created)?,
            changed: parse_utc(&r.changed)?,
            notify_at: r.notify_at.as_deref().map(parse_utc).transpose()?,
        })
    }
}
