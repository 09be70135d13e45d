// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;
use std::sync::Arc;

use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp, Zoned};

use crate::Error;
use crate::calendar::{Calendar, CalendarFilter, NewCalendar, Source};
use crate::config::Config;
use crate::datetime::{parse_reference_id, shift_civil};
use crate::event::Event;
use crate::localdb::{EventFilter, LocalDb};
use crate::memo::RequestMemo;
use crate::push::{Change, PushController};
use crate::remote::{CalDavConnector, DavConnector};
use crate::series::SeriesWriter;
use crate::sync::{SyncOrchestrator, SyncReport, SyncSettings};
use crate::types::{CalendarId, CalendarKind, EventId, SaveMode, Scope};

/// How a caller points at an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRef {
    /// A stored row.
    Id(EventId),
    /// `uid` for a series, `uid@instance` for one of its occurrences.
    Reference(String),
}

impl From<EventId> for EventRef {
    fn from(id: EventId) -> Self {
        EventRef::Id(id)
    }
}

impl FromStr for EventRef {
    type Err = std::convert::Infallible;

    /// Numbers are row ids, anything else is a reference.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(id) => EventRef::Id(EventId(id)),
            Err(_) => EventRef::Reference(s.to_string()),
        })
    }
}

/// An event with the exceptions of its series.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDetails {
    pub event: Event,

    /// Filled only when asked for and the event belongs to a series.
    pub exceptions: Vec<Event>,
}

/// Conditions for [`Agenda::load_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events ending at or after this instant.
    pub start: Option<Timestamp>,

    /// Only events starting before this instant.
    pub end: Option<Timestamp>,

    /// Substring of summary, description or location.
    pub query: Option<String>,

    /// Restrict to these calendars; all active calendars when `None`.
    pub calendar_ids: Option<Vec<CalendarId>>,

    /// Include calendars mirrored from `.ics` files.
    pub include_virtual: bool,

    /// Only events changed at or after this instant.
    pub modified_since: Option<Timestamp>,
}

/// A remote account about to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSource {
    pub name: String,
    pub base_url: String,

    /// Principal URL calendars are discovered from.
    pub principal: String,

    /// Name of the configured credentials to log in with.
    pub credential: Option<String>,
}

/// The calendar store of one user, kept in step with its origins.
///
/// Reads first bring the calendars they touch up to date; writes are pushed to
/// the origin before they return.
#[derive(Debug, Clone)]
pub struct Agenda {
    db: LocalDb,
    sync: SyncOrchestrator,
    push: PushController,
    connector: Arc<dyn DavConnector>,
    tz: TimeZone,
    user_id: i64,
}

impl Agenda {
    /// Opens the store described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub async fn new(config: Config) -> Result<Self, Error> {
        let connector = Arc::new(CalDavConnector::new(
            config.credentials.clone(),
            config.debug,
        ));
        Self::with_connector(config, connector).await
    }

    /// Opens the store, reaching remote calendars through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or migrated.
    pub async fn with_connector(
        config: Config,
        connector: Arc<dyn DavConnector>,
    ) -> Result<Self, Error> {
        let db = LocalDb::open(config.database_path().as_deref()).await?;
        let tz = config.time_zone();
        let limits = config.limits();
        let writer = SeriesWriter::new(db.clone(), limits);
        let settings = SyncSettings {
            throttle_secs: config.sync_throttle_secs,
            default_tz: tz.clone(),
        };
        let sync = SyncOrchestrator::new(db.clone(), writer.clone(), connector.clone(), settings);
        let push = PushController::new(
            db.clone(),
            writer,
            sync.clone(),
            config.user_emails.clone(),
            limits,
        );

        Ok(Self {
            db,
            sync,
            push,
            connector,
            tz,
            user_id: config.user_id,
        })
    }

    /// The zone floating times are read in.
    #[must_use]
    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Calendars of the user matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_calendars(&self, filter: CalendarFilter) -> Result<Vec<Calendar>, Error> {
        let calendars = self.db.calendars.list(self.user_id).await?;
        Ok(calendars.into_iter().filter(|c| filter.matches(c)).collect())
    }

    /// Creates a local calendar or one mirroring an `.ics` file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for remote calendars, which come from
    /// [`create_source`](Self::create_source), or an incomplete definition.
    pub async fn create_calendar(&self, calendar: NewCalendar) -> Result<Calendar, Error> {
        if calendar.name.trim().is_empty() {
            return Err(Error::validation("calendar name must not be empty"));
        }
        match calendar.kind {
            CalendarKind::Local => {}
            CalendarKind::IcsFile if calendar.url.is_some() => {}
            CalendarKind::IcsFile => return Err(Error::validation("ICS calendars need a file path")),
            CalendarKind::CalDav => {
                return Err(Error::validation(
                    "remote calendars are created from their source",
                ));
            }
        }

        let id = self.db.calendars.insert(self.user_id, &calendar).await?;
        tracing::info!(%id, name = %calendar.name, kind = %calendar.kind, "created calendar");
        self.db
            .calendars
            .get(self.user_id, id)
            .await?
            .ok_or_else(|| Error::validation("created calendar vanished"))
    }

    /// Registers a remote account and creates a calendar for every collection
    /// found under its principal.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails; nothing is stored then.
    #[tracing::instrument(skip_all, fields(name = %source.name))]
    pub async fn create_source(&self, source: NewSource) -> Result<Vec<Calendar>, Error> {
        let id = self
            .db
            .sources
            .insert(
                self.user_id,
                &source.name,
                &source.base_url,
                &source.principal,
                source.credential.as_deref(),
            )
            .await?;
        let stored = Source {
            id,
            user_id: self.user_id,
            name: source.name,
            base_url: source.base_url,
            principal: source.principal,
            credential: source.credential,
        };

        match self.discover(&stored).await {
            Ok(calendars) => Ok(calendars),
            Err(e) => {
                if let Err(err) = self.db.sources.delete(self.user_id, id).await {
                    tracing::error!(error = %err, "failed to remove source after discovery failed");
                }
                Err(e)
            }
        }
    }

    async fn discover(&self, source: &Source) -> Result<Vec<Calendar>, Error> {
        let client = self.connector.connect(source)?;
        let found = client.discover_calendars(&source.principal).await?;
        tracing::info!(count = found.len(), "discovered calendars");

        let mut calendars = Vec::with_capacity(found.len());
        for remote in found {
            let calendar = NewCalendar {
                source_id: Some(source.id),
                kind: CalendarKind::CalDav,
                name: remote.name.unwrap_or_else(|| remote.href.clone()),
                color: remote.color,
                url: Some(remote.href),
                readonly: false,
            };
            let id = self.db.calendars.insert(self.user_id, &calendar).await?;
            if let Some(calendar) = self.db.calendars.get(self.user_id, id).await? {
                calendars.push(calendar);
            }
        }
        Ok(calendars)
    }

    /// Stores a new event and pushes it to its calendar's origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid event or a calendar that
    /// cannot be written, and remote errors from the push.
    pub async fn new_event(&self, event: Event) -> Result<Event, Error> {
        let event = normalize(event)?;
        let calendar = self.writable_calendar(event.calendar_id).await?;
        let created = self.push.create(&calendar, event).await?;
        tracing::info!(uid = %created.uid, "created event");
        Ok(created)
    }

    /// Applies an edited copy of a stored row under a save mode.
    ///
    /// Returns the row standing for the edit afterwards, or `None` if the row
    /// does not exist in a writable calendar of the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid edit, and remote errors
    /// from the push.
    pub async fn edit_event(&self, event: Event, mode: SaveMode) -> Result<Option<Event>, Error> {
        let event = normalize(event)?;
        let id = event
            .id
            .ok_or_else(|| Error::validation("edited event has no id"))?;
        let Some((calendar, target)) = self.writable_target(id).await? else {
            return Ok(None);
        };
        if event.calendar_id != target.calendar_id {
            return Err(Error::validation(
                "moving events between calendars is not supported",
            ));
        }

        let scope = calendar.scope();
        self.push
            .apply(&scope, &calendar, &target, &Change::Edit(event), mode)
            .await
    }

    /// Moves an event to a new start, keeping its length.
    ///
    /// # Errors
    ///
    /// See [`edit_event`](Self::edit_event).
    pub async fn move_event(
        &self,
        id: EventId,
        start: Zoned,
        mode: SaveMode,
    ) -> Result<Option<Event>, Error> {
        let Some((_, mut event)) = self.writable_target(id).await? else {
            return Ok(None);
        };
        let duration = event.duration();
        event.end = shift_civil(&start, duration)?;
        event.start = start;
        self.edit_event(event, mode).await
    }

    /// Changes the end of an event, keeping its start.
    ///
    /// # Errors
    ///
    /// See [`edit_event`](Self::edit_event).
    pub async fn resize_event(
        &self,
        id: EventId,
        end: Zoned,
        mode: SaveMode,
    ) -> Result<Option<Event>, Error> {
        let Some((_, mut event)) = self.writable_target(id).await? else {
            return Ok(None);
        };
        event.end = end;
        self.edit_event(event, mode).await
    }

    /// Removes an event under a save mode. Returns `false` if there was no such
    /// row in a writable calendar.
    ///
    /// # Errors
    ///
    /// Returns remote errors from the push.
    pub async fn remove_event(&self, id: EventId, mode: SaveMode) -> Result<bool, Error> {
        let Some((calendar, target)) = self.writable_target(id).await? else {
            return Ok(false);
        };
        if mode == SaveMode::New {
            return Err(Error::validation("cannot remove with save mode 'new'"));
        }

        let scope = calendar.scope();
        self.push
            .apply(&scope, &calendar, &target, &Change::Remove, mode)
            .await?;
        tracing::info!(%id, %mode, "removed event");
        Ok(true)
    }

    /// Looks up an event in the calendars matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn get_event(
        &self,
        reference: &EventRef,
        filter: CalendarFilter,
        expand_exceptions: bool,
    ) -> Result<Option<EventDetails>, Error> {
        let calendars = self.list_calendars(filter).await?;
        let scope = Scope {
            user_id: self.user_id,
            calendar_ids: calendars.iter().map(|c| c.id).collect(),
        };

        let mut memo = RequestMemo::new();
        let event = match reference {
            EventRef::Id(id) => memo.get(&self.db.events, &scope, *id).await?,
            EventRef::Reference(reference) => {
                let (uid, instance) = parse_reference_id(reference);
                self.db
                    .events
                    .find(&scope, &uid, instance.as_deref())
                    .await?
            }
        };
        let Some(event) = event else {
            return Ok(None);
        };

        let exceptions = match (expand_exceptions, event.recurrence_id.or(event.id)) {
            (true, Some(master_id)) if event.is_recurring() => {
                self.db.events.exceptions(&scope, master_id).await?
            }
            _ => Vec::new(),
        };
        Ok(Some(EventDetails { event, exceptions }))
    }

    /// Visible events of the active calendars, after bringing each calendar up
    /// to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails. Unreachable origins are not errors.
    pub async fn load_events(&self, query: &EventQuery) -> Result<Vec<Event>, Error> {
        let mut calendars = self.list_calendars(CalendarFilter::Active).await?;
        if let Some(ids) = &query.calendar_ids {
            calendars.retain(|c| ids.contains(&c.id));
        }
        if !query.include_virtual {
            calendars.retain(|c| c.kind != CalendarKind::IcsFile);
        }

        for calendar in &calendars {
            self.sync.ensure_fresh(calendar).await?;
        }

        let scope = Scope {
            user_id: self.user_id,
            calendar_ids: calendars.iter().map(|c| c.id).collect(),
        };
        let filter = EventFilter {
            start: query.start,
            end: query.end,
            query: query.query.clone(),
            modified_since: query.modified_since,
            exclude_ics: !query.include_virtual,
        };
        self.db.events.list(&scope, &filter).await
    }

    /// Events whose alarm is due at `time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn pending_alarms(
        &self,
        time: Timestamp,
        calendar_ids: Option<&[CalendarId]>,
    ) -> Result<Vec<Event>, Error> {
        let mut scope = self.scope(CalendarFilter::Active).await?;
        if let Some(ids) = calendar_ids {
            scope = scope.narrow(ids);
        }
        self.db.events.pending_alarms(&scope, time).await
    }

    /// Silences the alarm of a row, or postpones it by `snooze_secs`.
    /// Returns `false` if there is no such row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn dismiss_alarm(&self, id: EventId, snooze_secs: i64) -> Result<bool, Error> {
        let scope = self.scope(CalendarFilter::All).await?;
        let notify_at = if snooze_secs > 0 {
            let snoozed = Timestamp::now()
                .checked_add(SignedDuration::from_secs(snooze_secs))
                .map_err(|e| Error::validation(format!("Snooze out of range: {e}")))?;
            Some(snoozed)
        } else {
            None
        };
        self.db.events.set_notify_at(&scope, id, notify_at).await
    }

    /// Synchronizes a calendar now, regardless of when it was last checked.
    /// Returns `None` if the user has no such calendar.
    ///
    /// # Errors
    ///
    /// Returns remote errors; unlike reads, an explicit sync does not hide them.
    pub async fn sync_now(&self, calendar_id: CalendarId) -> Result<Option<SyncReport>, Error> {
        match self.db.calendars.get(self.user_id, calendar_id).await? {
            Some(calendar) => Ok(Some(self.sync.sync_now(&calendar).await?)),
            None => Ok(None),
        }
    }

    /// Closes the store.
    pub async fn close(self) {
        self.db.close().await;
    }

    async fn scope(&self, filter: CalendarFilter) -> Result<Scope, Error> {
        let calendars = self.list_calendars(filter).await?;
        Ok(Scope {
            user_id: self.user_id,
            calendar_ids: calendars.iter().map(|c| c.id).collect(),
        })
    }

    async fn writable_calendar(&self, id: CalendarId) -> Result<Calendar, Error> {
        match self.db.calendars.get(self.user_id, id).await? {
            Some(calendar) if calendar.is_writable() => Ok(calendar),
            Some(calendar) => Err(Error::validation(format!(
                "Calendar '{}' is read-only",
                calendar.name
            ))),
            None => Err(Error::validation(format!("Unknown calendar {id}"))),
        }
    }

    /// A stored row together with its calendar, if the user may change it.
    async fn writable_target(&self, id: EventId) -> Result<Option<(Calendar, Event)>, Error> {
        let calendars = self.list_calendars(CalendarFilter::All).await?;
        let scope = Scope {
            user_id: self.user_id,
            calendar_ids: calendars.iter().map(|c| c.id).collect(),
        };
        let Some(event) = self.db.events.get(&scope, id).await? else {
            return Ok(None);
        };
        let Some(calendar) = calendars.into_iter().find(|c| c.id == event.calendar_id) else {
            return Ok(None);
        };
        if !calendar.is_writable() {
            return Err(Error::validation(format!(
                "Calendar '{}' is read-only",
                calendar.name
            )));
        }
        Ok(Some((calendar, event)))
    }
}

/// Checks an event before any I/O and brings all-day times into shape.
fn normalize(mut event: Event) -> Result<Event, Error> {
    if event.end < event.start {
        return Err(Error::validation("event must not end before it starts"));
    }
    if let Some(rule) = &event.recurrence
        && rule.interval == 0
    {
        return Err(Error::validation("recurrence interval must be positive"));
    }

    if event.all_day {
        let tz = event.start.time_zone().clone();
        let first = event.start.date();
        let last = event.end.with_time_zone(tz.clone()).date();
        event.start = first
            .to_zoned(tz.clone())
            .map_err(|e| Error::validation(format!("Invalid start: {e}")))?;
        event.end = last
            .at(23, 0, 0, 0)
            .to_zoned(tz)
            .map_err(|e| Error::validation(format!("Invalid end: {e}")))?;
    }
    Ok(event)
}
