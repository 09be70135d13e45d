// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Keeps calendars in step with their origin.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::calendar::Calendar;
use crate::diff::{DiffOutcome, LocalItem, PendingUpdate, RemoteEntry, UpdateAction, diff};
use crate::ics::{self, CalendarObject};
use crate::localdb::LocalDb;
use crate::remote::{DavClient, DavConnector};
use crate::series::SeriesWriter;
use crate::types::{CalendarKind, Scope};

/// Freshness of a calendar within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Checked recently enough, or just synced.
    Fresh,
    /// Due for a check.
    Stale,
    /// A sync is being applied.
    Syncing,
}

/// A remote object fetched because the diff asked for it.
#[derive(Debug, Clone)]
pub struct FetchedUpdate {
    pub update: PendingUpdate,
    pub object: CalendarObject,
}

/// Changes to apply to one calendar.
#[derive(Debug, Clone, Default)]
pub struct SyncUpdates {
    pub fetched: Vec<FetchedUpdate>,
    pub diff: DiffOutcome,
}

/// Counts of what a sync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Where a calendar's content comes from.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// The current collection tag of the origin.
    async fn get_ctag(&self) -> Result<Option<String>, Error>;

    /// Whether the origin is unchanged since `stored_ctag` was recorded.
    async fn is_synced(&self, stored_ctag: Option<&str>) -> Result<bool, Error> {
        Ok(ctag_matches(stored_ctag, self.get_ctag().await?.as_deref()))
    }

    /// Diffs the origin against the local masters and fetches what changed.
    async fn get_updates(&self, local: &[LocalItem]) -> Result<SyncUpdates, Error>;
}

/// A calendar mirrored from a `CalDAV` collection.
pub struct CalDavSync {
    client: Arc<dyn DavClient>,
    url: String,
    calendar: Calendar,
    default_tz: TimeZone,
}

impl CalDavSync {
    pub fn new(client: Arc<dyn DavClient>, calendar: Calendar, default_tz: TimeZone) -> Result<Self, Error> {
        let url = calendar
            .url
            .clone()
            .ok_or_else(|| Error::validation(format!("Calendar {} has no collection URL", calendar.id)))?;
        Ok(Self {
            client,
            url,
            calendar,
            default_tz,
        })
    }
}

#[async_trait]
impl SyncClient for CalDavSync {
    async fn get_ctag(&self) -> Result<Option<String>, Error> {
        self.client.get_ctag(&self.url).await
    }

    async fn get_updates(&self, local: &[LocalItem]) -> Result<SyncUpdates, Error> {
        let listing = self.client.list_collection(&self.url).await?;
        let outcome = diff(local, &listing);

        let mut fetched = Vec::with_capacity(outcome.updates.len());
        for update in &outcome.updates {
            let Some(remote) = self.client.fetch(&update.href).await? else {
                tracing::debug!(href = %update.href, "object vanished before it was fetched");
                continue;
            };
            let objects = ics::decode(&remote.data, self.calendar.id, &self.default_tz)?;
            if objects.len() > 1 {
                tracing::warn!(href = %update.href, count = objects.len(), "object holds several UIDs, keeping the first");
            }
            if let Some(object) = objects.into_iter().next() {
                let mut update = update.clone();
                update.etag = remote.etag;
                fetched.push(FetchedUpdate { update, object });
            }
        }
        Ok(SyncUpdates {
            fetched,
            diff: outcome,
        })
    }
}

/// A calendar mirrored from a local `.ics` file. Items are keyed `<path>#<uid>`.
pub struct IcsSnapshot {
    path: PathBuf,
    calendar: Calendar,
    default_tz: TimeZone,
}

impl IcsSnapshot {
    pub fn new(calendar: Calendar, default_tz: TimeZone) -> Result<Self, Error> {
        let path = calendar
            .url
            .clone()
            .map(PathBuf::from)
            .ok_or_else(|| Error::validation(format!("Calendar {} has no file path", calendar.id)))?;
        Ok(Self {
            path,
            calendar,
            default_tz,
        })
    }

    fn href(&self, uid: &str) -> String {
        format!("{}#{uid}", self.path.display())
    }
}

#[async_trait]
impl SyncClient for IcsSnapshot {
    async fn get_ctag(&self) -> Result<Option<String>, Error> {
        let meta = tokio::fs::metadata(&self.path).await?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| Timestamp::try_from(t).ok())
            .map_or(0, |t| t.as_millisecond());
        Ok(Some(format!("{}-{modified}", meta.len())))
    }

    async fn get_updates(&self, local: &[LocalItem]) -> Result<SyncUpdates, Error> {
        let data = tokio::fs::read_to_string(&self.path).await?;
        let objects = ics::decode(&data, self.calendar.id, &self.default_tz)?;

        let mut by_href: HashMap<String, CalendarObject> = HashMap::with_capacity(objects.len());
        let mut listing = Vec::with_capacity(objects.len());
        for object in objects {
            let href = self.href(&object.master.uid);
            listing.push(RemoteEntry {
                href: href.clone(),
                etag: object.version(),
            });
            by_href.insert(href, object);
        }

        let outcome = diff(local, &listing);
        let fetched = outcome
            .updates
            .iter()
            .filter_map(|update| {
                by_href.remove(&update.href).map(|object| FetchedUpdate {
                    update: update.clone(),
                    object,
                })
            })
            .collect();
        Ok(SyncUpdates {
            fetched,
            diff: outcome,
        })
    }
}

/// Whether a tag was recorded and the origin still reports it.
fn ctag_matches(stored: Option<&str>, current: Option<&str>) -> bool {
    stored.is_some() && stored == current
}

/// Settings of the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub throttle_secs: i64,
    pub default_tz: TimeZone,
}

/// Decides when calendars are synchronized and applies the changes.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    db: LocalDb,
    writer: SeriesWriter,
    connector: Arc<dyn DavConnector>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub(crate) fn new(
        db: LocalDb,
        writer: SeriesWriter,
        connector: Arc<dyn DavConnector>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            db,
            writer,
            connector,
            settings,
        }
    }

    /// Brings a calendar up to date unless it was checked within the throttle
    /// period. Failures of the origin are logged and the calendar is served
    /// from the store as it is.
    #[tracing::instrument(skip(self, calendar), fields(calendar_id = %calendar.id))]
    pub async fn ensure_fresh(&self, calendar: &Calendar) -> Result<SyncState, Error> {
        if !calendar.is_synced() {
            return Ok(SyncState::Fresh);
        }

        let now = Timestamp::now().as_second();
        let claimed = self
            .db
            .calendars
            .claim_check(calendar.id, now, self.settings.throttle_secs)
            .await?;
        if !claimed {
            tracing::trace!("checked recently");
            return Ok(SyncState::Fresh);
        }

        tracing::debug!(state = ?SyncState::Stale, "checking calendar");
        match self.sync(calendar, false).await {
            Ok(report) => {
                tracing::debug!(?report, "calendar fresh");
            }
            Err(e @ (Error::Store(_) | Error::Migrate(_))) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "sync failed, serving stored events");
            }
        }
        Ok(SyncState::Fresh)
    }

    /// Synchronizes a calendar right away, ignoring the throttle.
    #[tracing::instrument(skip(self, calendar), fields(calendar_id = %calendar.id))]
    pub async fn sync_now(&self, calendar: &Calendar) -> Result<SyncReport, Error> {
        if !calendar.is_synced() {
            return Ok(SyncReport::default());
        }
        let now = Timestamp::now().as_second();
        self.db.calendars.claim_check(calendar.id, now, 0).await?;
        self.sync(calendar, true).await
    }

    async fn sync(&self, calendar: &Calendar, force: bool) -> Result<SyncReport, Error> {
        // The stored tag may have changed since the caller loaded the calendar
        let stored = self.db.calendars.get(calendar.user_id, calendar.id).await?;
        let stored_ctag = stored.and_then(|c| c.ctag);

        let client = self.client(calendar).await?;
        // Read before listing, so changes made meanwhile show up next time
        let ctag = client.get_ctag().await?;
        if !force && ctag_matches(stored_ctag.as_deref(), ctag.as_deref()) {
            tracing::debug!("collection unchanged");
            return Ok(SyncReport::default());
        }

        tracing::debug!(state = ?SyncState::Syncing, ?ctag, "applying remote changes");
        let scope = calendar.scope();
        let local: Vec<LocalItem> = self
            .db
            .events
            .masters(&scope)
            .await?
            .into_iter()
            .filter_map(|e| {
                e.id.map(|id| LocalItem {
                    id,
                    href: e.url,
                    etag: e.etag,
                })
            })
            .collect();

        let updates = client.get_updates(&local).await?;
        let report = self.apply(&scope, calendar, updates).await?;
        self.db.calendars.set_ctag(calendar.id, ctag.as_deref()).await?;
        Ok(report)
    }

    async fn apply(
        &self,
        scope: &Scope,
        calendar: &Calendar,
        updates: SyncUpdates,
    ) -> Result<SyncReport, Error> {
        let now = Timestamp::now();
        let mut report = SyncReport::default();

        for FetchedUpdate { update, object } in updates.fetched {
            let mut object = object;
            object.master.calendar_id = calendar.id;
            object.master.url = Some(update.href.clone());
            object.master.etag = Some(update.etag.clone());

            match (update.action, update.local_id) {
                (UpdateAction::Update, Some(id)) => {
                    tracing::debug!(href = %update.href, %id, "updating event from remote");
                    self.writer.overwrite(scope, id, object, now).await?;
                    report.updated += 1;
                }
                _ => {
                    tracing::debug!(href = %update.href, "creating event from remote");
                    self.writer.create(scope, object.master, object.exceptions, now).await?;
                    report.created += 1;
                }
            }
        }

        // Orphans come from this calendar's own rows only
        for id in updates.diff.orphans {
            tracing::debug!(%id, "deleting event removed remotely");
            self.writer.delete(scope, id).await?;
            report.deleted += 1;
        }
        Ok(report)
    }

    /// Connects to the source of a remote calendar.
    pub(crate) async fn dav_client(&self, calendar: &Calendar) -> Result<Arc<dyn DavClient>, Error> {
        let source_id = calendar
            .source_id
            .ok_or_else(|| Error::validation(format!("Calendar {} has no source", calendar.id)))?;
        let source = self
            .db
            .sources
            .get(calendar.user_id, source_id)
            .await?
            .ok_or_else(|| Error::validation(format!("Unknown source {source_id}")))?;
        self.connector.connect(&source)
    }

    async fn client(&self, calendar: &Calendar) -> Result<Box<dyn SyncClient>, Error> {
        match calendar.kind {
            CalendarKind::CalDav => Ok(Box::new(CalDavSync::new(
                self.dav_client(calendar).await?,
                calendar.clone(),
                self.settings.default_tz.clone(),
            )?)),
            CalendarKind::IcsFile => Ok(Box::new(IcsSnapshot::new(
                calendar.clone(),
                self.settings.default_tz.clone(),
            )?)),
            CalendarKind::Local => Err(Error::validation("local calendars are not synchronized")),
        }
    }
}
