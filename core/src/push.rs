// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Applies user edits to the store and writes them back to the calendar's
//! origin, retrying once when the remote copy changed underneath.

use jiff::Timestamp;

use crate::Error;
use crate::calendar::Calendar;
use crate::event::Event;
use crate::ics;
use crate::localdb::LocalDb;
use crate::memo::RequestMemo;
use crate::plan::{EditContext, Mutation, MutationPlan, plan_edit_as, plan_remove_as, resolve_mode};
use crate::recurrence::Limits;
use crate::remote::{DavClient, PutOutcome};
use crate::series::{SeriesWriter, Snapshot};
use crate::sync::SyncOrchestrator;
use crate::types::{CalendarKind, EventId, SaveMode, Scope};

/// A change requested for an existing event.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    /// Replace the target with this copy.
    Edit(Event),
    Remove,
}

/// The stored series around a target row.
#[derive(Debug, Clone)]
struct Loaded {
    master: Event,
    target: Event,
    exceptions: Vec<Event>,
}

/// What executing a plan did locally.
#[derive(Debug, Default)]
struct Applied {
    /// Masters whose calendar object must be written, in order.
    changed: Vec<EventId>,

    /// Masters the plan created; removed again on rollback.
    created: Vec<EventId>,

    /// Removed masters whose remote object must go too.
    deleted: Vec<Event>,

    /// `(uid, instance)` of the row that stands for the edit afterwards.
    result: Option<(String, Option<String>)>,
}

impl Applied {
    fn touch(&mut self, id: EventId) {
        if !self.changed.contains(&id) {
            self.changed.push(id);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PushController {
    db: LocalDb,
    writer: SeriesWriter,
    sync: SyncOrchestrator,
    user_emails: Vec<String>,
    limits: Limits,
}

impl PushController {
    pub fn new(
        db: LocalDb,
        writer: SeriesWriter,
        sync: SyncOrchestrator,
        user_emails: Vec<String>,
        limits: Limits,
    ) -> Self {
        Self {
            db,
            writer,
            sync,
            user_emails,
            limits,
        }
    }

    /// Stores a brand-new event and pushes it. Returns the stored master.
    #[tracing::instrument(skip_all, fields(calendar_id = %calendar.id))]
    pub async fn create(&self, calendar: &Calendar, event: Event) -> Result<Event, Error> {
        ensure_writable(calendar)?;
        let now = Timestamp::now();
        let plan = MutationPlan {
            steps: vec![Mutation::CreateSeries { master: event }],
        };

        let mut applied = Applied::default();
        let mut memo = RequestMemo::new();
        let scope = calendar.scope();
        if let Err(e) = self
            .execute(&scope, calendar, plan, now, &mut applied, &mut memo)
            .await
        {
            self.rollback(&scope, None, &applied).await;
            return Err(e);
        }
        self.refresh(calendar).await;
        self.reload(&scope, &applied)
            .await?
            .ok_or_else(|| Error::validation("created event vanished"))
    }

    /// Applies a change to an existing row under a save mode.
    ///
    /// Returns the row standing for the edit afterwards, `None` for removals
    /// or when the target does not exist.
    #[tracing::instrument(skip_all, fields(calendar_id = %calendar.id, uid = %target.uid, %mode))]
    pub async fn apply(
        &self,
        scope: &Scope,
        calendar: &Calendar,
        target: &Event,
        change: &Change,
        mode: SaveMode,
    ) -> Result<Option<Event>, Error> {
        ensure_writable(calendar)?;
        let instance = (!target.is_master()).then(|| target.instance.clone());
        let mut memo = RequestMemo::new();
        let Some(mut loaded) = self.load(scope, &target.uid, instance.as_deref(), &mut memo).await? else {
            return Ok(None);
        };
        let master_id = loaded
            .master
            .id
            .ok_or_else(|| Error::validation("event was never stored"))?;

        // Resolved once: the retry re-applies the same decision
        let mode = {
            let ctx = self.context(&loaded, Timestamp::now());
            resolve_mode(&ctx, mode)
        };
        let original = self.writer.snapshot(scope, master_id).await?;

        let mut retried = false;
        loop {
            let now = Timestamp::now();
            let ctx = self.context(&loaded, now);
            let plan = match change {
                Change::Edit(edit) => plan_edit_as(&ctx, edit, mode)?,
                Change::Remove => plan_remove_as(&ctx, mode)?,
            };
            tracing::debug!(steps = plan.steps.len(), %mode, "executing plan");

            let snapshot = self.writer.snapshot(scope, master_id).await?;
            let mut applied = Applied::default();
            let result = self
                .execute(scope, calendar, plan, now, &mut applied, &mut memo)
                .await;
            match result {
                Ok(()) => {
                    self.refresh(calendar).await;
                    return self.reload(scope, &applied).await;
                }
                Err(Error::RemoteConflict { href }) if !retried => {
                    tracing::info!(%href, "remote object changed, retrying after sync");
                    retried = true;
                    self.rollback(scope, Some(&snapshot), &applied).await;
                    memo.clear();
                    self.sync.sync_now(calendar).await?;
                    loaded = match self
                        .load(scope, &target.uid, instance.as_deref(), &mut memo)
                        .await?
                    {
                        Some(loaded) => loaded,
                        None => {
                            tracing::warn!(%href, "event was removed remotely");
                            return Err(Error::RemoteConflict { href });
                        }
                    };
                }
                Err(e @ Error::RemoteConflict { .. }) => {
                    tracing::warn!(error = %e, "conflict persisted after retry");
                    self.rollback(scope, Some(&original), &applied).await;
                    if let Err(err) = self.db.calendars.invalidate(calendar.id).await {
                        tracing::error!(error = %err, "failed to invalidate calendar");
                    }
                    return Err(e);
                }
                Err(e) => {
                    self.rollback(scope, Some(&snapshot), &applied).await;
                    return Err(e);
                }
            }
        }
    }

    fn context<'a>(&'a self, loaded: &'a Loaded, now: Timestamp) -> EditContext<'a> {
        EditContext {
            master: &loaded.master,
            target: &loaded.target,
            exceptions: &loaded.exceptions,
            user_emails: &self.user_emails,
            limits: self.limits,
            now,
        }
    }

    async fn load(
        &self,
        scope: &Scope,
        uid: &str,
        instance: Option<&str>,
        memo: &mut RequestMemo,
    ) -> Result<Option<Loaded>, Error> {
        let Some(target) = self.db.events.find(scope, uid, instance).await? else {
            return Ok(None);
        };
        memo.remember(&target);

        let master = match target.recurrence_id {
            None => target.clone(),
            Some(master_id) => match memo.get(&self.db.events, scope, master_id).await? {
                Some(master) => master,
                None => return Ok(None),
            },
        };
        let exceptions = match master.id {
            Some(id) => self.db.events.exceptions(scope, id).await?,
            None => Vec::new(),
        };
        Ok(Some(Loaded {
            master,
            target,
            exceptions,
        }))
    }

    async fn execute(
        &self,
        scope: &Scope,
        calendar: &Calendar,
        plan: MutationPlan,
        now: Timestamp,
        applied: &mut Applied,
        memo: &mut RequestMemo,
    ) -> Result<(), Error> {
        for step in plan.steps {
            match step {
                Mutation::CreateSeries { master } => {
                    let master = self.writer.create(scope, master, Vec::new(), now).await?;
                    if let Some(id) = master.id {
                        applied.created.push(id);
                        applied.touch(id);
                    }
                    applied.result = Some((master.uid, None));
                }
                Mutation::UpdateSeries { master, exceptions } => {
                    self.writer.rewrite(scope, &master, exceptions, now).await?;
                    if let Some(id) = master.id {
                        memo.forget(id);
                        applied.touch(id);
                    }
                    applied.result.get_or_insert((master.uid, None));
                }
                Mutation::SaveException {
                    master_id,
                    exception,
                } => {
                    let master = memo
                        .get(&self.db.events, scope, master_id)
                        .await?
                        .ok_or_else(|| Error::validation(format!("Unknown event {master_id}")))?;
                    let key = (master.uid.clone(), Some(exception.instance.clone()));
                    self.writer.upsert_exception(scope, &master, exception, now).await?;
                    applied.touch(master_id);
                    applied.result = Some(key);
                }
                Mutation::DeleteRow { master_id, id } => {
                    self.db.events.delete(scope, id).await?;
                    memo.forget(id);
                    applied.touch(master_id);
                }
                Mutation::DeleteSeries { master } => {
                    if let Some(id) = master.id {
                        self.writer.delete(scope, id).await?;
                        memo.forget(id);
                    }
                    applied.deleted.push(master);
                }
            }
        }

        if calendar.kind == CalendarKind::Local {
            return Ok(());
        }

        let client = self.sync.dav_client(calendar).await?;
        // Existing objects first: a conflict there must stop before anything new is written
        let (created, existing): (Vec<_>, Vec<_>) = applied
            .changed
            .iter()
            .copied()
            .partition(|id| applied.created.contains(id));
        for id in existing.into_iter().chain(created) {
            self.push_master(scope, client.as_ref(), calendar, id).await?;
        }
        for master in &applied.deleted {
            if let Some(url) = &master.url {
                let removed = client.delete(url, master.etag.as_deref()).await?;
                tracing::debug!(%url, removed, "deleted remote object");
            }
        }
        Ok(())
    }

    async fn push_master(
        &self,
        scope: &Scope,
        client: &dyn DavClient,
        calendar: &Calendar,
        master_id: EventId,
    ) -> Result<(), Error> {
        let rows = self.db.events.series(scope, master_id).await?;
        let Some((master, children)) = rows.split_first() else {
            return Ok(());
        };
        let exceptions: Vec<Event> = children.iter().filter(|e| e.is_exception).cloned().collect();
        let data = ics::encode(master, &exceptions);

        let href = match &master.url {
            Some(url) => url.clone(),
            None => object_href(calendar, &master.uid)?,
        };
        let expected = master.url.as_ref().and(master.etag.as_deref());
        match client.put(&href, &data, expected).await? {
            PutOutcome::Stored { etag } => {
                tracing::debug!(%href, %etag, "pushed calendar object");
                self.db.events.set_remote(scope, master_id, &href, &etag).await
            }
            PutOutcome::Conflict => Err(Error::RemoteConflict { href }),
        }
    }

    /// Puts the store back as it was; failures are logged, the original error wins.
    async fn rollback(&self, scope: &Scope, snapshot: Option<&Snapshot>, applied: &Applied) {
        for id in &applied.created {
            if let Err(e) = self.writer.delete(scope, *id).await {
                tracing::error!(%id, error = %e, "failed to roll back created event");
            }
        }
        if let Some(snapshot) = snapshot
            && let Err(e) = self.writer.restore(scope, snapshot).await
        {
            tracing::error!(master_id = %snapshot.master_id, error = %e, "failed to restore series");
        }
    }

    /// Pulls server-side changes after a successful push.
    async fn refresh(&self, calendar: &Calendar) {
        if let Err(e) = self.sync.sync_now(calendar).await {
            tracing::warn!(error = %e, "sync after push failed");
        }
    }

    async fn reload(&self, scope: &Scope, applied: &Applied) -> Result<Option<Event>, Error> {
        match &applied.result {
            Some((uid, instance)) => self.db.events.find(scope, uid, instance.as_deref()).await,
            None => Ok(None),
        }
    }
}

fn ensure_writable(calendar: &Calendar) -> Result<(), Error> {
    if calendar.is_writable() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Calendar '{}' is read-only",
            calendar.name
        )))
    }
}

/// Location of a new object inside the calendar collection.
fn object_href(calendar: &Calendar, uid: &str) -> Result<String, Error> {
    let base = calendar
        .url
        .as_deref()
        .ok_or_else(|| Error::validation(format!("Calendar {} has no URL", calendar.id)))?;
    Ok(format!("{}/{uid}.ics", base.trim_end_matches('/')))
}
