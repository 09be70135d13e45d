// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Turns an edit of a possibly recurring event into store mutations.
//!
//! Planning is pure: it reads the series as loaded and describes the rows to
//! write. Executing the plan and pushing the result is up to the caller.

use jiff::{SignedDuration, Timestamp, Zoned};

use crate::Error;
use crate::datetime::{civil_delta, instance_key, parse_instance_key, shift_civil};
use crate::event::Event;
use crate::recurrence::{Limits, Recurrence, Until, WeekdayNum, expand, slots_before};
use crate::types::{EventId, EventStatus, PartStat, SaveMode};

/// One write to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Store a new series.
    CreateSeries { master: Event },

    /// Overwrite a master, store the given exceptions and regenerate.
    UpdateSeries { master: Event, exceptions: Vec<Event> },

    /// Store or update one exception.
    SaveException { master_id: EventId, exception: Event },

    /// Remove one row owned by a master.
    DeleteRow { master_id: EventId, id: EventId },

    /// Remove a series, remote object included.
    DeleteSeries { master: Event },
}

/// Ordered writes that realize an edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    pub steps: Vec<Mutation>,
}

/// The series an edit applies to, as currently stored.
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    pub master: &'a Event,

    /// The row the user acted on: the master, an occurrence or an exception.
    pub target: &'a Event,
    pub exceptions: &'a [Event],

    /// Identities of the user, for organizer checks.
    pub user_emails: &'a [String],
    pub limits: Limits,
    pub now: Timestamp,
}

impl EditContext<'_> {
    fn master_id(&self) -> Result<EventId, Error> {
        self.master
            .id
            .ok_or_else(|| Error::validation("event was never stored"))
    }

    fn is_first_instance(&self) -> bool {
        self.target.is_master() || self.target.instance == self.master.base_instance()
    }

    /// Narrows the requested mode to what it means for this target.
    fn effective_mode(&self, mode: SaveMode) -> SaveMode {
        match mode {
            SaveMode::New => SaveMode::New,
            _ if self.master.recurrence.is_none() => SaveMode::All,
            SaveMode::Future if self.is_first_instance() => SaveMode::All,
            mode => mode,
        }
    }
}

/// Plans an edit. `edit` is the target row with the user's changes applied.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the series is inconsistent, e.g. an
/// instance key that does not parse.
pub fn plan_edit(ctx: &EditContext<'_>, edit: &Event, mode: SaveMode) -> Result<MutationPlan, Error> {
    plan_edit_as(ctx, edit, resolve_mode(ctx, mode))
}

/// The mode an edit of the target actually runs in, e.g. `future` on the first
/// instance is `all`.
#[must_use]
pub fn resolve_mode(ctx: &EditContext<'_>, mode: SaveMode) -> SaveMode {
    ctx.effective_mode(mode)
}

/// Plans an edit in an already resolved mode.
pub(crate) fn plan_edit_as(
    ctx: &EditContext<'_>,
    edit: &Event,
    mode: SaveMode,
) -> Result<MutationPlan, Error> {
    let steps = match mode {
        SaveMode::New => vec![plan_new(ctx, edit)],
        SaveMode::Current => vec![plan_current(ctx, edit)?],
        SaveMode::Future => plan_future(ctx, edit)?,
        SaveMode::All => vec![plan_all(ctx, edit)?],
    };
    Ok(MutationPlan { steps })
}

/// Plans the removal of the target.
///
/// # Errors
///
/// Returns [`Error::Validation`] for [`SaveMode::New`], which does not apply
/// to removals.
pub fn plan_remove(ctx: &EditContext<'_>, mode: SaveMode) -> Result<MutationPlan, Error> {
    plan_remove_as(ctx, resolve_mode(ctx, mode))
}

/// Plans a removal in an already resolved mode.
pub(crate) fn plan_remove_as(ctx: &EditContext<'_>, mode: SaveMode) -> Result<MutationPlan, Error> {
    let master_id = ctx.master_id()?;
    let steps = match mode {
        SaveMode::New => return Err(Error::validation("cannot remove with save mode 'new'")),
        SaveMode::All => vec![Mutation::DeleteSeries {
            master: ctx.master.clone(),
        }],
        SaveMode::Current => {
            let key = if ctx.target.is_master() {
                ctx.master.base_instance()
            } else {
                ctx.target.instance.clone()
            };

            let mut master = ctx.master.clone();
            if let Some(rule) = master.recurrence.as_mut()
                && !rule.exdates.contains(&key)
            {
                rule.exdates.push(key.clone());
            }
            master.changed = ctx.now;

            let mut steps: Vec<Mutation> = ctx
                .exceptions
                .iter()
                .filter(|e| e.instance == key)
                .filter_map(|e| e.id)
                .map(|id| Mutation::DeleteRow { master_id, id })
                .collect();
            steps.push(Mutation::UpdateSeries {
                master,
                exceptions: Vec::new(),
            });
            steps
        }
        SaveMode::Future => truncation(ctx)?,
    };
    Ok(MutationPlan { steps })
}

/// A detached copy; the original series stays as it is.
fn plan_new(ctx: &EditContext<'_>, edit: &Event) -> Mutation {
    let mut event = edit.detached();
    if !ctx.target.is_master() {
        event.recurrence = None;
    }
    event.created = ctx.now;
    event.changed = ctx.now;
    Mutation::CreateSeries { master: event }
}

/// Turns the target instance into an exception.
fn plan_current(ctx: &EditContext<'_>, edit: &Event) -> Result<Mutation, Error> {
    let master_id = ctx.master_id()?;
    let mut exception = edit.clone();
    exception.is_exception = true;
    exception.recurrence = None;
    exception.recurrence_id = Some(master_id);
    exception.uid = ctx.master.uid.clone();
    exception.calendar_id = ctx.master.calendar_id;
    exception.url = None;
    exception.etag = None;
    exception.changed = ctx.now;

    let old = if ctx.target.is_master() {
        // The master stands for its first instance, which gets its own row now
        let key = ctx.master.base_instance();
        let shadow = ctx.exceptions.iter().find(|e| e.instance == key);
        exception.id = shadow.and_then(|e| e.id);
        exception.instance = key;
        shadow.unwrap_or(ctx.master)
    } else {
        exception.id = ctx.target.id;
        exception.instance = ctx.target.instance.clone();
        ctx.target
    };

    apply_scheduling(old, &mut exception, ctx.user_emails);
    Ok(Mutation::SaveException {
        master_id,
        exception,
    })
}

/// Ends the series before the target and starts a new one from the edit.
fn plan_future(ctx: &EditContext<'_>, edit: &Event) -> Result<Vec<Mutation>, Error> {
    let nominal = ctx
        .target
        .nominal_start(ctx.master)
        .ok_or_else(|| Error::validation(format!("Invalid instance key {}", ctx.target.instance)))?;

    let mut series = edit.detached();
    series.created = ctx.now;
    series.changed = ctx.now;
    series.recurrence = edit
        .recurrence
        .clone()
        .or_else(|| ctx.master.recurrence.clone());
    if let Some(rule) = series.recurrence.as_mut() {
        rule.exdates
            .retain(|key| key.as_str() > ctx.target.instance.as_str());
        if let Some(count) = ctx.master.recurrence.as_ref().and_then(|r| r.count) {
            let before = slots_before(ctx.master, &nominal, ctx.now, &ctx.limits);
            rule.count = Some(count.saturating_sub(before).max(1));
        }
    }

    let mut steps = truncation(ctx)?;
    steps.push(Mutation::CreateSeries { master: series });
    Ok(steps)
}

/// Ends the series before the target, dropping exceptions from the target on.
fn truncation(ctx: &EditContext<'_>) -> Result<Vec<Mutation>, Error> {
    let master_id = ctx.master_id()?;
    let split = ctx.target.instance.as_str();
    let mut steps: Vec<Mutation> = ctx
        .exceptions
        .iter()
        .filter(|e| e.instance.as_str() >= split)
        .filter_map(|e| e.id)
        .map(|id| Mutation::DeleteRow { master_id, id })
        .collect();
    steps.push(Mutation::UpdateSeries {
        master: truncated_master(ctx)?,
        exceptions: Vec::new(),
    });
    Ok(steps)
}

/// The master with its rule ending the day before the target instance.
fn truncated_master(ctx: &EditContext<'_>) -> Result<Event, Error> {
    let nominal = ctx
        .target
        .nominal_start(ctx.master)
        .ok_or_else(|| Error::validation(format!("Invalid instance key {}", ctx.target.instance)))?;

    let mut master = ctx.master.clone();
    let until = if master.all_day {
        let day = nominal
            .date()
            .yesterday()
            .map_err(|e| Error::validation(format!("Date out of range: {e}")))?;
        Until::Date(day)
    } else {
        let instant = nominal
            .timestamp()
            .checked_sub(SignedDuration::from_hours(24))
            .map_err(|e| Error::validation(format!("Date out of range: {e}")))?;
        Until::Instant(instant)
    };

    if until.is_before(&master.start) {
        master.recurrence = None;
    } else if let Some(rule) = master.recurrence.as_mut() {
        rule.count = None;
        rule.until = Some(until);
        rule.exdates
            .retain(|key| key.as_str() < ctx.target.instance.as_str());
    }
    master.changed = ctx.now;
    apply_scheduling(ctx.master, &mut master, ctx.user_emails);
    Ok(master)
}

/// Applies the edit to the whole series.
fn plan_all(ctx: &EditContext<'_>, edit: &Event) -> Result<Mutation, Error> {
    let master = ctx.master;
    let target = ctx.target;

    let mut new = edit.clone();
    new.id = master.id;
    new.calendar_id = master.calendar_id;
    new.uid = master.uid.clone();
    new.recurrence_id = None;
    new.is_exception = false;
    new.instance.clear();
    new.url = master.url.clone();
    new.etag = master.etag.clone();
    new.created = master.created;
    new.changed = ctx.now;

    new.recurrence = if target.is_master() {
        edit.recurrence.clone()
    } else {
        edit.recurrence.clone().or_else(|| master.recurrence.clone())
    };
    if let (Some(rule), Some(old)) = (new.recurrence.as_mut(), master.recurrence.as_ref())
        && rule.exdates.is_empty()
    {
        rule.exdates = old.exdates.clone();
    }

    let timing_changed =
        edit.start != target.start || edit.end != target.end || edit.all_day != target.all_day;
    let same_day = edit.start.date() == target.start.date();
    let same_length = edit.duration() == target.duration();
    if timing_changed && (same_day || same_length) {
        // Shift the series by what the instance moved, resize to the new length
        let delta = civil_delta(&target.start, &edit.start);
        new.start = shift_civil(&master.start, delta)?;
        new.end = shift_civil(&new.start, edit.duration())?;
    } else if !timing_changed {
        new.start = master.start.clone();
        new.end = master.end.clone();
        new.all_day = master.all_day;
    }

    if new.start.date() != master.start.date()
        && let Some(rule) = new.recurrence.as_mut()
    {
        clear_fixed_day(rule, master);
    }

    let mut exceptions = Vec::new();
    if new.start.datetime() != master.start.datetime() || new.all_day != master.all_day {
        let delta = civil_delta(&master.start, &new.start);
        let rekey = |key: &str| -> Result<Option<String>, Error> {
            let Some(nominal) = parse_instance_key(key, master.start.time_zone()) else {
                return Ok(None);
            };
            let shifted = shift_civil(&nominal, delta)?;
            let shifted = shifted.with_time_zone(new.start.time_zone().clone());
            Ok(Some(instance_key(&shifted, new.all_day)))
        };

        for exception in ctx.exceptions {
            if let Some(key) = rekey(&exception.instance)? {
                let mut exception = exception.clone();
                exception.instance = key;
                exceptions.push(exception);
            }
        }
        if let Some(rule) = new.recurrence.as_mut() {
            let mut exdates = Vec::with_capacity(rule.exdates.len());
            for key in &rule.exdates {
                exdates.push(rekey(key)?.unwrap_or_else(|| key.clone()));
            }
            rule.exdates = exdates;
        }
    }

    apply_scheduling(master, &mut new, ctx.user_emails);
    Ok(Mutation::UpdateSeries {
        master: new,
        exceptions,
    })
}

/// Drops a single plain `BYDAY` or `BYMONTHDAY` pinned to the old start, so the
/// rule follows the new start.
fn clear_fixed_day(rule: &mut Recurrence, old: &Event) {
    if rule.by_day == [WeekdayNum::every(old.start.weekday())] {
        rule.by_day.clear();
    }
    if rule.by_month_day == [old.start.day()] {
        rule.by_month_day.clear();
    }
}

/// Whether the change affects when or where the event takes place.
#[must_use]
pub fn is_rescheduled(old: &Event, new: &Event) -> bool {
    if old.all_day != new.all_day {
        return true;
    }
    let timing = if new.all_day {
        old.start.date() != new.start.date() || old.end.date() != new.end.date()
    } else {
        old.start.timestamp() != new.start.timestamp() || old.end.timestamp() != new.end.timestamp()
    };

    let recurrence = match (&old.recurrence, &new.recurrence) {
        (None, None) => false,
        (Some(a), Some(b)) => {
            !a.same_pattern(b) && !a.is_shortened_by(b, || last_slot(old))
        }
        _ => true,
    };

    let cancelled = (old.status == EventStatus::Cancelled) != (new.status == EventStatus::Cancelled);
    timing || recurrence || old.location != new.location || cancelled
}

/// Start of the final instance of a bounded series.
fn last_slot(series: &Event) -> Option<Zoned> {
    expand(series, &[], series.start.timestamp(), &Limits::default()).last_slot
}

/// Sets the sequence of `new` and asks attendees to answer again when the
/// organizer moved the event.
fn apply_scheduling(old: &Event, new: &mut Event, user_emails: &[String]) {
    let rescheduled = is_rescheduled(old, new);
    new.sequence = old.sequence.max(new.sequence) + i64::from(rescheduled);

    if rescheduled && is_organizer(new, user_emails) {
        for attendee in new.attendees.iter_mut().filter(|a| !a.is_organizer()) {
            if attendee.status != PartStat::Delegated {
                attendee.status = PartStat::NeedsAction;
                attendee.rsvp = true;
            }
        }
    }
}

fn is_organizer(event: &Event, user_emails: &[String]) -> bool {
    event.organizer().is_none_or(|organizer| {
        user_emails
            .iter()
            .any(|email| email.eq_ignore_ascii_case(&organizer.email))
    })
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use jiff::civil::{Weekday, date};

    use super::*;
    use crate::recurrence::Frequency;
    use crate::types::{Attendee, CalendarId};

    fn at(day: i8, hour: i8) -> Zoned {
        date(2025, 3, day).at(hour, 0, 0, 0).in_tz("Europe/Berlin").unwrap()
    }

    fn now() -> Timestamp {
        "2025-01-01T00:00:00Z".parse().unwrap()
    }

    /// Weekly on Mondays from 2025-03-03, five times.
    fn master() -> Event {
        let mut master = Event::new(CalendarId(1), "Standup", at(3, 9), at(3, 10));
        master.id = Some(EventId(1));
        master.sequence = 2;
        master.recurrence = Some(Recurrence::new(Frequency::Weekly).with_count(5));
        master
    }

    fn occurrence(master: &Event, n: usize) -> Event {
        let expansion = expand(master, &[], now(), &Limits::default());
        let mut row = master.occurrence(&expansion.occurrences[n], now());
        row.id = Some(EventId(10 + n as i64));
        row
    }

    fn ctx<'a>(master: &'a Event, target: &'a Event, exceptions: &'a [Event]) -> EditContext<'a> {
        EditContext {
            master,
            target,
            exceptions,
            user_emails: &[],
            limits: Limits::default(),
            now: now(),
        }
    }

    #[test]
    fn new_leaves_series_untouched() {
        let master = master();
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.summary = "Copy".to_string();

        let plan = plan_edit(&ctx(&master, &target, &[]), &edit, SaveMode::New).unwrap();

        let [Mutation::CreateSeries { master: copy }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_ne!(copy.uid, master.uid);
        assert_eq!(copy.recurrence, None);
        assert_eq!(copy.recurrence_id, None);
        assert_eq!(copy.id, None);
    }

    #[test]
    fn current_turns_occurrence_into_exception() {
        let master = master();
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.summary = "Retro".to_string();

        let plan = plan_edit(&ctx(&master, &target, &[]), &edit, SaveMode::Current).unwrap();

        let [Mutation::SaveException { master_id, exception }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(*master_id, EventId(1));
        assert_eq!(exception.id, target.id);
        assert!(exception.is_exception);
        assert_eq!(exception.instance, "20250317T090000");
        assert_eq!(exception.sequence, 2);
    }

    #[test]
    fn current_on_master_creates_exception_for_first_instance() {
        let master = master();
        let mut edit = master.clone();
        edit.start = at(3, 11);
        edit.end = at(3, 12);

        let plan = plan_edit(&ctx(&master, &master, &[]), &edit, SaveMode::Current).unwrap();

        let [Mutation::SaveException { exception, .. }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(exception.id, None);
        assert_eq!(exception.instance, "20250303T090000");
        assert_eq!(exception.recurrence, None);
        assert_eq!(exception.sequence, 3);
    }

    #[test]
    fn future_on_first_instance_equals_all() {
        let master = master();
        let mut edit = master.clone();
        edit.summary = "Renamed".to_string();

        let future = plan_edit(&ctx(&master, &master, &[]), &edit, SaveMode::Future).unwrap();
        let all = plan_edit(&ctx(&master, &master, &[]), &edit, SaveMode::All).unwrap();

        assert_eq!(future, all);
    }

    #[test]
    fn future_splits_series_and_keeps_total_count() {
        let master = master();
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.summary = "Later".to_string();

        let plan = plan_edit(&ctx(&master, &target, &[]), &edit, SaveMode::Future).unwrap();

        let [
            Mutation::UpdateSeries { master: old, .. },
            Mutation::CreateSeries { master: new },
        ] = plan.steps.as_slice()
        else {
            panic!("unexpected plan {plan:?}");
        };
        let old_rule = old.recurrence.as_ref().unwrap();
        assert_eq!(old_rule.count, None);
        assert_eq!(
            old_rule.until,
            Some(Until::Instant("2025-03-16T08:00:00Z".parse().unwrap()))
        );
        assert_eq!(old.sequence, 2);

        assert_eq!(new.start, at(17, 9));
        assert_ne!(new.uid, master.uid);
        assert_eq!(new.recurrence.as_ref().unwrap().count, Some(3));
        assert_eq!(new.summary, "Later");
    }

    #[test]
    fn future_drops_exceptions_from_split_on() {
        let mut master = master();
        master.recurrence.as_mut().unwrap().exdates = vec![
            "20250310T090000".to_string(),
            "20250331T090000".to_string(),
        ];
        let target = occurrence(&master, 1);
        let mut early = occurrence(&master, 0);
        early.is_exception = true;
        let mut late = occurrence(&master, 2);
        late.is_exception = true;
        let exceptions = vec![early, late.clone()];
        let mut edit = target.clone();
        edit.summary = "Later".to_string();

        let plan =
            plan_edit(&ctx(&master, &target, &exceptions), &edit, SaveMode::Future).unwrap();

        let [
            Mutation::DeleteRow { master_id, id },
            Mutation::UpdateSeries { master: old, .. },
            Mutation::CreateSeries { .. },
        ] = plan.steps.as_slice()
        else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(*master_id, EventId(1));
        assert_eq!(Some(*id), late.id);
        assert_eq!(
            old.recurrence.as_ref().unwrap().exdates,
            vec!["20250310T090000".to_string()]
        );
    }

    #[test]
    fn all_shifts_series_by_instance_move() {
        let master = master();
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.start = at(17, 10);
        edit.end = at(17, 11);

        let plan = plan_edit(&ctx(&master, &target, &[]), &edit, SaveMode::All).unwrap();

        let [Mutation::UpdateSeries { master: new, .. }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(new.start, at(3, 10));
        assert_eq!(new.end, at(3, 11));
        assert_eq!(new.id, master.id);
        assert_eq!(new.recurrence, master.recurrence);
        assert_eq!(new.sequence, 3);
    }

    #[test]
    fn all_keeps_master_timing_when_only_text_changes() {
        let master = master();
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.description = "Agenda".to_string();

        let plan = plan_edit(&ctx(&master, &target, &[]), &edit, SaveMode::All).unwrap();

        let [Mutation::UpdateSeries { master: new, exceptions }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(new.start, master.start);
        assert_eq!(new.description, "Agenda");
        assert_eq!(new.sequence, 2);
        assert!(exceptions.is_empty());
    }

    #[test]
    fn all_moving_start_date_rekeys_exceptions_and_clears_weekday() {
        let mut master = master();
        if let Some(rule) = master.recurrence.as_mut() {
            rule.by_day = vec![WeekdayNum::every(Weekday::Monday)];
        }
        let mut exception = occurrence(&master, 1);
        exception.is_exception = true;
        let exceptions = vec![exception];
        let mut edit = master.clone();
        edit.start = at(4, 9);
        edit.end = at(4, 10);

        let plan = plan_edit(&ctx(&master, &master, &exceptions), &edit, SaveMode::All).unwrap();

        let [Mutation::UpdateSeries { master: new, exceptions }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert!(new.recurrence.as_ref().unwrap().by_day.is_empty());
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].instance, "20250311T090000");
    }

    #[test]
    fn rescheduling_by_organizer_resets_attendees() {
        let mut master = master();
        master.recurrence = None;
        master.attendees = vec![
            Attendee::organizer("me@example.com"),
            Attendee {
                status: PartStat::Accepted,
                ..Attendee::new("ann@example.com")
            },
            Attendee {
                status: PartStat::Delegated,
                ..Attendee::new("bob@example.com")
            },
        ];
        let mut edit = master.clone();
        edit.location = "Room 2".to_string();
        let emails = vec!["ME@example.com".to_string()];
        let context = EditContext {
            user_emails: &emails,
            ..ctx(&master, &master, &[])
        };

        let plan = plan_edit(&context, &edit, SaveMode::All).unwrap();

        let [Mutation::UpdateSeries { master: new, .. }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(new.sequence, 3);
        assert_eq!(new.attendees[0].status, PartStat::Accepted);
        assert_eq!(new.attendees[1].status, PartStat::NeedsAction);
        assert!(new.attendees[1].rsvp);
        assert_eq!(new.attendees[2].status, PartStat::Delegated);
    }

    #[test]
    fn shortened_count_is_not_rescheduling() {
        let old = master();
        let mut new = old.clone();
        new.recurrence = Some(Recurrence::new(Frequency::Weekly).with_count(3));

        assert!(!is_rescheduled(&old, &new));
    }

    #[test]
    fn count_cut_to_until_is_not_rescheduling() {
        let old = master();
        let mut new = old.clone();
        new.recurrence = Some(
            Recurrence::new(Frequency::Weekly)
                .with_until(Until::Instant("2025-03-16T09:00:00Z".parse().unwrap())),
        );

        assert!(!is_rescheduled(&old, &new));
    }

    #[test]
    fn future_split_keeps_attendee_answers_on_old_series() {
        let mut master = master();
        master.attendees = vec![
            Attendee::organizer("me@example.com"),
            Attendee {
                status: PartStat::Accepted,
                ..Attendee::new("ann@example.com")
            },
        ];
        let target = occurrence(&master, 2);
        let mut edit = target.clone();
        edit.summary = "Later".to_string();
        let emails = vec!["me@example.com".to_string()];
        let context = EditContext {
            user_emails: &emails,
            ..ctx(&master, &target, &[])
        };

        let plan = plan_edit(&context, &edit, SaveMode::Future).unwrap();

        let Mutation::UpdateSeries { master: old, .. } = &plan.steps[0] else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(old.sequence, 2);
        assert_eq!(old.attendees[1].status, PartStat::Accepted);
    }

    #[test]
    fn all_day_compared_by_date() {
        let mut old = master();
        old.all_day = true;
        let mut new = old.clone();
        new.end = new.end.checked_add(1.hour()).unwrap();

        assert!(!is_rescheduled(&old, &new));
    }

    #[test]
    fn remove_current_excludes_instance() {
        let master = master();
        let target = occurrence(&master, 3);

        let plan = plan_remove(&ctx(&master, &target, &[]), SaveMode::Current).unwrap();

        let [Mutation::UpdateSeries { master: new, .. }] = plan.steps.as_slice() else {
            panic!("unexpected plan {plan:?}");
        };
        assert_eq!(
            new.recurrence.as_ref().unwrap().exdates,
            vec!["20250324T090000".to_string()]
        );
    }

    #[test]
    fn remove_current_deletes_exception_row() {
        let master = master();
        let mut target = occurrence(&master, 1);
        target.is_exception = true;
        let exceptions = vec![target.clone()];

        let plan = plan_remove(&ctx(&master, &target, &exceptions), SaveMode::Current).unwrap();

        assert_eq!(
            plan.steps[0],
            Mutation::DeleteRow {
                master_id: EventId(1),
                id: target.id.unwrap()
            }
        );
    }

    #[test]
    fn remove_all_deletes_series() {
        let master = master();
        let target = occurrence(&master, 1);

        let plan = plan_remove(&ctx(&master, &target, &[]), SaveMode::All).unwrap();

        assert!(matches!(plan.steps.as_slice(), [Mutation::DeleteSeries { .. }]));
    }
}
