// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Change detection between a local calendar and its remote listing.

use std::collections::{HashMap, HashSet};

use crate::types::EventId;

/// A master row of the local calendar, as far as the diff is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalItem {
    pub id: EventId,

    /// Remote href; rows that were never pushed have none and are ignored.
    pub href: Option<String>,
    pub etag: Option<String>,
}

/// One entry of the remote collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub href: String,
    pub etag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// The remote object is unknown locally.
    Create,
    /// The remote object changed since it was stored.
    Update,
}

/// A remote object that has to be fetched and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub action: UpdateAction,
    pub href: String,
    pub etag: String,

    /// The row to overwrite, for updates.
    pub local_id: Option<EventId>,
}

/// Partition of the local rows and the remote listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    pub updates: Vec<PendingUpdate>,

    /// Local rows that are up to date.
    pub synced: Vec<EventId>,

    /// Local rows whose remote object is gone.
    pub orphans: Vec<EventId>,
}

/// Compares local rows against the remote listing.
///
/// Every remote href ends up in exactly one of `updates` (as create or update)
/// or matches a row in `synced`. Every local row with an href ends up in
/// exactly one of `synced`, the updates, or `orphans`. ETags are compared
/// byte for byte.
#[must_use]
pub fn diff(local: &[LocalItem], remote: &[RemoteEntry]) -> DiffOutcome {
    let mut by_href: HashMap<&str, &LocalItem> = HashMap::new();
    for item in local {
        if let Some(href) = item.href.as_deref() {
            by_href.entry(href).or_insert(item);
        }
    }

    let mut outcome = DiffOutcome::default();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut matched: HashSet<EventId> = HashSet::new();
    for entry in remote {
        if !seen.insert(entry.href.as_str()) {
            continue;
        }

        match by_href.get(entry.href.as_str()) {
            Some(item) if item.etag.as_deref() == Some(entry.etag.as_str()) => {
                matched.insert(item.id);
                outcome.synced.push(item.id);
            }
            Some(item) => {
                matched.insert(item.id);
                outcome.updates.push(PendingUpdate {
                    action: UpdateAction::Update,
                    href: entry.href.clone(),
                    etag: entry.etag.clone(),
                    local_id: Some(item.id),
                });
            }
            None => outcome.updates.push(PendingUpdate {
                action: UpdateAction::Create,
                href: entry.href.clone(),
                etag: entry.etag.clone(),
                local_id: None,
            }),
        }
    }

    outcome.orphans = local
        .iter()
        .filter(|item| item.href.is_some() && !matched.contains(&item.id))
        .map(|item| item.id)
        .collect();
    outcome
}
