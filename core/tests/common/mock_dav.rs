// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! In-process DAV server for integration tests.
//!
//! Objects live in memory. Every write bumps a revision that feeds both the
//! object's entity tag and the collection tag, so the store sees the same
//! change signals a real server would send.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calsync_core::{
    DavClient, DavConnector, Error, PutOutcome, RemoteCalendar, RemoteEntry, RemoteObject, Source,
};

#[derive(Debug, Default)]
struct State {
    /// href -> (etag, data)
    objects: BTreeMap<String, (String, String)>,
    revision: u64,
    calendars: Vec<RemoteCalendar>,
    conflicts: usize,
    offline: bool,
    puts: usize,
    ctag_reads: usize,
}

impl State {
    fn next_etag(&mut self) -> String {
        self.revision += 1;
        format!("\"rev-{}\"", self.revision)
    }
}

/// A DAV server holding calendar objects in memory.
#[derive(Debug, Default)]
pub struct MockDav {
    state: Mutex<State>,
}

#[allow(dead_code)]
impl MockDav {
    /// A server exposing the given collections.
    #[must_use]
    pub fn with_collections(hrefs: &[&str]) -> Arc<Self> {
        let dav = Self::default();
        {
            let mut state = dav.state.lock().unwrap();
            state.calendars = hrefs
                .iter()
                .enumerate()
                .map(|(i, href)| RemoteCalendar {
                    href: (*href).to_string(),
                    name: Some(format!("Remote {}", i + 1)),
                    color: Some("#336699".to_string()),
                    ctag: None,
                })
                .collect();
        }
        Arc::new(dav)
    }

    /// Writes an object as another client would. Returns its new entity tag.
    pub fn store(&self, href: &str, data: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let etag = state.next_etag();
        state
            .objects
            .insert(href.to_string(), (etag.clone(), data.to_string()));
        etag
    }

    /// Deletes an object as another client would.
    pub fn remove(&self, href: &str) {
        let mut state = self.state.lock().unwrap();
        state.objects.remove(href);
        state.revision += 1;
    }

    pub fn etag(&self, href: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.objects.get(href).map(|(etag, _)| etag.clone())
    }

    pub fn data(&self, href: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.objects.get(href).map(|(_, data)| data.clone())
    }

    pub fn hrefs(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.objects.keys().cloned().collect()
    }

    /// Makes the next `n` writes fail as if another client changed the object
    /// just before.
    pub fn conflict_next_puts(&self, n: usize) {
        self.state.lock().unwrap().conflicts = n;
    }

    /// Makes every request fail at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Number of write attempts seen.
    pub fn put_count(&self) -> usize {
        self.state.lock().unwrap().puts
    }

    /// Number of collection tag reads seen.
    pub fn ctag_count(&self) -> usize {
        self.state.lock().unwrap().ctag_reads
    }

    fn check_online(state: &State) -> Result<(), Error> {
        if state.offline {
            Err(Error::RemoteTransport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DavClient for MockDav {
    async fn list_collection(&self, url: &str) -> Result<Vec<RemoteEntry>, Error> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state
            .objects
            .iter()
            .filter(|(href, _)| href.starts_with(url))
            .map(|(href, (etag, _))| RemoteEntry {
                href: href.clone(),
                etag: etag.clone(),
            })
            .collect())
    }

    async fn get_ctag(&self, _url: &str) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        state.ctag_reads += 1;
        Ok(Some(format!("ctag-{}", state.revision)))
    }

    async fn fetch(&self, href: &str) -> Result<Option<RemoteObject>, Error> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.objects.get(href).map(|(etag, data)| RemoteObject {
            href: href.to_string(),
            etag: etag.clone(),
            data: data.clone(),
        }))
    }

    async fn put(
        &self,
        href: &str,
        data: &str,
        expected_etag: Option<&str>,
    ) -> Result<PutOutcome, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        state.puts += 1;

        if state.conflicts > 0 {
            state.conflicts -= 1;
            // Someone else saved the object meanwhile
            let etag = state.next_etag();
            if let Some(entry) = state.objects.get_mut(href) {
                entry.0 = etag;
            }
            return Ok(PutOutcome::Conflict);
        }

        let current = state.objects.get(href).map(|(etag, _)| etag.as_str());
        let matches = match (expected_etag, current) {
            (None, None) => true,
            (Some(expected), Some(current)) => expected == current,
            _ => false,
        };
        if !matches {
            return Ok(PutOutcome::Conflict);
        }

        let etag = state.next_etag();
        state
            .objects
            .insert(href.to_string(), (etag.clone(), data.to_string()));
        Ok(PutOutcome::Stored { etag })
    }

    async fn delete(&self, href: &str, expected_etag: Option<&str>) -> Result<bool, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        let current = state.objects.get(href).map(|(etag, _)| etag.clone());
        match (current, expected_etag) {
            (None, _) => Ok(false),
            (Some(current), Some(expected)) if current != expected => Err(Error::RemoteConflict {
                href: href.to_string(),
            }),
            (Some(_), _) => {
                state.objects.remove(href);
                state.revision += 1;
                Ok(true)
            }
        }
    }

    async fn discover_calendars(&self, _principal_url: &str) -> Result<Vec<RemoteCalendar>, Error> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.calendars.clone())
    }
}

/// Connects every source to the same [`MockDav`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    pub dav: Arc<MockDav>,
}

impl DavConnector for MockConnector {
    fn connect(&self, _source: &Source) -> Result<Arc<dyn DavClient>, Error> {
        Ok(self.dav.clone())
    }
}
