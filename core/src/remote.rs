// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The DAV collaborator used by synchronization and pushes.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use calsync_caldav::{AuthMethod, CalDavClient, CalDavConfig, ETag, Href, PutResult};

use crate::Error;
use crate::calendar::Source;
use crate::diff::RemoteEntry;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The object was written and now carries this entity tag.
    Stored { etag: String },
    /// The remote object changed since the given entity tag was seen.
    Conflict,
}

/// A calendar object as served by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub href: String,
    pub etag: String,
    pub data: String,
}

/// A calendar collection found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCalendar {
    pub href: String,
    pub name: Option<String>,
    pub color: Option<String>,
    pub ctag: Option<String>,
}

/// Operations on a DAV server. Transport failures are errors; a conflict is
/// an outcome.
#[async_trait]
pub trait DavClient: Debug + Send + Sync {
    /// Lists the members of a collection with their entity tags.
    async fn list_collection(&self, url: &str) -> Result<Vec<RemoteEntry>, Error>;

    /// The collection tag, if the server reports one.
    async fn get_ctag(&self, url: &str) -> Result<Option<String>, Error>;

    /// Downloads an object; `None` if it is gone.
    async fn fetch(&self, href: &str) -> Result<Option<RemoteObject>, Error>;

    /// Writes an object. With `expected_etag`, only if the remote copy still has
    /// that tag; without, only if no object exists yet.
    async fn put(&self, href: &str, data: &str, expected_etag: Option<&str>)
    -> Result<PutOutcome, Error>;

    /// Deletes an object. Returns `false` if it did not exist.
    async fn delete(&self, href: &str, expected_etag: Option<&str>) -> Result<bool, Error>;

    /// Finds the calendar collections of a principal.
    async fn discover_calendars(&self, principal_url: &str) -> Result<Vec<RemoteCalendar>, Error>;
}

/// Builds a client for a source.
pub trait DavConnector: Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached with the configured
    /// credentials.
    fn connect(&self, source: &Source) -> Result<Arc<dyn DavClient>, Error>;
}

/// [`DavClient`] over the `CalDAV` transport.
#[derive(Debug, Clone)]
pub struct CalDavRemote {
    client: CalDavClient,
    debug: bool,
}

impl CalDavRemote {
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn new(config: CalDavConfig, debug: bool) -> Result<Self, Error> {
        Ok(Self {
            client: CalDavClient::new(config)?,
            debug,
        })
    }
}

#[async_trait]
impl DavClient for CalDavRemote {
    async fn list_collection(&self, url: &str) -> Result<Vec<RemoteEntry>, Error> {
        let entries = self.client.list_collection(&Href::from(url)).await?;
        if self.debug {
            tracing::debug!(url, count = entries.len(), "listed collection");
        }
        Ok(entries
            .into_iter()
            .map(|e| RemoteEntry {
                href: e.href.into_string(),
                etag: e.etag.into_string(),
            })
            .collect())
    }

    async fn get_ctag(&self, url: &str) -> Result<Option<String>, Error> {
        let ctag = self.client.get_ctag(&Href::from(url)).await?;
        if self.debug {
            tracing::debug!(url, ?ctag, "fetched collection tag");
        }
        Ok(ctag.map(ETag::into_string))
    }

    async fn fetch(&self, href: &str) -> Result<Option<RemoteObject>, Error> {
        match self.client.fetch(&Href::from(href)).await {
            Ok(object) => Ok(Some(RemoteObject {
                href: object.href.into_string(),
                etag: object.etag.into_string(),
                data: object.data,
            })),
            Err(calsync_caldav::CalDavError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        href: &str,
        data: &str,
        expected_etag: Option<&str>,
    ) -> Result<PutOutcome, Error> {
        let etag = expected_etag.map(ETag::from);
        let result = self.client.put(&Href::from(href), data, etag.as_ref()).await?;
        if self.debug {
            tracing::debug!(href, ?expected_etag, ?result, "put calendar object");
        }
        Ok(match result {
            PutResult::Stored(etag) => PutOutcome::Stored {
                etag: etag.into_string(),
            },
            PutResult::Conflict => PutOutcome::Conflict,
        })
    }

    async fn delete(&self, href: &str, expected_etag: Option<&str>) -> Result<bool, Error> {
        let etag = expected_etag.map(ETag::from);
        match self.client.delete(&Href::from(href), etag.as_ref()).await {
            Ok(deleted) => Ok(deleted),
            Err(e) if e.is_conflict() => Err(Error::RemoteConflict {
                href: href.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn discover_calendars(&self, principal_url: &str) -> Result<Vec<RemoteCalendar>, Error> {
        let collections = self
            .client
            .discover_calendars(&Href::from(principal_url))
            .await?;
        Ok(collections
            .into_iter()
            .map(|c| RemoteCalendar {
                href: c.href.into_string(),
                name: c.display_name,
                color: c.color,
                ctag: c.ctag.map(ETag::into_string),
            })
            .collect())
    }
}

/// Connects to sources with credentials from the configuration.
#[derive(Debug, Clone, Default)]
pub struct CalDavConnector {
    credentials: HashMap<String, AuthMethod>,
    debug: bool,
}

impl CalDavConnector {
    #[must_use]
    pub fn new(credentials: HashMap<String, AuthMethod>, debug: bool) -> Self {
        Self { credentials, debug }
    }
}

impl DavConnector for CalDavConnector {
    fn connect(&self, source: &Source) -> Result<Arc<dyn DavClient>, Error> {
        let auth = match source.credential.as_deref() {
            Some(key) => self.credentials.get(key).cloned().ok_or_else(|| {
                Error::validation(format!("No credentials configured for '{key}'"))
            })?,
            None => AuthMethod::None,
        };

        let config = CalDavConfig::new(source.base_url.clone(), auth);
        Ok(Arc::new(CalDavRemote::new(config, self.debug)?))
    }
}
