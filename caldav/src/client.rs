// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client for calendar operations.

use std::sync::Arc;

use reqwest::Method;

use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::{Precondition, Transport, response_etag};
use crate::request::{Prop, PropFindRequest};
use crate::response::MultiStatusResponse;
use crate::types::{CalendarCollection, CalendarObject, CollectionEntry, ETag, Href};

/// Outcome of a conditional `PUT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutResult {
    /// The server stored the object and returned its new version tag.
    Stored(ETag),
    /// The `If-Match` precondition failed: the remote copy changed underneath us.
    Conflict,
}

/// `CalDAV` client for accessing and managing calendars on `CalDAV` servers.
///
/// The client speaks plain iCalendar text; parsing the objects is left to the caller.
///
/// # Example
///
/// ```ignore
/// use calsync_caldav::{AuthMethod, CalDavClient, CalDavConfig, Href};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig::new(
///     "https://caldav.example.com".to_string(),
///     AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
/// );
///
/// let client = CalDavClient::new(config)?;
/// let entries = client.list_collection(&Href::from("/dav/calendars/user/work/")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CalDavClient {
    http: Arc<Transport>,
}

impl CalDavClient {
    /// Creates a new `CalDAV` client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        if config.base_url.is_empty() {
            return Err(CalDavError::Config("base_url must not be empty".to_string()));
        }
        let http = Transport::new(config)?;
        Ok(Self {
            http: Arc::new(http),
        })
    }

    /// Lists the members of a calendar collection with their `ETag`s.
    ///
    /// The collection itself and nested collections are not included.
    ///
    /// # Errors
    ///
    /// Returns an error if PROPFIND fails or the response cannot be parsed.
    pub async fn list_collection(&self, href: &Href) -> Result<Vec<CollectionEntry>, CalDavError> {
        let propfind = PropFindRequest::with(&[Prop::GetETag, Prop::ResourceType]);
        let multistatus = self.propfind(href, &propfind, "1").await?;
        let entries = multistatus.into_entries(href);
        tracing::debug!(collection = %href, count = entries.len(), "listed collection");
        Ok(entries)
    }

    /// Fetches the collection tag, which changes whenever any member changes.
    ///
    /// Returns `None` when the server does not expose `getctag`.
    ///
    /// # Errors
    ///
    /// Returns an error if PROPFIND fails or the response cannot be parsed.
    pub async fn get_ctag(&self, href: &Href) -> Result<Option<ETag>, CalDavError> {
        let propfind = PropFindRequest::with(&[Prop::GetCTag]);
        let multistatus = self.propfind(href, &propfind, "0").await?;
        Ok(multistatus.ctag())
    }

    /// Gets a single calendar object by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or the server omits the `ETag`.
    pub async fn fetch(&self, href: &Href) -> Result<CalendarObject, CalDavError> {
        let req = self.http.request(Method::GET, href);
        let resp = self.http.send(req, Precondition::Always).await?;

        let etag = response_etag(&resp)
            .ok_or_else(|| CalDavError::InvalidResponse("Missing ETag header".to_string()))?;
        let data = resp.text().await?;
        Ok(CalendarObject {
            href: href.clone(),
            etag,
            data,
        })
    }

    /// Stores a calendar object.
    ///
    /// With `expected_etag` the write is conditional on the remote copy being
    /// unchanged; without it the object must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures. A failed precondition is reported
    /// as [`PutResult::Conflict`], not as an error.
    pub async fn put(
        &self,
        href: &Href,
        data: &str,
        expected_etag: Option<&ETag>,
    ) -> Result<PutResult, CalDavError> {
        let req = self
            .http
            .request(Method::PUT, href)
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(data.to_string());
        let precondition = match expected_etag {
            Some(etag) => Precondition::Matches(etag),
            None => Precondition::Absent,
        };

        match self.http.send(req, precondition).await {
            Ok(resp) => match response_etag(&resp) {
                Some(etag) => Ok(PutResult::Stored(etag)),
                // Some servers omit the ETag on PUT; ask for it
                None => Ok(PutResult::Stored(self.fetch(href).await?.etag)),
            },
            Err(err) if err.is_conflict() => {
                tracing::debug!(%href, "put rejected by precondition");
                Ok(PutResult::Conflict)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes a calendar object.
    ///
    /// Returns `false` if the object was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails, including an `ETag` mismatch.
    pub async fn delete(&self, href: &Href, etag: Option<&ETag>) -> Result<bool, CalDavError> {
        let req = self.http.request(Method::DELETE, href);
        let precondition = etag.map_or(Precondition::Always, Precondition::Matches);

        match self.http.send(req, precondition).await {
            Ok(_) => Ok(true),
            Err(CalDavError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Discovers the calendar collections reachable from a principal URL.
    ///
    /// Follows `current-user-principal` and `calendar-home-set`; a server
    /// that answers neither is treated as pointing directly at the home set.
    ///
    /// # Errors
    ///
    /// Returns an error if any PROPFIND fails.
    pub async fn discover_calendars(
        &self,
        principal: &Href,
    ) -> Result<Vec<CalendarCollection>, CalDavError> {
        let propfind = PropFindRequest::with(&[Prop::CurrentUserPrincipal]);
        let principal = self
            .propfind(principal, &propfind, "0")
            .await?
            .current_user_principal()
            .unwrap_or_else(|| principal.clone());

        let propfind = PropFindRequest::with(&[Prop::CalendarHomeSet]);
        let home = self
            .propfind(&principal, &propfind, "0")
            .await?
            .calendar_home_set()
            .unwrap_or_else(|| principal.clone());

        let propfind = PropFindRequest::with(&[
            Prop::ResourceType,
            Prop::DisplayName,
            Prop::CalendarDescription,
            Prop::CalendarColor,
            Prop::GetCTag,
        ]);
        let calendars = self.propfind(&home, &propfind, "1").await?.into_collections();
        tracing::debug!(%home, count = calendars.len(), "discovered calendars");
        Ok(calendars)
    }

    async fn propfind(
        &self,
        href: &Href,
        request: &PropFindRequest,
        depth: &str,
    ) -> Result<MultiStatusResponse, CalDavError> {
        let req = self
            .http
            .dav_request("PROPFIND", href)?
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", depth)
            .body(request.build()?);
        let resp = self.http.send(req, Precondition::Always).await?;

        let xml = resp.text().await?;
        MultiStatusResponse::from_xml(&xml)
    }
}
