// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced by the calendar store and its synchronization.
///
/// A missing record is never an error: lookups return `Option` or `bool`.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was rejected before any I/O took place.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The remote server could not be reached or answered with a failure.
    #[error("Remote server error: {0}")]
    RemoteTransport(String),

    /// The remote copy changed since it was last fetched, and the retry failed too.
    #[error("Remote object was modified concurrently: {href}")]
    RemoteConflict {
        /// The object that could not be written.
        href: String,
    },

    /// The local store failed.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The local store schema could not be migrated.
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A calendar object could not be decoded.
    #[error("Invalid calendar data: {0}")]
    Ics(String),

    /// Reading a local calendar file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is about the remote server, as opposed to the request
    /// or the local store.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteTransport(_) | Self::RemoteConflict { .. })
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<calsync_caldav::CalDavError> for Error {
    fn from(e: calsync_caldav::CalDavError) -> Self {
        Self::RemoteTransport(e.to_string())
    }
}
