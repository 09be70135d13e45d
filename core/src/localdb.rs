// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod calendars;
mod events;
mod sources;


use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use crate::localdb::calendars::Calendars;
pub use crate::localdb::events::{EventFilter, Events};
pub use crate::localdb::sources::Sources;
use crate::Error;

/// Distinguishes in-memory databases opened by one process.
pub(crate) static IN_MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// The local calendar store.
#[derive(Debug, Clone)]
pub struct LocalDb {
    pool: SqlitePool,

    pub sources: Sources,
    pub calendars: Calendars,
    pub events: Events,
}

impl LocalDb {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(filename: Option<&Path>) -> Result<Self, Error> {
        let options = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite database");
            SqliteConnectOptions::new()
                .filename(filename)
                .create_if_missing(true)
        } else {
            // A named shared-cache database survives across pooled connections
            let db_id = IN_MEMORY_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
            tracing::info!(db_id, "connecting to in-memory SQLite database");
            SqliteConnectOptions::new()
                .filename(format!("file:memdb_{db_id}:?mode=memory&cache=shared"))
                .in_memory(true)
                .create_if_missing(true)
        };

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::migrate!("src/localdb/migrations") // relative path from the crate root
            .run(&pool)
            .await?;

        tracing::debug!("ensuring tables in the database");
        Ok(LocalDb {
            sources: Sources::new(pool.clone()),
            calendars: Calendars::new(pool.clone()),
            events: Events::new(pool.clone()),
            pool,
        })
    }

    pub async fn close(self) {
        tracing::debug!("closing database connection");
        self.pool.close().await;
    }
}
