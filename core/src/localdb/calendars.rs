// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::calendar::{Calendar, NewCalendar};
use crate::types::CalendarId;

const COLUMNS: &str =
    "id, user_id, source_id, kind, name, color, url, ctag, last_check, active, readonly";

#[derive(Debug, Clone)]
pub struct Calendars {
    pool: SqlitePool,
}

impl Calendars {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: i64,
        calendar: &NewCalendar,
    ) -> Result<CalendarId, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO calendars (user_id, source_id, kind, name, color, url, readonly)
VALUES (?, ?, ?, ?, ?, ?, ?);
";

        let result = sqlx::query(SQL)
            .bind(user_id)
            .bind(calendar.source_id)
            .bind(calendar.kind)
            .bind(&calendar.name)
            .bind(&calendar.color)
            .bind(&calendar.url)
            .bind(calendar.readonly)
            .execute(&self.pool)
            .await?;

        Ok(CalendarId(result.last_insert_rowid()))
    }

    pub async fn get(&self, user_id: i64, id: CalendarId) -> Result<Option<Calendar>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM calendars WHERE id = ? AND user_id = ?;");
        sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Calendar>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM calendars WHERE user_id = ? ORDER BY id;");
        sqlx::query_as(&sql).bind(user_id).fetch_all(&self.pool).await
    }

    /// Stamps the freshness check if the last one is at least `throttle_secs`
    /// old. Returns whether this caller won the check.
    ///
    /// Check and stamp happen in one statement, so concurrent callers cannot
    /// both win.
    pub async fn claim_check(
        &self,
        id: CalendarId,
        now_secs: i64,
        throttle_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE calendars SET last_check = ?
WHERE id = ? AND last_check <= ?;
";

        let result = sqlx::query(SQL)
            .bind(now_secs)
            .bind(id)
            .bind(now_secs - throttle_secs)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_ctag(&self, id: CalendarId, ctag: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE calendars SET ctag = ? WHERE id = ?;")
            .bind(ctag)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Forgets the collection state so the next check syncs again.
    pub async fn invalidate(&self, id: CalendarId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE calendars SET ctag = NULL, last_check = 0 WHERE id = ?;")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
