// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::calendar::Source;
use crate::types::SourceId;

#[derive(Debug, Clone)]
pub struct Sources {
    pool: SqlitePool,
}

impl Sources {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: i64,
        name: &str,
        base_url: &str,
        principal: &str,
        credential: Option<&str>,
    ) -> Result<SourceId, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO sources (user_id, name, base_url, principal, credential)
VALUES (?, ?, ?, ?, ?);
";

        let result = sqlx::query(SQL)
            .bind(user_id)
            .bind(name)
            .bind(base_url)
            .bind(principal)
            .bind(credential)
            .execute(&self.pool)
            .await?;

        Ok(SourceId(result.last_insert_rowid()))
    }

    pub async fn get(&self, user_id: i64, id: SourceId) -> Result<Option<Source>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, user_id, name, base_url, principal, credential
FROM sources
WHERE id = ? AND user_id = ?;
";

        sqlx::query_as(SQL)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Source>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, user_id, name, base_url, principal, credential
FROM sources
WHERE user_id = ?
ORDER BY id;
";

        sqlx::query_as(SQL).bind(user_id).fetch_all(&self.pool).await
    }

    /// Returns whether a source of the user was deleted.
    pub async fn delete(&self, user_id: i64, id: SourceId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ? AND user_id = ?;")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::localdb::LocalDb;

    #[tokio::test]
    async fn sources_are_scoped_by_user() {
        let db = LocalDb::open(None).await.unwrap();
        let id = db
            .sources
            .insert(1, "Work", "https://dav.example.com", "/principals/ann/", Some("work"))
            .await
            .unwrap();

        let own = db.sources.get(1, id).await.unwrap();
        let foreign = db.sources.get(2, id).await.unwrap();

        let own = own.unwrap();
        assert_eq!(own.principal, "/principals/ann/");
        assert_eq!(own.credential.as_deref(), Some("work"));
        assert!(foreign.is_none());
        assert_eq!(db.sources.list(1).await.unwrap().len(), 1);
    }
}
