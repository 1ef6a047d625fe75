use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{SessionData, SessionRecord, SessionStore};
use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    data: Json<SessionData>,
    expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(r: SessionRow) -> Self {
        Self {
            id: r.id,
            data: r.data.0,
            expires_at: r.expires_at,
        }
    }
}

/// Sessions persisted in the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, record: &SessionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
               SET data = EXCLUDED.data,
                   expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.id)
        .bind(Json(&record.data))
        .bind(record.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, data, expires_at
              FROM sessions
             WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn destroy(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}
