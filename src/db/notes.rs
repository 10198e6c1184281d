//! User notes: last-write-wins per `(user_id, key)`.

use crate::error::Result;
use crate::model::{NewNote, UserId, UserNote};
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl super::Db {
    /// Insert a note, or overwrite category/value/confidence/source of the
    /// existing note with the same key and bump its timestamp.
    pub async fn upsert_note(&self, user_id: UserId, note: &NewNote) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_notes (user_id, category, key, value, confidence, source, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             ON CONFLICT (user_id, key) DO UPDATE SET
                 category = EXCLUDED.category,
                 value = EXCLUDED.value,
                 confidence = EXCLUDED.confidence,
                 source = EXCLUDED.source,
                 updated_at = now()",
        )
        .bind(user_id.0)
        .bind(&note.category)
        .bind(&note.key)
        .bind(&note.value)
        .bind(note.confidence)
        .bind(&note.source)
        .execute(&self.pool)
        .await?;

        metrics::notes_upserted().add(1, &[]);
        Ok(())
    }

    /// All notes for a user, most confident first.
    pub async fn list_notes(&self, user_id: UserId) -> Result<Vec<UserNote>> {
        let rows: Vec<NoteRow> = sqlx::query_as(
            "SELECT user_id, category, key, value, confidence, source, updated_at
             FROM user_notes
             WHERE user_id = $1
             ORDER BY confidence DESC, key",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserNote::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    user_id: Uuid,
    category: String,
    key: String,
    value: String,
    confidence: f64,
    source: String,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for UserNote {
    fn from(row: NoteRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            category: row.category,
            key: row.key,
            value: row.value,
            confidence: row.confidence,
            source: row.source,
            updated_at: row.updated_at,
        }
    }
}
