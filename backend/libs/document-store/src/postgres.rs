use crate::error::{Result, StoreError};
use crate::models::{Chat, Event, User};
use crate::updates::{ChatUpdate, EventUpdate, UserUpdate};
use crate::DocumentStore;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL-backed document store
///
/// Each collection is a table of `(id, doc jsonb)` rows. Events additionally
/// carry `end_date` and chats `event_id` as plain columns for indexed lookups.
/// Updates run read-modify-write inside a transaction holding the row lock.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_doc<T: DeserializeOwned>(&self, table: &str, id: Uuid) -> Result<Option<T>> {
        let doc: Option<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = $1", table))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        doc.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    async fn find_docs<T: DeserializeOwned>(&self, table: &str, ids: &[Uuid]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let docs: Vec<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = ANY($1)", table))
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    /// Lock the row, apply `mutate` to the decoded document and write it back.
    async fn update_doc<T, F>(&self, table: &str, id: Uuid, mutate: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut tx = self.pool.begin().await?;

        let doc: Option<serde_json::Value> = sqlx::query_scalar(&format!(
            "SELECT doc FROM {} WHERE id = $1 FOR UPDATE",
            table
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(doc) = doc else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut document: T = serde_json::from_value(doc)?;
        mutate(&mut document);

        sqlx::query(&format!(
            "UPDATE {} SET doc = $2, updated_at = NOW() WHERE id = $1",
            table
        ))
        .bind(id)
        .bind(serde_json::to_value(&document)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Updated {} document {}", table, id);
        Ok(Some(document))
    }
}

/// Map a unique violation on insert to [`StoreError::Duplicate`]
fn insert_error(what: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(format!("{} {}", what, id))
        }
        other => other.into(),
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        self.find_doc("users", id).await
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        self.find_docs("users", ids).await
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn sample_user_ids(&self, exclude: &BTreeSet<Uuid>, limit: usize) -> Result<Vec<Uuid>> {
        let exclude: Vec<Uuid> = exclude.iter().copied().collect();
        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE NOT (id = ANY($1))
            LIMIT $2
            "#,
        )
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, doc, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            "#,
        )
        .bind(user.id)
        .bind(serde_json::to_value(&user)?)
        .execute(&self.pool)
        .await
        .map_err(insert_error("user", user.id))?;
        Ok(())
    }

    async fn update_user(&self, id: Uuid, ops: &[UserUpdate]) -> Result<Option<User>> {
        self.update_doc("users", id, |user: &mut User| {
            for op in ops {
                op.apply(user);
            }
        })
        .await
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>> {
        self.find_doc("events", id).await
    }

    async fn find_events(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        self.find_docs("events", ids).await
    }

    async fn find_open_events(
        &self,
        now: DateTime<Utc>,
        exclude: &BTreeSet<Uuid>,
    ) -> Result<Vec<Event>> {
        let exclude: Vec<Uuid> = exclude.iter().copied().collect();
        let docs: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT doc FROM events
            WHERE end_date >= $1
              AND NOT (id = ANY($2))
            "#,
        )
        .bind(now)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    async fn insert_event(&self, event: Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, end_date, doc, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            "#,
        )
        .bind(event.id)
        .bind(event.end_date)
        .bind(serde_json::to_value(&event)?)
        .execute(&self.pool)
        .await
        .map_err(insert_error("event", event.id))?;
        Ok(())
    }

    async fn update_event(&self, id: Uuid, ops: &[EventUpdate]) -> Result<Option<Event>> {
        self.update_doc("events", id, |event: &mut Event| {
            for op in ops {
                op.apply(event);
            }
        })
        .await
    }

    async fn find_chat(&self, id: Uuid) -> Result<Option<Chat>> {
        self.find_doc("chats", id).await
    }

    async fn find_chat_by_event(&self, event_id: Uuid) -> Result<Option<Chat>> {
        let doc: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT doc FROM chats WHERE event_id = $1 LIMIT 1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;
        doc.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    async fn insert_chat(&self, chat: Chat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, event_id, doc, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            "#,
        )
        .bind(chat.id)
        .bind(chat.event)
        .bind(serde_json::to_value(&chat)?)
        .execute(&self.pool)
        .await
        .map_err(insert_error("chat", chat.id))?;
        Ok(())
    }

    async fn update_chat(&self, id: Uuid, ops: &[ChatUpdate]) -> Result<Option<Chat>> {
        self.update_doc("chats", id, |chat: &mut Chat| {
            for op in ops {
                op.apply(chat);
            }
        })
        .await
    }

    async fn remove_push_token(&self, token: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET doc = jsonb_set(doc, '{tokens}', (doc->'tokens') - $1::text),
                updated_at = NOW()
            WHERE doc->'tokens' ? $1::text
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
