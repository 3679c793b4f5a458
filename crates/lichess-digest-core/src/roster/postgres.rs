use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::types::{DestinationId, TrackedUser, parse_time_of_day};

use super::RosterStore;

const SCHEDULE_TIME_KEY: &str = "daily_stats_time";

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS tracked_users (
         id BIGSERIAL PRIMARY KEY,
         handle TEXT NOT NULL,
         display_name TEXT NOT NULL,
         created_at TIMESTAMPTZ NOT NULL DEFAULT now()
     )",
    "CREATE UNIQUE INDEX IF NOT EXISTS tracked_users_handle_key
         ON tracked_users (LOWER(handle))",
    "CREATE TABLE IF NOT EXISTS bot_settings (
         key TEXT PRIMARY KEY,
         value TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS delivery_destinations (
         id TEXT PRIMARY KEY,
         created_at TIMESTAMPTZ NOT NULL DEFAULT now()
     )",
];

#[derive(Debug, Clone)]
pub struct PostgresRosterStore {
    pool: PgPool,
}

impl PostgresRosterStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl RosterStore for PostgresRosterStore {
    async fn list_users(&self) -> anyhow::Result<Vec<TrackedUser>> {
        let users = sqlx::query_as::<_, (String, String)>(
            "SELECT handle, display_name
             FROM tracked_users
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(handle, display_name)| TrackedUser {
            handle,
            display_name,
        })
        .collect();

        Ok(users)
    }

    async fn find_user(&self, handle: &str) -> anyhow::Result<Option<TrackedUser>> {
        let user = sqlx::query_as::<_, (String, String)>(
            "SELECT handle, display_name
             FROM tracked_users
             WHERE LOWER(handle) = LOWER($1)",
        )
        .bind(handle.trim())
        .fetch_optional(&self.pool)
        .await?
        .map(|(handle, display_name)| TrackedUser {
            handle,
            display_name,
        });

        Ok(user)
    }

    async fn add_user(&self, user: TrackedUser) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO tracked_users (handle, display_name)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user.handle)
        .bind(user.display_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn edit_user(&self, old_handle: &str, updated: TrackedUser) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let (collides,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (
                 SELECT 1 FROM tracked_users
                 WHERE LOWER(handle) = LOWER($1) AND LOWER(handle) <> LOWER($2)
             )",
        )
        .bind(&updated.handle)
        .bind(old_handle.trim())
        .fetch_one(&mut *tx)
        .await?;
        if collides {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE tracked_users
             SET handle = $1, display_name = $2
             WHERE LOWER(handle) = LOWER($3)",
        )
        .bind(updated.handle)
        .bind(updated.display_name)
        .bind(old_handle.trim())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_user(&self, handle: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM tracked_users WHERE LOWER(handle) = LOWER($1)")
            .bind(handle.trim())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn schedule_time(&self) -> anyhow::Result<Option<String>> {
        let time = sqlx::query_as::<_, (String,)>("SELECT value FROM bot_settings WHERE key = $1")
            .bind(SCHEDULE_TIME_KEY)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.0);
        Ok(time)
    }

    async fn set_schedule_time(&self, time: &str) -> anyhow::Result<bool> {
        let Ok(parsed) = parse_time_of_day(time) else {
            return Ok(false);
        };

        sqlx::query(
            "INSERT INTO bot_settings (key, value)
             VALUES ($1, $2)
             ON CONFLICT (key)
             DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(SCHEDULE_TIME_KEY)
        .bind(parsed.format("%H:%M").to_string())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    async fn add_destination(&self, destination: &DestinationId) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO delivery_destinations (id)
             VALUES ($1)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(destination.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_destinations(&self) -> anyhow::Result<Vec<DestinationId>> {
        let destinations = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM delivery_destinations ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id,)| DestinationId(id))
        .collect();
        Ok(destinations)
    }
}
