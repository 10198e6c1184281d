//! Database connection pool, migrations, and health check.
//!
//! One Postgres pool shared by the request path (coach replies) and the
//! background note extraction. Every operation checks out its own
//! connection; no transaction spans more than one call.

pub mod conversation;
pub mod notes;
pub mod profile;

use crate::error::{Error, Result};
use crate::model::{UserId, UserProfile};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Handles created at startup so first-run clients have someone to talk as.
const DEFAULT_USERS: &[(&str, &str)] = &[("guest", "Guest User"), ("test-user", "Test User")];

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert the default users if they are missing. Returns how many were created.
    pub async fn seed_default_users(&self) -> Result<usize> {
        let mut created = 0;
        for (handle, name) in DEFAULT_USERS {
            let id = UserId::from_handle(handle);
            let profile = UserProfile {
                id: Some(id),
                name: (*name).to_string(),
                email: format!("{handle}@example.com"),
                fitness_goal: Some("generalFitness".to_string()),
                ..UserProfile::default()
            };
            if self.insert_profile_if_absent(id, &profile).await? {
                info!(%id, handle, "created default user");
                created += 1;
            }
        }
        Ok(created)
    }
}
