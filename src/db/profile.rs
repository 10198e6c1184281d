//! Onboarding profiles.

use crate::error::Result;
use crate::model::{HealthMetrics, PhysicalStats, Preferences, UserId, UserProfile};
use sqlx::types::Json;
use uuid::Uuid;

impl super::Db {
    /// Fetch a profile. `None` if the user never onboarded.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, name, email, fitness_goal, dietary_preferences,
                    physical_stats, health_metrics, preferences
             FROM users WHERE id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserProfile::from))
    }

    /// Create or replace a user's profile.
    pub async fn upsert_profile(&self, user_id: UserId, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, fitness_goal, dietary_preferences,
                                physical_stats, health_metrics, preferences)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name,
                 email = EXCLUDED.email,
                 fitness_goal = EXCLUDED.fitness_goal,
                 dietary_preferences = EXCLUDED.dietary_preferences,
                 physical_stats = EXCLUDED.physical_stats,
                 health_metrics = EXCLUDED.health_metrics,
                 preferences = EXCLUDED.preferences,
                 updated_at = now()",
        )
        .bind(user_id.0)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.fitness_goal)
        .bind(&profile.dietary_preferences)
        .bind(Json(&profile.physical_stats))
        .bind(Json(&profile.health_metrics))
        .bind(Json(&profile.preferences))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a profile unless the id already exists. Returns whether a row was written.
    pub(crate) async fn insert_profile_if_absent(
        &self,
        user_id: UserId,
        profile: &UserProfile,
    ) -> Result<bool> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO users (id, name, email, fitness_goal, dietary_preferences)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT DO NOTHING
             RETURNING id",
        )
        .bind(user_id.0)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.fitness_goal)
        .bind(&profile.dietary_preferences)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    name: String,
    email: String,
    fitness_goal: Option<String>,
    dietary_preferences: Vec<String>,
    physical_stats: Option<Json<PhysicalStats>>,
    health_metrics: Option<Json<HealthMetrics>>,
    preferences: Option<Json<Preferences>>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: Some(UserId(row.id)),
            name: row.name,
            email: row.email,
            fitness_goal: row.fitness_goal,
            dietary_preferences: row.dietary_preferences,
            physical_stats: row.physical_stats.map(|j| j.0).unwrap_or_default(),
            health_metrics: row.health_metrics.map(|j| j.0).unwrap_or_default(),
            preferences: row.preferences.map(|j| j.0).unwrap_or_default(),
        }
    }
}
