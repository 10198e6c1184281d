//! Onboarding profile.
//!
//! The nested blocks are stored as JSON columns and use the camelCase
//! field names the mobile client sends.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Everything the coach knows about a user from onboarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Option<UserId>,
    pub name: String,
    pub email: String,
    pub fitness_goal: Option<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub physical_stats: PhysicalStats,
    #[serde(default)]
    pub health_metrics: HealthMetrics,
    #[serde(default)]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalStats {
    pub age: Option<u32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthMetrics {
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
    pub bmi: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub lbm: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub measurement_unit: MeasurementUnit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementUnit {
    Imperial,
    /// Also used for any unit string the client sends that we don't know.
    #[default]
    #[serde(other)]
    Metric,
}

impl MeasurementUnit {
    pub fn length(self) -> &'static str {
        match self {
            MeasurementUnit::Metric => "cm",
            MeasurementUnit::Imperial => "inches",
        }
    }

    pub fn mass(self) -> &'static str {
        match self {
            MeasurementUnit::Metric => "kg",
            MeasurementUnit::Imperial => "lbs",
        }
    }
}
