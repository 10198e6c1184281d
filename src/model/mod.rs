//! Core data model.
//!
//! Users are addressed by [`UserId`]. A user has a profile captured at
//! onboarding, a conversation with the coach, and a set of notes the
//! background extraction distills from that conversation.

pub mod conversation;
pub mod note;
pub mod profile;
pub mod user;

pub use conversation::{ConversationEntry, Role};
pub use note::{NewNote, UserNote};
pub use profile::{HealthMetrics, MeasurementUnit, PhysicalStats, Preferences, UserProfile};
pub use user::UserId;
