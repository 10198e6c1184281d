//! Secret handling utilities.
//!
//! Re-exports the secrecy types used for the database URL and provider
//! API keys, so callers don't need a direct secrecy dependency.

pub use secrecy::{ExposeSecret, SecretString};
