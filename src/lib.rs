//! # coach-rs
//!
//! Core of a nutrition and fitness coaching backend.
//!
//! Stores onboarding profiles and conversations in Postgres, answers users
//! through an LLM (rig-core), and defers note extraction to an in-process
//! single-worker task dispatcher so replies are never held up by it.
//! Observability goes through tracing and OpenTelemetry.

pub mod coach;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod model;
pub mod tasks;
pub mod telemetry;
