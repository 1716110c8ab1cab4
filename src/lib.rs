//! Custody Brief
//!
//! Single-document legal analysis for family-law filings:
//! - Accepts one PDF or image upload (pdf, jpeg, png, webp; max 10 MiB)
//! - Sends it inline to Gemini with a strict extraction schema
//! - Rejects any response that does not satisfy the schema
//! - Drives the attempt through an observable, single-flight state machine
//! - Projects the accepted record into a report view-model
//!
//! FLOW:
//! IDLE → ANALYZING → (COMPLETE | ERROR) → RESET → IDLE

pub mod api;
pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod flow;
pub mod gemini;
pub mod models;
pub mod profile;
pub mod report;
pub mod schema;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use error::AnalysisError;
pub use flow::AnalysisFlow;
pub use report::{project, Report};
