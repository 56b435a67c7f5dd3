//! API route definitions
//!
//! REST endpoints for the organization log, manual corrections and scans.

pub mod health;
pub mod organize;
