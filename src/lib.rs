//! Watch-folder auto-organizer
//!
//! Parses downloaded media file names, matches them against the library,
//! and moves them into their canonical library paths. Every attempt lands
//! in the organization log.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod jobs;
pub mod services;
