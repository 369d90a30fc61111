//! Nimbus session core — tab/space lifecycle and snapshot persistence
//! for the Nimbus browser.
//!
//! This library crate exposes all modules for use by the binary and
//! integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod services;
pub mod types;
