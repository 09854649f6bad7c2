//! Integration tests for the push pipeline.
//!
//! - `integration.rs`: end-to-end scan → candidates → trigger → force runs
//! - `netsync.rs`: client/server barrier coordination across a shared bus
//! - `helpers.rs`: shared fixture actors and systems

mod helpers;
mod integration;
