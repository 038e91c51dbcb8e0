//! MVP respawn timer engine.
//!
//! Scrapes monster kills from a FluxCP ranking page, keeps the last kill per
//! monster on disk, resolves respawn windows through a cached lookup and
//! classifies every tracked monster as spawned, spawning or pending.

pub mod classifier;
pub mod config;
pub mod cycle;
pub mod health;
pub mod http;
pub mod ledger;
pub mod models;
pub mod render;
pub mod sinks;
pub mod source;
pub mod state;
pub mod store;
pub mod windows;
