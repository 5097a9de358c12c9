//! Blestore firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod events;

// Re-export the ESP-IDF-only modules so the crate compiles on the host;
// the actual implementations are guarded by cfg attributes inside.
pub mod adapters;
