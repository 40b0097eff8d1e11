//! # Tracker Sync Library
//!
//! Differential state synchronization for battery-powered asset trackers.
//!
//! This library renders device telemetry and configuration into device
//! shadow documents, batches queued position fixes without loss or
//! duplication, and applies configuration pushed back by the remote service.

pub mod config;
pub mod error;
pub mod codec;
pub mod backend;
pub mod session;
