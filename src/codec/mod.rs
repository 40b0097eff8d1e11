//! # Cloud Codec Module
//!
//! Differential state synchronization between the device and its shadow on
//! the remote service.
//!
//! This module handles:
//! - Tracking which configuration fields still need reporting
//! - Batching queued position fixes without loss or duplication
//! - Rendering telemetry, configuration and modem state into JSON documents
//! - Applying inbound configuration documents to the local mirror
//! - Translating uptime stamps into epoch milliseconds

pub mod protocol;
pub mod document;
pub mod change_mask;
pub mod clock;
pub mod ring;
pub mod batch;
pub mod encoder;
pub mod network;
pub mod decoder;

pub use batch::{encode_position_batch, BatchEncoder, PositionBatch};
pub use change_mask::ChangeMask;
pub use clock::{ClockOffset, ClockSource, FixedClock, SystemClock, TimeSync};
pub use decoder::decode_config;
pub use encoder::{ReportEncoder, TelemetrySections};
pub use network::network_mode_label;
pub use protocol::{ConfigField, DeviceConfig, DeviceState, ModemInfo, PositionSample, RadioMode};
pub use ring::SampleRing;
