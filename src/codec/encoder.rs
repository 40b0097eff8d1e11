//! # State Report Encoder
//!
//! Renders device telemetry and the configuration mirror into
//! `{"state": {"reported": {...}}}` documents.

use bytes::Bytes;
use tracing::debug;

use super::change_mask::ChangeMask;
use super::clock::ClockSource;
use super::document::{serialize, DocResult, DocumentBuilder, DocumentError, Node};
use super::protocol::*;
use crate::error::{Result, TrackerError};

/// Sections carried by a telemetry report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySections {
    pub battery: bool,
    pub acceleration: bool,
    pub position: bool,
}

impl TelemetrySections {
    /// Section selection by operating mode and fix status.
    ///
    /// | active | fix   | sections                        |
    /// |--------|-------|---------------------------------|
    /// | true   | false | battery                         |
    /// | true   | true  | battery, position               |
    /// | false  | false | battery, acceleration           |
    /// | false  | true  | battery, acceleration, position |
    pub fn select(active_mode: bool, has_position_fix: bool) -> Self {
        Self {
            battery: true,
            acceleration: !active_mode,
            position: has_position_fix,
        }
    }
}

/// Build the `{"lng", "lat", "acc", "alt", "spd", "hdg"}` value object
pub(crate) fn position_node(
    builder: &mut DocumentBuilder,
    sample: &PositionSample,
) -> DocResult<Node> {
    let mut value = builder.object()?;
    builder.add_number(&mut value, KEY_LONGITUDE, sample.longitude)?;
    builder.add_number(&mut value, KEY_LATITUDE, sample.latitude)?;
    builder.add_number(&mut value, KEY_ACCURACY, sample.accuracy)?;
    builder.add_number(&mut value, KEY_ALTITUDE, sample.altitude)?;
    builder.add_number(&mut value, KEY_SPEED, sample.speed)?;
    builder.add_number(&mut value, KEY_HEADING, sample.heading)?;
    Ok(value)
}

/// Encoder for single-shot state reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportEncoder {
    pub(crate) max_nodes: usize,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENT_NODES)
    }
}

impl ReportEncoder {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Encode battery, acceleration and position sections according to
    /// [`TelemetrySections::select`].
    ///
    /// Each section carries its own timestamp derived from the subsystem's
    /// capture time.
    ///
    /// # Errors
    ///
    /// - `AllocationFailure` if the report skeleton cannot be created
    /// - `RetryableAssembly` if any section fails; nothing partial is emitted
    pub fn encode_telemetry<C>(
        &self,
        state: &DeviceState,
        position: &PositionSample,
        clock: &C,
    ) -> Result<Bytes>
    where
        C: ClockSource + ?Sized,
    {
        let offset = clock.offset();
        let sections = TelemetrySections::select(state.active_mode(), state.has_position_fix);

        let mut builder = DocumentBuilder::new(self.max_nodes);
        let mut reported = builder.object().map_err(DocumentError::allocation)?;

        let assembled: DocResult<Node> = (|| {
            if sections.battery {
                let value = builder.integer(i64::from(state.battery.voltage_mv))?;
                let bat = builder
                    .timestamped(value, offset.to_epoch_ms(state.battery.timestamp_ms))?;
                reported.insert(KEY_BAT, bat)?;
            }
            if sections.acceleration {
                let value = builder.number_array(KEY_ACC, &state.accel.vector)?;
                let acc =
                    builder.timestamped(value, offset.to_epoch_ms(state.accel.timestamp_ms))?;
                reported.insert(KEY_ACC, acc)?;
            }
            if sections.position {
                let value = position_node(&mut builder, position)?;
                let gps = builder.timestamped(value, offset.to_epoch_ms(position.timestamp_ms))?;
                reported.insert(KEY_GPS, gps)?;
            }
            builder.wrap_reported(reported)
        })();

        let root = assembled.map_err(DocumentError::assembly)?;
        let payload = serialize(root)?;
        debug!("Encoded telemetry: {}", String::from_utf8_lossy(&payload));
        Ok(payload)
    }

    /// Encode every dirty configuration field, then clear exactly the bits
    /// that were included.
    ///
    /// # Errors
    ///
    /// - `NothingToReport` if no field is dirty
    /// - `AllocationFailure` if the report skeleton cannot be created
    /// - `RetryableAssembly` if a field cannot be attached; the mask is
    ///   left untouched
    pub fn encode_config_report(
        &self,
        config: &DeviceConfig,
        mask: &mut ChangeMask,
    ) -> Result<Bytes> {
        let included = *mask;
        if included.is_empty() {
            return Err(TrackerError::NothingToReport);
        }

        let mut builder = DocumentBuilder::new(self.max_nodes);
        let mut cfg = builder.object().map_err(DocumentError::allocation)?;

        let assembled: DocResult<Node> = (|| {
            for field in included.dirty_fields() {
                match config.get(field) {
                    FieldValue::Number(n) => {
                        builder.add_integer(&mut cfg, field.key(), i64::from(n))?
                    }
                    FieldValue::Flag(flag) => builder.add_bool(&mut cfg, field.key(), flag)?,
                }
            }
            let mut reported = builder.object()?;
            reported.insert(KEY_CFG, cfg)?;
            builder.wrap_reported(reported)
        })();

        let root = assembled.map_err(DocumentError::assembly)?;
        let payload = serialize(root)?;
        mask.clear_reported(included);

        debug!(
            "Encoded config report ({} fields): {}",
            included.bits().count_ones(),
            String::from_utf8_lossy(&payload)
        );
        Ok(payload)
    }
}
