//! # Network Telemetry Encoder
//!
//! Reports modem information in two independently timestamped sections:
//! `dev` (static: band, network mode, SIM, versions) and `roam` (dynamic:
//! signal strength, area, operator, cell, IP).

use bytes::Bytes;
use tracing::debug;

use super::clock::ClockSource;
use super::document::{serialize, DocResult, DocumentBuilder, DocumentError, Node};
use super::encoder::ReportEncoder;
use super::protocol::*;
use crate::error::Result;

const LTE_M_LABEL: &str = "LTE-M";
const NB_IOT_LABEL: &str = "NB-IoT";
const GPS_SUFFIX: &str = " GPS";

/// Network mode label, e.g. `"LTE-M GPS"`.
///
/// Empty base when the radio mode is unknown; the GPS suffix is still
/// appended if positioning is active.
pub fn network_mode_label(radio: RadioMode, gps_active: bool) -> String {
    let base = match radio {
        RadioMode::LteM => LTE_M_LABEL,
        RadioMode::NbIot => NB_IOT_LABEL,
        RadioMode::Unknown => "",
    };
    let mut label = String::with_capacity(base.len() + GPS_SUFFIX.len());
    label.push_str(base);
    if gps_active {
        label.push_str(GPS_SUFFIX);
    }
    label
}

/// Numeric operator code from the modem's operator string.
///
/// Parses like C `atoi`: leading whitespace, an optional sign, then as many
/// digits as are present. Returns 0 when no digits lead the string.
pub fn parse_operator_code(operator: &str) -> i64 {
    let trimmed = operator.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative {
        -value
    } else {
        value
    }
}

impl ReportEncoder {
    /// Encode modem telemetry.
    ///
    /// The dynamic `roam` section is always present; the static `dev`
    /// section only when `include_static` is set. Both are stamped with the
    /// current uptime translated through the clock offset.
    ///
    /// # Errors
    ///
    /// - `AllocationFailure` if the report skeleton cannot be created
    /// - `RetryableAssembly` if any field fails to attach
    pub fn encode_network_telemetry<C>(
        &self,
        modem: &ModemInfo,
        include_static: bool,
        signal_strength: i32,
        app_version: &str,
        clock: &C,
    ) -> Result<Bytes>
    where
        C: ClockSource + ?Sized,
    {
        let timestamp = clock.offset().to_epoch_ms(clock.uptime_ms());

        let mut builder = DocumentBuilder::new(self.max_nodes);
        let mut reported = builder.object().map_err(DocumentError::allocation)?;

        let assembled: DocResult<Node> = (|| {
            if include_static {
                let label = network_mode_label(modem.radio_mode, modem.gps_active);
                let mut value = builder.object()?;
                builder.add_integer(&mut value, KEY_BAND, i64::from(modem.band))?;
                builder.add_str(&mut value, KEY_NETWORK_MODE, &label)?;
                builder.add_str(&mut value, KEY_ICCID, &modem.iccid)?;
                builder.add_str(&mut value, KEY_MODEM_FW, &modem.modem_firmware)?;
                builder.add_str(&mut value, KEY_BOARD, &modem.board)?;
                builder.add_str(&mut value, KEY_APP_VERSION, app_version)?;
                let dev = builder.timestamped(value, timestamp)?;
                reported.insert(KEY_DEV, dev)?;
            }

            let mut value = builder.object()?;
            builder.add_integer(&mut value, KEY_RSRP, i64::from(signal_strength))?;
            builder.add_integer(&mut value, KEY_AREA, i64::from(modem.area_code))?;
            builder.add_integer(&mut value, KEY_MCCMNC, parse_operator_code(&modem.operator))?;
            builder.add_integer(&mut value, KEY_CELL, i64::from(modem.cell_id))?;
            builder.add_str(&mut value, KEY_IP, &modem.ip_address)?;
            let roam = builder.timestamped(value, timestamp)?;
            reported.insert(KEY_ROAM, roam)?;

            builder.wrap_reported(reported)
        })();

        let root = assembled.map_err(DocumentError::assembly)?;
        let payload = serialize(root)?;
        debug!("Encoded network telemetry: {}", String::from_utf8_lossy(&payload));
        Ok(payload)
    }
}
