//! # Config Decoder
//!
//! Applies inbound configuration documents to the local mirror.
//!
//! Two topologies are accepted, checked in this order:
//!
//! ```text
//! {"cfg": {...}}                 direct configuration push
//! {"state": {"cfg": {...}}}      shadow delta
//! ```
//!
//! Any other document is a no-op. Every recognised key that is applied is
//! marked dirty again so the next config report echoes it back as an
//! acknowledgment.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::change_mask::ChangeMask;
use super::protocol::{ConfigField, DeviceConfig, FieldValue, KEY_CFG, KEY_STATE};
use crate::error::{Result, TrackerError};

/// Locate the `cfg` object in either accepted topology
fn find_cfg(root: &Value) -> Option<&Map<String, Value>> {
    if let Some(cfg) = root.get(KEY_CFG) {
        return cfg.as_object();
    }
    root.get(KEY_STATE)?.get(KEY_CFG)?.as_object()
}

/// Interpret a JSON value for `field`.
///
/// Numbers are truncated toward zero first, so `-0.5` reads as 0; values
/// that still do not fit a `u32` are rejected. `act` additionally accepts
/// booleans.
fn field_value(field: ConfigField, value: &Value) -> Option<FieldValue> {
    match value {
        Value::Bool(flag) if field == ConfigField::Active => Some(FieldValue::Flag(*flag)),
        Value::Number(n) => {
            let whole = match n.as_u64() {
                Some(u) => u,
                None => {
                    let whole = n.as_f64()?.trunc();
                    if !whole.is_finite() || whole < 0.0 {
                        return None;
                    }
                    whole as u64
                }
            };
            u32::try_from(whole).ok().map(FieldValue::Number)
        }
        _ => None,
    }
}

/// Decode `input` and apply recognised configuration keys.
///
/// Returns the set of fields that were assigned.
///
/// # Errors
///
/// - `InvalidInput` if `input` is empty
/// - `ParseFailure` if `input` is not well-formed JSON
pub fn decode_config(
    input: &[u8],
    config: &mut DeviceConfig,
    mask: &mut ChangeMask,
) -> Result<ChangeMask> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(TrackerError::InvalidInput("empty document".to_string()));
    }

    let root: Value = serde_json::from_slice(input)?;
    debug!("Decoded message: {}", root);

    let Some(cfg) = find_cfg(&root) else {
        debug!("No configuration in document, ignoring");
        return Ok(ChangeMask::empty());
    };

    let mut applied = ChangeMask::empty();
    for (key, value) in cfg {
        let Some(field) = ConfigField::from_key(key) else {
            continue;
        };
        let Some(parsed) = field_value(field, value) else {
            warn!("Ignoring unusable value for {}: {}", key, value);
            continue;
        };
        if config.set(field, parsed) {
            info!("Setting {:?} to {:?}", field, parsed);
            mask.mark_dirty(field);
            applied.insert(field.into());
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::ReportEncoder;

    fn decode(input: &str) -> (Result<ChangeMask>, DeviceConfig, ChangeMask) {
        let mut config = DeviceConfig::default();
        let mut mask = ChangeMask::empty();
        let result = decode_config(input.as_bytes(), &mut config, &mut mask);
        (result, config, mask)
    }

    #[test]
    fn test_direct_cfg_topology() {
        let (result, config, mask) = decode(r#"{"cfg":{"gpst":30}}"#);
        assert_eq!(result.unwrap(), ChangeMask::GPS_TIMEOUT);
        assert_eq!(config.gps_timeout, 30);
        assert!(mask.is_dirty(ConfigField::GpsTimeout));
    }

    #[test]
    fn test_state_cfg_topology() {
        let (result, config, mask) = decode(r#"{"state":{"cfg":{"gpst":30}}}"#);
        assert!(result.is_ok());
        assert_eq!(config.gps_timeout, 30);
        assert_eq!(mask, ChangeMask::GPS_TIMEOUT);
    }

    #[test]
    fn test_direct_cfg_checked_first() {
        let (_, config, _) = decode(r#"{"cfg":{"mvt":10},"state":{"cfg":{"mvt":20}}}"#);
        assert_eq!(config.movement_timeout, 10);
    }

    #[test]
    fn test_unrelated_document_is_noop() {
        let (result, config, mask) = decode(r#"{"other":{}}"#);
        assert_eq!(result.unwrap(), ChangeMask::empty());
        assert_eq!(config, DeviceConfig::default());
        assert!(mask.is_empty());

        let (result, _, _) = decode(r#"{"state":{"reported":{}}}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let (result, _, _) = decode("");
        assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
        let (result, _, _) = decode("  \n");
        assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
    }

    #[test]
    fn test_malformed_input_is_parse_failure() {
        let (result, config, _) = decode(r#"{"cfg":{"gpst":"#);
        assert!(matches!(result, Err(TrackerError::ParseFailure(_))));
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (result, config, _) = decode(r#"{"cfg":{"future":1,"acct":7}}"#);
        assert_eq!(result.unwrap(), ChangeMask::ACCEL_THRESHOLD);
        assert_eq!(config.accel_threshold, 7);
    }

    #[test]
    fn test_active_accepts_bool_and_number() {
        let (_, config, _) = decode(r#"{"cfg":{"act":false}}"#);
        assert!(!config.active);
        let (_, config, _) = decode(r#"{"cfg":{"act":0}}"#);
        assert!(!config.active);
    }

    #[test]
    fn test_unusable_values_skipped() {
        let (result, config, mask) =
            decode(r#"{"cfg":{"gpst":-5,"actwt":"60","mvres":12.9,"mvt":true}}"#);
        assert_eq!(result.unwrap(), ChangeMask::PASSIVE_WAIT);
        assert_eq!(config.gps_timeout, 60);
        assert_eq!(config.active_wait, 60);
        assert_eq!(config.passive_wait, 12);
        assert_eq!(mask, ChangeMask::PASSIVE_WAIT);
    }

    #[test]
    fn test_negative_fraction_truncates_to_zero() {
        let (result, config, _) = decode(r#"{"cfg":{"acct":-0.5,"mvt":-1.5}}"#);
        assert_eq!(result.unwrap(), ChangeMask::ACCEL_THRESHOLD);
        assert_eq!(config.accel_threshold, 0);
        assert_eq!(config.movement_timeout, 3600);
    }

    #[test]
    fn test_reported_section_is_not_desired_config() {
        let (result, config, mask) = decode(r#"{"state":{"reported":{"cfg":{"gpst":5}}}}"#);
        assert_eq!(result.unwrap(), ChangeMask::empty());
        assert_eq!(config.gps_timeout, 60);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_round_trip_config() {
        let original = DeviceConfig {
            gps_timeout: 120,
            active: false,
            active_wait: 300,
            passive_wait: 45,
            movement_timeout: 7200,
            accel_threshold: 15,
        };
        let mut mask = ChangeMask::all();
        let payload = ReportEncoder::default()
            .encode_config_report(&original, &mut mask)
            .unwrap();
        assert!(mask.is_empty());

        // The report is {"state":{"reported":{"cfg":...}}}; the service pushes
        // the cfg object back unchanged.
        let doc: Value = serde_json::from_slice(&payload).unwrap();
        let pushed = serde_json::json!({ "cfg": doc["state"]["reported"]["cfg"] });

        let mut decoded = DeviceConfig {
            gps_timeout: 0,
            active: true,
            active_wait: 0,
            passive_wait: 0,
            movement_timeout: 0,
            accel_threshold: 0,
        };
        let mut decoded_mask = ChangeMask::empty();
        let applied =
            decode_config(pushed.to_string().as_bytes(), &mut decoded, &mut decoded_mask).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(applied, ChangeMask::all());
        assert_eq!(decoded_mask, ChangeMask::all());
    }
}
