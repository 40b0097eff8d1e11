//! # Change Tracker
//!
//! Per-field dirty bits for the configuration mirror. A set bit means the
//! field's current value has not yet been acknowledged to the remote
//! service. Bits are set on every assignment and cleared only after a config
//! report carrying the field was encoded successfully.

use bitflags::bitflags;

use super::protocol::ConfigField;

bitflags! {
    /// Set of configuration fields awaiting report
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeMask: u8 {
        const GPS_TIMEOUT = 0b00_0001;
        const ACTIVE = 0b00_0010;
        const ACTIVE_WAIT = 0b00_0100;
        const PASSIVE_WAIT = 0b00_1000;
        const MOVEMENT_TIMEOUT = 0b01_0000;
        const ACCEL_THRESHOLD = 0b10_0000;
    }
}

impl Default for ChangeMask {
    /// Everything dirty, so the first report carries the full configuration
    fn default() -> Self {
        ChangeMask::all()
    }
}

impl From<ConfigField> for ChangeMask {
    fn from(field: ConfigField) -> Self {
        match field {
            ConfigField::GpsTimeout => ChangeMask::GPS_TIMEOUT,
            ConfigField::Active => ChangeMask::ACTIVE,
            ConfigField::ActiveWait => ChangeMask::ACTIVE_WAIT,
            ConfigField::PassiveWait => ChangeMask::PASSIVE_WAIT,
            ConfigField::MovementTimeout => ChangeMask::MOVEMENT_TIMEOUT,
            ConfigField::AccelThreshold => ChangeMask::ACCEL_THRESHOLD,
        }
    }
}

impl ChangeMask {
    pub fn mark_dirty(&mut self, field: ConfigField) {
        self.insert(field.into());
    }

    pub fn is_dirty(&self, field: ConfigField) -> bool {
        self.contains(field.into())
    }

    /// Dirty fields in report order
    pub fn dirty_fields(&self) -> impl Iterator<Item = ConfigField> + '_ {
        ConfigField::ALL
            .into_iter()
            .filter(move |&field| self.is_dirty(field))
    }

    /// Clear the bits in `reported`, leaving any others untouched
    pub fn clear_reported(&mut self, reported: ChangeMask) {
        self.remove(reported);
    }

    pub fn clear_all(&mut self) {
        *self = ChangeMask::empty();
    }
}
