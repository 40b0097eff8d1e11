//! # Wire Protocol Constants and Types
//!
//! Key names understood by the remote device shadow, buffer limits, and the
//! local data model mirrored into outgoing documents.

/// Top-level wrapper object for shadow documents
pub const KEY_STATE: &str = "state";

/// Device-reported section under `state`
pub const KEY_REPORTED: &str = "reported";

/// Configuration section
pub const KEY_CFG: &str = "cfg";

/// Position section (single object in telemetry, array in batches)
pub const KEY_GPS: &str = "gps";

/// Battery section
pub const KEY_BAT: &str = "bat";

/// Acceleration section
pub const KEY_ACC: &str = "acc";

/// Static modem section
pub const KEY_DEV: &str = "dev";

/// Dynamic modem section
pub const KEY_ROAM: &str = "roam";

/// Value member of a timestamped entry
pub const KEY_VALUE: &str = "v";

/// Timestamp member of a timestamped entry (epoch milliseconds)
pub const KEY_TIMESTAMP: &str = "ts";

/// Position value keys
pub const KEY_LONGITUDE: &str = "lng";
pub const KEY_LATITUDE: &str = "lat";
pub const KEY_ACCURACY: &str = "acc";
pub const KEY_ALTITUDE: &str = "alt";
pub const KEY_SPEED: &str = "spd";
pub const KEY_HEADING: &str = "hdg";

/// Static modem keys
pub const KEY_BAND: &str = "band";
pub const KEY_NETWORK_MODE: &str = "nw";
pub const KEY_ICCID: &str = "iccid";
pub const KEY_MODEM_FW: &str = "modV";
pub const KEY_BOARD: &str = "brdV";
pub const KEY_APP_VERSION: &str = "appV";

/// Dynamic modem keys
pub const KEY_RSRP: &str = "rsrp";
pub const KEY_AREA: &str = "area";
pub const KEY_MCCMNC: &str = "mccmnc";
pub const KEY_CELL: &str = "cell";
pub const KEY_IP: &str = "ip";

/// Capacity of the position sample ring buffer
pub const SAMPLE_BUFFER_CAPACITY: usize = 10;

/// Default maximum number of samples carried by one batch document
pub const DEFAULT_MAX_PER_MESSAGE: usize = 5;

/// Default node budget for a single document
pub const DEFAULT_MAX_DOCUMENT_NODES: usize = 512;

/// Nodes of the `{"state": {"reported": {...}}}` envelope
const ENVELOPE_NODES: usize = 3;
/// Nodes a `{"v": ..., "ts": ...}` wrapper adds around its value
const TIMESTAMPED_NODES: usize = 2;
/// Position value object and its six numbers
const POSITION_NODES: usize = 7;

/// Nodes of a full config report: `cfg` plus one per field
pub const CONFIG_REPORT_NODES: usize = ENVELOPE_NODES + 1 + ConfigField::ALL.len();

/// Nodes of the largest telemetry report (passive mode with a fix):
/// battery, three-axis acceleration and position
pub const TELEMETRY_REPORT_NODES: usize = ENVELOPE_NODES
    + (1 + TIMESTAMPED_NODES)
    + (1 + 3 + TIMESTAMPED_NODES)
    + (POSITION_NODES + TIMESTAMPED_NODES);

/// Nodes of a network report carrying both `dev` (six fields) and `roam`
/// (five fields)
pub const NETWORK_REPORT_NODES: usize =
    ENVELOPE_NODES + (1 + 6 + TIMESTAMPED_NODES) + (1 + 5 + TIMESTAMPED_NODES);

/// Nodes of a batch document carrying `samples` position entries
pub const fn batch_document_nodes(samples: usize) -> usize {
    ENVELOPE_NODES + 1 + samples * (POSITION_NODES + TIMESTAMPED_NODES)
}

/// Smallest node budget under which every document of a reporting cycle
/// fits, with batches of up to `max_per_message` samples
pub fn required_document_nodes(max_per_message: usize) -> usize {
    [
        CONFIG_REPORT_NODES,
        TELEMETRY_REPORT_NODES,
        NETWORK_REPORT_NODES,
        batch_document_nodes(max_per_message),
    ]
    .into_iter()
    .max()
    .unwrap_or_default()
}

/// Remotely configurable device fields.
///
/// The discriminant order is the order fields appear in a config report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// Position fix timeout in seconds (`gpst`)
    GpsTimeout,
    /// Active/passive mode flag (`act`)
    Active,
    /// Wait between reports in active mode, seconds (`actwt`)
    ActiveWait,
    /// Wait between reports in passive mode, seconds (`mvres`)
    PassiveWait,
    /// Movement timeout in seconds (`mvt`)
    MovementTimeout,
    /// Accelerometer threshold (`acct`)
    AccelThreshold,
}

impl ConfigField {
    /// All fields in report order
    pub const ALL: [ConfigField; 6] = [
        ConfigField::GpsTimeout,
        ConfigField::Active,
        ConfigField::ActiveWait,
        ConfigField::PassiveWait,
        ConfigField::MovementTimeout,
        ConfigField::AccelThreshold,
    ];

    /// Wire key for this field
    pub fn key(self) -> &'static str {
        match self {
            ConfigField::GpsTimeout => "gpst",
            ConfigField::Active => "act",
            ConfigField::ActiveWait => "actwt",
            ConfigField::PassiveWait => "mvres",
            ConfigField::MovementTimeout => "mvt",
            ConfigField::AccelThreshold => "acct",
        }
    }

    /// Look up a field by its wire key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Configuration mirror shared with the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub gps_timeout: u32,
    pub active: bool,
    pub active_wait: u32,
    pub passive_wait: u32,
    pub movement_timeout: u32,
    pub accel_threshold: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            gps_timeout: 60,
            active: true,
            active_wait: 60,
            passive_wait: 60,
            movement_timeout: 3600,
            accel_threshold: 100,
        }
    }
}

/// Value carried by one configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Number(u32),
    Flag(bool),
}

impl DeviceConfig {
    /// Read a field's current value
    pub fn get(&self, field: ConfigField) -> FieldValue {
        match field {
            ConfigField::GpsTimeout => FieldValue::Number(self.gps_timeout),
            ConfigField::Active => FieldValue::Flag(self.active),
            ConfigField::ActiveWait => FieldValue::Number(self.active_wait),
            ConfigField::PassiveWait => FieldValue::Number(self.passive_wait),
            ConfigField::MovementTimeout => FieldValue::Number(self.movement_timeout),
            ConfigField::AccelThreshold => FieldValue::Number(self.accel_threshold),
        }
    }

    /// Assign a field. Returns false if the value kind does not fit the field.
    pub fn set(&mut self, field: ConfigField, value: FieldValue) -> bool {
        match (field, value) {
            (ConfigField::Active, FieldValue::Flag(flag)) => self.active = flag,
            (ConfigField::Active, FieldValue::Number(n)) => self.active = n != 0,
            (_, FieldValue::Flag(_)) => return false,
            (ConfigField::GpsTimeout, FieldValue::Number(n)) => self.gps_timeout = n,
            (ConfigField::ActiveWait, FieldValue::Number(n)) => self.active_wait = n,
            (ConfigField::PassiveWait, FieldValue::Number(n)) => self.passive_wait = n,
            (ConfigField::MovementTimeout, FieldValue::Number(n)) => self.movement_timeout = n,
            (ConfigField::AccelThreshold, FieldValue::Number(n)) => self.accel_threshold = n,
        }
        true
    }
}

/// Battery snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryReading {
    /// Battery voltage in millivolts
    pub voltage_mv: u32,
    /// Local uptime at capture, milliseconds
    pub timestamp_ms: i64,
}

/// Accelerometer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccelReading {
    /// X, Y, Z acceleration in m/s²
    pub vector: [f64; 3],
    /// Local uptime at capture, milliseconds
    pub timestamp_ms: i64,
}

/// One position ring buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSample {
    /// Longitude in degrees
    pub longitude: f64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    /// Altitude in meters
    pub altitude: f64,
    /// Ground speed in m/s
    pub speed: f64,
    /// Heading in degrees
    pub heading: f64,
    /// Local uptime at capture, milliseconds
    pub timestamp_ms: i64,
    /// Captured but not yet delivered
    pub queued: bool,
}

/// Local mirror of everything reportable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceState {
    pub config: DeviceConfig,
    pub battery: BatteryReading,
    pub accel: AccelReading,
    /// A valid position fix was obtained this cycle
    pub has_position_fix: bool,
    /// Last modem snapshot, reported as network telemetry
    pub modem: ModemInfo,
    /// Last measured signal strength (RSRP index)
    pub signal_strength: i32,
}

impl DeviceState {
    /// Create a state mirror with the given initial configuration
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Operating mode, as selected by the configuration
    pub fn active_mode(&self) -> bool {
        self.config.active
    }
}

/// Radio access technology the modem is attached with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioMode {
    LteM,
    NbIot,
    #[default]
    Unknown,
}

/// Read-only modem snapshot taken at encode time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModemInfo {
    pub radio_mode: RadioMode,
    /// Positioning is active on the radio
    pub gps_active: bool,
    pub band: u32,
    pub iccid: String,
    pub modem_firmware: String,
    pub board: String,
    pub area_code: u32,
    /// Operator identifier as reported by the modem (e.g. "24201")
    pub operator: String,
    pub cell_id: u32,
    pub ip_address: String,
}
