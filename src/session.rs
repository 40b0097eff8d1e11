//! # Sync Session
//!
//! Owns the device state, change mask, sample ring and backend, and runs the
//! codec against them one call at a time. Every mutation goes through
//! `&mut self`, which is what keeps encode passes from interleaving with new
//! samples or inbound updates.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backend::{CloudBackend, CloudEvent, CloudMessage, Endpoint, Qos};
use crate::codec::batch::BatchEncoder;
use crate::codec::change_mask::ChangeMask;
use crate::codec::clock::ClockSource;
use crate::codec::decoder::decode_config;
use crate::codec::encoder::ReportEncoder;
use crate::codec::protocol::{
    AccelReading, BatteryReading, ConfigField, DeviceState, FieldValue, ModemInfo, PositionSample,
};
use crate::codec::ring::SampleRing;
use crate::config::Config;
use crate::error::{Result, TrackerError};

/// What one reporting pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Documents handed to the backend
    pub sent: usize,
    /// Sections with nothing to report
    pub skipped: usize,
    /// Sections that failed to encode or send
    pub failed: usize,
    /// Position samples delivered
    pub samples: usize,
    /// Wall-clock time of the pass, if the clock offset maps to a valid date
    pub reported_at: Option<DateTime<Utc>>,
}

/// Device-side synchronization session
pub struct SyncSession<B, C> {
    backend: B,
    clock: C,
    state: DeviceState,
    mask: ChangeMask,
    ring: SampleRing,
    last_position: PositionSample,
    reports: ReportEncoder,
    batches: BatchEncoder,
    qos: Qos,
    app_version: String,
    static_modem_every: u32,
    cycle: u64,
}

impl<B, C> std::fmt::Debug for SyncSession<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("state", &self.state)
            .field("mask", &self.mask)
            .field("queued", &self.ring.queued_count())
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl<B: CloudBackend, C: ClockSource> SyncSession<B, C> {
    /// Create a session with every configuration field dirty
    pub fn new(config: &Config, backend: B, clock: C) -> Self {
        Self {
            backend,
            clock,
            state: DeviceState::new(config.device.initial_config()),
            mask: ChangeMask::default(),
            ring: SampleRing::new(),
            last_position: PositionSample::default(),
            reports: ReportEncoder::new(config.codec.max_document_nodes),
            batches: BatchEncoder::new(
                config.codec.max_per_message,
                config.codec.max_document_nodes,
            ),
            qos: config.backend.qos,
            app_version: config.device.app_version.clone(),
            static_modem_every: config.reporting.static_modem_every.max(1),
            cycle: 0,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn mask(&self) -> ChangeMask {
        self.mask
    }

    pub fn ring(&self) -> &SampleRing {
        &self.ring
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Assign a configuration field locally and mark it for reporting
    pub fn set_config_field(&mut self, field: ConfigField, value: FieldValue) -> bool {
        let assigned = self.state.config.set(field, value);
        if assigned {
            self.mask.mark_dirty(field);
        }
        assigned
    }

    /// Store a position fix and queue it for batching
    pub fn record_position(&mut self, sample: PositionSample) {
        let outcome = self.ring.push(sample);
        if outcome.overwrote_queued {
            warn!("Sample ring full, overwrote unsent slot {}", outcome.slot);
        }
        self.last_position = sample;
        self.state.has_position_fix = true;
    }

    pub fn record_battery(&mut self, reading: BatteryReading) {
        self.state.battery = reading;
    }

    pub fn record_accel(&mut self, reading: AccelReading) {
        self.state.accel = reading;
    }

    pub fn update_modem(&mut self, modem: ModemInfo, signal_strength: i32) {
        self.state.modem = modem;
        self.state.signal_strength = signal_strength;
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.backend.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.backend.disconnect().await
    }

    async fn send(&mut self, payload: Bytes, endpoint: Endpoint) -> Result<()> {
        self.backend
            .send(CloudMessage::new(payload, endpoint, self.qos))
            .await
    }

    /// Run one reporting pass: config report, telemetry, network telemetry
    /// and a position batch.
    ///
    /// Failures in one section do not stop the others. Nothing is lost on
    /// failure: unsent config fields stay dirty and unsent samples stay
    /// queued for the next pass.
    pub async fn publish_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            reported_at: self.clock.offset().to_datetime(self.clock.uptime_ms()),
            ..Default::default()
        };

        // Config report
        let pending = self.mask;
        match self.reports.encode_config_report(&self.state.config, &mut self.mask) {
            Ok(payload) => match self.send(payload, Endpoint::State).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Config report not sent, keeping fields dirty: {}", e);
                    self.mask |= pending;
                    report.failed += 1;
                }
            },
            Err(e) => tally(&mut report, "config report", &e),
        }

        // Telemetry
        let telemetry = self
            .reports
            .encode_telemetry(&self.state, &self.last_position, &self.clock);
        match telemetry {
            Ok(payload) => match self.send(payload, Endpoint::State).await {
                Ok(()) => report.sent += 1,
                Err(e) => tally(&mut report, "telemetry", &e),
            },
            Err(e) => tally(&mut report, "telemetry", &e),
        }

        // Network telemetry
        let include_static = self.cycle % u64::from(self.static_modem_every) == 0;
        let network = self.reports.encode_network_telemetry(
            &self.state.modem,
            include_static,
            self.state.signal_strength,
            &self.app_version,
            &self.clock,
        );
        match network {
            Ok(payload) => match self.send(payload, Endpoint::State).await {
                Ok(()) => report.sent += 1,
                Err(e) => tally(&mut report, "network telemetry", &e),
            },
            Err(e) => tally(&mut report, "network telemetry", &e),
        }

        // Position batch, committed only once the backend took it
        match self.batches.encode(&self.ring, &self.clock) {
            Ok(batch) => match self.send(batch.payload().clone(), Endpoint::Batch).await {
                Ok(()) => {
                    report.samples = batch.commit(&mut self.ring);
                    report.sent += 1;
                }
                Err(e) => tally(&mut report, "position batch", &e),
            },
            Err(e) => tally(&mut report, "position batch", &e),
        }

        self.state.has_position_fix = false;
        self.cycle += 1;

        info!(
            "Cycle {} at {}: sent {}, skipped {}, failed {}, {} samples still queued",
            self.cycle,
            report
                .reported_at
                .map_or_else(|| "unknown time".to_string(), |t| t.to_rfc3339()),
            report.sent,
            report.skipped,
            report.failed,
            self.ring.queued_count()
        );
        report
    }

    /// React to one backend event
    ///
    /// # Errors
    ///
    /// Returns the decode error if an inbound document is empty or malformed
    pub fn handle_event(&mut self, event: CloudEvent) -> Result<()> {
        match event {
            CloudEvent::DataReceived(message) => {
                let applied =
                    decode_config(&message.payload, &mut self.state.config, &mut self.mask)?;
                if !applied.is_empty() {
                    info!("Applied {} configuration field(s)", applied.bits().count_ones());
                }
            }
            CloudEvent::Connected => info!("Cloud connected"),
            CloudEvent::Disconnected => info!("Cloud disconnected"),
            CloudEvent::Error(e) => warn!("Cloud error: {}", e),
            other => debug!("Cloud event: {:?}", other),
        }
        Ok(())
    }

    /// Drain and handle every event the backend has buffered
    pub async fn pump_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.backend.poll_event().await? {
            if let Err(e) = self.handle_event(event) {
                warn!("Dropping inbound document: {}", e);
            }
            handled += 1;
        }
        Ok(handled)
    }
}

fn tally(report: &mut CycleReport, section: &str, err: &TrackerError) {
    if err.is_skip() {
        debug!("No {} this cycle", section);
        report.skipped += 1;
    } else {
        warn!("Skipping {}: {}", section, err);
        report.failed += 1;
    }
}
