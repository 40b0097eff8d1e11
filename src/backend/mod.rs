//! # Cloud Backend Module
//!
//! Transport contract consumed by the sync session, and a backend that
//! writes outgoing documents to the log instead of a network connection.
//!
//! This module handles:
//! - The `CloudBackend` trait (connect, disconnect, send, ping, event polling)
//! - Message endpoints and QoS levels
//! - Event delivery for connection state and inbound data

pub mod backend_trait;

pub use backend_trait::{CloudBackend, CloudEvent, CloudMessage, Endpoint, Qos};

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};

/// Backend that logs every outgoing document.
///
/// Useful for dry runs on a host: connection state is tracked and events
/// are queued so the session sees the same sequence a real backend produces.
#[derive(Debug, Default)]
pub struct LogBackend {
    client_id: String,
    connected: bool,
    sent: u64,
    events: VecDeque<CloudEvent>,
}

impl LogBackend {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of documents sent so far
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Queue an inbound document as if the service had pushed it
    pub fn inject(&mut self, message: CloudMessage) {
        self.events.push_back(CloudEvent::DataReceived(message));
    }
}

#[async_trait]
impl CloudBackend for LogBackend {
    async fn connect(&mut self) -> Result<()> {
        info!("Backend '{}' connected", self.client_id);
        self.connected = true;
        self.events.push_back(CloudEvent::Connected);
        self.events.push_back(CloudEvent::Ready);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        info!("Backend '{}' disconnected", self.client_id);
        self.connected = false;
        self.events.push_back(CloudEvent::Disconnected);
        Ok(())
    }

    async fn send(&mut self, message: CloudMessage) -> Result<()> {
        if !self.connected {
            return Err(TrackerError::Backend("not connected".to_string()));
        }
        self.sent += 1;
        info!(
            "[{:?}/{:?}] {}",
            message.endpoint,
            message.qos,
            String::from_utf8_lossy(&message.payload)
        );
        self.events.push_back(CloudEvent::DataSent);
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        debug!("Backend '{}' ping", self.client_id);
        Ok(())
    }

    async fn poll_event(&mut self) -> Result<Option<CloudEvent>> {
        Ok(self.events.pop_front())
    }
}
