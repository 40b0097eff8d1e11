//! Trait abstraction for the cloud transport so the session can be tested
//! without a network connection

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::Result;

/// Delivery guarantee requested for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// Destination kind for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// General message topic
    Msg,
    /// Device shadow update topic
    State,
    /// Configuration topic
    Config,
    /// Pairing topic
    Pair,
    /// Batched sample topic
    Batch,
    /// Raw URI endpoint
    Uri,
}

/// One document on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudMessage {
    pub payload: Bytes,
    pub endpoint: Endpoint,
    pub qos: Qos,
}

impl CloudMessage {
    pub fn new(payload: Bytes, endpoint: Endpoint, qos: Qos) -> Self {
        Self {
            payload,
            endpoint,
            qos,
        }
    }
}

/// Events a backend reports asynchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudEvent {
    Connected,
    Disconnected,
    Ready,
    Error(String),
    DataSent,
    DataReceived(CloudMessage),
    PairRequest,
    PairDone,
}

/// Cloud transport operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudBackend: Send {
    /// Establish the connection
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the connection
    async fn disconnect(&mut self) -> Result<()>;

    /// Hand one serialized document to the transport
    async fn send(&mut self, message: CloudMessage) -> Result<()>;

    /// Keep-alive; backends without one succeed trivially
    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    /// Poll for the next pending event, if the backend buffers them
    async fn poll_event(&mut self) -> Result<Option<CloudEvent>> {
        Ok(None)
    }
}
