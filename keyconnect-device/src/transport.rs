//! Transport and session seams.
//!
//! A [`Transport`] enumerates and acquires devices; a [`Session`] is the
//! exclusive typed channel to one acquired device. Both run on a single
//! cooperative scheduler, so their futures are not required to be `Send`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::messages::Message;

/// Transport-level handle for one enumerated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub path: String,
    /// Session currently holding the device, if any
    #[serde(default)]
    pub session: Option<String>,
}

#[async_trait(?Send)]
pub trait Transport {
    /// Apply a signed transport configuration
    async fn configure(&self, config: &[u8]) -> Result<()>;

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    async fn acquire(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn Session>>;
}

#[async_trait(?Send)]
pub trait Session {
    /// Send one message and wait for the device's next message
    async fn call(&mut self, message: Message) -> Result<Message>;

    /// Give the device back to the transport
    async fn release(&mut self) -> Result<()>;
}
