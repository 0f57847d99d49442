//! Device layer for hardware signing devices reached through a bridge
//!
//! This crate owns everything between a request handler and the physical
//! device: transport enumeration and acquisition, the typed message
//! protocol with its PIN, passphrase and button interaction loop, the
//! failure taxonomy, and the retry policy applied to it.
//!
//! # Examples
//!
//! ```no_run
//! use keyconnect_device::{
//!     BridgeTransport, InteractionBroker, PassphraseMode, RetryPolicy, wait_for_first_device,
//! };
//!
//! # async fn run() -> keyconnect_device::Result<()> {
//! let transport = BridgeTransport::connect("http://127.0.0.1:21324", None).await?;
//! let (broker, _events) = InteractionBroker::new();
//!
//! let mut device = wait_for_first_device(&transport, &RetryPolicy::default(), &broker).await?;
//! let key = device
//!     .commands(&broker, PassphraseMode::Prompt)
//!     .get_public_key(&[0x8000_002c, 0x8000_0000, 0x8000_0000])
//!     .await?;
//! println!("xpub: {}", key.xpub);
//! device.release().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "bridge")]
mod bridge;
mod commands;
mod device;
mod error;
mod interaction;
pub mod messages;
mod retry;
mod transport;
mod version;

#[cfg(test)]
mod testing;

#[cfg(feature = "bridge")]
pub use bridge::{BridgeTransport, DEFAULT_BRIDGE_URL, fetch_config};
pub use commands::DeviceCommands;
pub use device::{Device, acquire_first_device, wait_for_first_device};
pub use error::{Classify, Error, ErrorKind, Result};
pub use interaction::{
    ChallengeKind, InteractionBroker, Notice, PassphraseMode, PendingChallenge, UiEvent,
};
pub use retry::{Action, DEFAULT_PIN_RETRY_DELAY, DEFAULT_POLL_INTERVAL, RetryPolicy};
pub use transport::{DeviceDescriptor, Session, Transport};
pub use version::{FirmwareVersion, MIN_FIRMWARE, SIGN_TX_FIRMWARE};
