//! Acquired device session and the gates a request passes before using it

use log::{debug, info, warn};
use std::collections::HashMap;

use crate::commands::DeviceCommands;
use crate::error::{Error, Result};
use crate::interaction::{InteractionBroker, PassphraseMode};
use crate::messages::{CoinType, Features, Initialize, Message};
use crate::retry::RetryPolicy;
use crate::transport::{DeviceDescriptor, Session, Transport};
use crate::version::{FirmwareVersion, MIN_FIRMWARE};

/// One acquired device with its reported features.
///
/// Addresses derived during the session are cached per derivation path.
pub struct Device {
    session: Box<dyn Session>,
    features: Features,
    accounts: HashMap<Vec<u32>, String>,
}

impl Device {
    /// Initialize an already acquired session and read its features
    pub async fn from_session(mut session: Box<dyn Session>) -> Result<Self> {
        let features: Features = session.call(Message::encode(&Initialize {})?).await?.decode()?;
        debug!(
            "Device {} firmware {}",
            features.device_id.as_deref().unwrap_or("(no id)"),
            FirmwareVersion::from_parts(
                features.major_version,
                features.minor_version,
                features.patch_version
            )
        );
        Ok(Self {
            session,
            features,
            accounts: HashMap::new(),
        })
    }

    pub async fn from_descriptor(
        transport: &dyn Transport,
        descriptor: &DeviceDescriptor,
    ) -> Result<Self> {
        let session = transport.acquire(descriptor).await?;
        Self::from_session(session).await
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn is_bootloader(&self) -> bool {
        self.features.bootloader_mode
    }

    pub fn is_initialized(&self) -> bool {
        self.features.initialized
    }

    pub fn version(&self) -> FirmwareVersion {
        FirmwareVersion::from_parts(
            self.features.major_version,
            self.features.minor_version,
            self.features.patch_version,
        )
    }

    pub fn at_least(&self, required: &FirmwareVersion) -> bool {
        self.version().at_least(required)
    }

    /// Fail with `FirmwareTooOld` unless the firmware is at least `required`
    pub fn require_firmware(&self, required: &FirmwareVersion) -> Result<()> {
        if self.at_least(required) {
            Ok(())
        } else {
            Err(Error::FirmwareTooOld {
                required: *required,
                found: self.version(),
            })
        }
    }

    /// Gates checked in order: bootloader, initialized, minimum firmware
    pub fn check_usable(&self, required: &FirmwareVersion) -> Result<()> {
        if self.is_bootloader() {
            return Err(Error::BootloaderMode);
        }
        if !self.is_initialized() {
            return Err(Error::Uninitialized);
        }
        self.require_firmware(required)
    }

    /// Look up `name` in the device's coin table.
    ///
    /// Devices that report no coin table accept any coin (`Ok(None)`).
    pub fn coin(&self, name: &str) -> Result<Option<&CoinType>> {
        if self.features.coins.is_empty() {
            return Ok(None);
        }
        self.features
            .coins
            .iter()
            .find(|coin| coin.coin_name.eq_ignore_ascii_case(name))
            .map(Some)
            .ok_or_else(|| Error::UnsupportedCoin(name.to_string()))
    }

    pub fn cached_account(&self, path: &[u32]) -> Option<&str> {
        self.accounts.get(path).map(String::as_str)
    }

    pub fn cache_account(&mut self, path: &[u32], address: impl Into<String>) {
        self.accounts.insert(path.to_vec(), address.into());
    }

    pub fn commands<'a>(
        &'a mut self,
        broker: &'a InteractionBroker,
        passphrase: PassphraseMode,
    ) -> DeviceCommands<'a> {
        DeviceCommands::new(&mut *self.session, broker, passphrase)
    }

    pub async fn release(mut self) -> Result<()> {
        self.session.release().await
    }
}

/// Acquire the first enumerated device and check it is usable.
///
/// A device failing a gate is released before the error is returned.
pub async fn acquire_first_device(transport: &dyn Transport) -> Result<Device> {
    let descriptors = transport.enumerate().await?;
    let descriptor = descriptors.first().ok_or(Error::NoConnectedDevice)?;
    let device = Device::from_descriptor(transport, descriptor).await?;

    if let Err(error) = device.check_usable(&MIN_FIRMWARE) {
        if let Err(release_error) = device.release().await {
            warn!("Failed to release unusable device: {release_error}");
        }
        return Err(error);
    }
    info!(
        "Using device at {} (firmware {})",
        descriptor.path,
        device.version()
    );
    Ok(device)
}

/// [`acquire_first_device`] under `policy`: polls while no device is
/// connected or the device sits in bootloader mode.
pub async fn wait_for_first_device(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    broker: &InteractionBroker,
) -> Result<Device> {
    policy
        .run(broker, async || acquire_first_device(transport).await)
        .await
}
