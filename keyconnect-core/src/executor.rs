//! Request execution: validate, authorize, acquire the device, run.

use keyconnect_device::{
    Device, InteractionBroker, RetryPolicy, Transport, acquire_first_device,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::BackendFactory;
use crate::bundle::ProgressSender;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::methods::{Method, MethodContext, Permission};
use crate::response::{Request, Response};

/// Runs requests one device call sequence at a time.
///
/// The executor owns the single active [`Device`]. Every request that needs
/// the device holds the slot for its whole run, so method runs never
/// interleave device calls. A device is reused across requests until a
/// device-level error, after which it is released and re-acquired on the
/// next request.
pub struct Executor {
    transport: Box<dyn Transport>,
    backends: Box<dyn BackendFactory>,
    broker: InteractionBroker,
    policy: RetryPolicy,
    trusted: bool,
    device: Mutex<Option<Device>>,
    /// Granted permissions per origin
    permissions: RefCell<HashMap<String, HashSet<Permission>>>,
}

impl Executor {
    pub fn new(
        transport: Box<dyn Transport>,
        backends: Box<dyn BackendFactory>,
        broker: InteractionBroker,
        config: &Config,
    ) -> Self {
        Self {
            transport,
            backends,
            broker,
            policy: config.retry_policy(),
            trusted: config.trusted,
            device: Mutex::new(None),
            permissions: RefCell::new(HashMap::new()),
        }
    }

    pub fn broker(&self) -> &InteractionBroker {
        &self.broker
    }

    /// Execute `request` and wrap the outcome as a [`Response`]
    pub async fn handle(&self, request: &Request, progress: Option<&ProgressSender>) -> Response {
        let response = match self
            .execute(&request.origin, &request.payload, progress)
            .await
        {
            Ok(payload) => Response::success(payload),
            Err(error) => {
                warn!("Request from {} failed ({}): {error}", request.origin, error.kind());
                Response::failure(&error)
            }
        };
        response.with_id(request.id.clone())
    }

    /// Validate and run one request payload.
    ///
    /// Origin and payload are validated before the device or any backend is
    /// touched. Acquisition and the method body run together under the retry
    /// policy, so a rejected PIN re-enters the original method.
    pub async fn execute(
        &self,
        origin: &str,
        payload: &Value,
        progress: Option<&ProgressSender>,
    ) -> Result<Value> {
        let identity = Identity::from_origin(origin)?;
        let method = Method::parse(payload)?;
        let contract = method.contract();
        debug!(
            "{} from {identity}: {} (firmware >= {})",
            method.name(),
            contract.info,
            contract.required_firmware
        );

        let mut slot = self.device.lock().await;
        self.check_permissions(&identity, contract.permissions)
            .await?;

        let outcome = self
            .policy
            .run(&self.broker, async || -> Result<Value> {
                let device = if contract.use_device {
                    if slot.is_none() {
                        *slot = Some(acquire_first_device(self.transport.as_ref()).await?);
                    }
                    let device = slot
                        .as_mut()
                        .ok_or(Error::Device(keyconnect_device::Error::NoConnectedDevice))?;
                    device.require_firmware(&contract.required_firmware)?;
                    Some(device)
                } else {
                    None
                };

                let mut ctx = MethodContext {
                    device,
                    broker: &self.broker,
                    backends: self.backends.as_ref(),
                    identity: &identity,
                    progress,
                };
                method.run(&mut ctx).await
            })
            .await;

        if let Err(error) = &outcome {
            if error.is_device_error() {
                if let Some(device) = slot.take() {
                    info!("Releasing device after error: {error}");
                    if let Err(release_error) = device.release().await {
                        warn!("Failed to release device: {release_error}");
                    }
                }
            }
        }
        outcome
    }

    /// Release the active device, if any
    pub async fn shutdown(&self) {
        if let Some(device) = self.device.lock().await.take() {
            if let Err(error) = device.release().await {
                warn!("Failed to release device: {error}");
            }
        }
    }

    async fn check_permissions(&self, identity: &Identity, needed: &[Permission]) -> Result<()> {
        if self.trusted || needed.is_empty() {
            return Ok(());
        }

        let key = identity.origin_key();
        let missing: Vec<Permission> = {
            let granted = self.permissions.borrow();
            needed
                .iter()
                .copied()
                .filter(|p| !granted.get(&key).is_some_and(|set| set.contains(p)))
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = missing.iter().map(Permission::to_string).collect();
        let label = format!("{identity} requests permission to {}", names.join(" and "));
        if !self.broker.request_confirmation(label).await? {
            info!("Permissions refused for {key}");
            return Err(Error::PermissionDenied);
        }

        self.permissions
            .borrow_mut()
            .entry(key)
            .or_default()
            .extend(missing);
        Ok(())
    }
}
