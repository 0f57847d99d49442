use keyconnect_device::{FirmwareVersion, PassphraseMode};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use tracing::debug;

use super::{Contract, MethodContext, Permission};
use crate::bundle::Bundle;
use crate::coin::{MiscNetwork, misc_network};
use crate::error::{Error, Result};
use crate::params::{ParamRule, ParamType, validate_params};
use crate::path::{serialize_path, validate_path};

const ACCOUNT_RULES: &[ParamRule] = &[
    ParamRule::optional("address", ParamType::String),
    ParamRule::required("block", ParamType::Number),
    ParamRule::required("transactions", ParamType::Number),
];

/// One requested account: known by address, by path, or both
#[derive(Debug, Clone, PartialEq)]
pub struct RippleAccount {
    pub address: Option<String>,
    pub path: Option<Vec<u32>>,
    pub block: Value,
    pub transactions: Value,
}

impl RippleAccount {
    pub fn parse(value: &Value) -> Result<Self> {
        validate_params(value, ACCOUNT_RULES)?;

        let address = value
            .get("address")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let path = match value.get("path") {
            None | Some(Value::Null) => None,
            Some(path) => Some(validate_path(path, 5)?),
        };
        if address.is_none() && path.is_none() {
            return Err(Error::validation("Path or address is missing in account"));
        }

        Ok(Self {
            address,
            path,
            block: value["block"].clone(),
            transactions: value["transactions"].clone(),
        })
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(path) = &self.path {
            map.insert("path".into(), json!(path));
        }
        map.insert("block".into(), self.block.clone());
        map.insert("transactions".into(), self.transactions.clone());
        map
    }
}

/// Look up account state for one or more ripple accounts
#[derive(Debug)]
pub struct RippleGetAccountInfo {
    pub accounts: Bundle<RippleAccount>,
    pub network: &'static MiscNetwork,
    /// Results of items finished by an earlier attempt of this request
    completed: RefCell<Vec<Value>>,
}

impl RippleGetAccountInfo {
    pub fn parse(payload: &Value) -> Result<Self> {
        let accounts = Bundle::from_payload(payload, "bundle", "account", RippleAccount::parse)?;
        let network = misc_network("xrp").ok_or_else(|| Error::validation("Coin not found"))?;
        Ok(Self {
            accounts,
            network,
            completed: RefCell::default(),
        })
    }

    pub fn contract(&self) -> Contract {
        Contract {
            permissions: &[Permission::Read],
            required_firmware: self
                .network
                .min_firmware
                .unwrap_or(FirmwareVersion::new(1, 0, 0)),
            use_device: true,
            use_ui: false,
            info: "Export ripple account info",
        }
    }

    pub async fn run(&self, ctx: &mut MethodContext<'_>) -> Result<Value> {
        let broker = ctx.broker;
        let progress = ctx.progress;
        let backend = ctx
            .backends
            .create(self.network.backend, self.network.backend_url);
        let device = ctx.device()?;

        // a retried attempt picks up after the last finished item
        let mut completed = self.completed.take();
        let result = self
            .accounts
            .process_from(&mut completed, progress, async |index, account| -> Result<Value> {
                let mut result = account.to_map();

                let address = match (&account.address, &account.path) {
                    (Some(address), _) => address.clone(),
                    (None, Some(path)) => {
                        let cached = device.cached_account(path).map(str::to_string);
                        let address = match cached {
                            Some(cached) => cached,
                            None => {
                                let derived = device
                                    .commands(broker, PassphraseMode::Prompt)
                                    .ripple_get_address(path, false)
                                    .await?;
                                device.cache_account(path, derived.as_str());
                                derived
                            }
                        };
                        result.insert("serialized_path".into(), json!(serialize_path(path)));
                        address
                    }
                    (None, None) => {
                        return Err(Error::validation("Path or address is missing in account"));
                    }
                };
                result.insert("address".into(), json!(address));

                debug!("Fetching account {index}: {address}");
                let info = backend.get_account_info(&address).await?;
                if let Value::Object(fresh) = serde_json::to_value(info)? {
                    result.extend(fresh);
                }
                Ok(Value::Object(result))
            })
            .await;
        if result.is_err() {
            self.completed.replace(completed);
        }
        result
    }
}
