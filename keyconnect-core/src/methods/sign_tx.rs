use keyconnect_device::messages::{TxInputType, TxOutputType};
use keyconnect_device::{PassphraseMode, SIGN_TX_FIRMWARE};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::info;

use super::{Contract, MethodContext, Permission};
use crate::coin::{CoinInfo, coin_by_currency, required_firmware};
use crate::error::{Error, Result};
use crate::params::{ParamRule, ParamType, validate_params};
use crate::resolver::resolve_referenced;
use crate::signtx::sign_tx;
use crate::tx::{RefTransaction, check_dust, validate_inputs, validate_outputs};

const RULES: &[ParamRule] = &[
    ParamRule::required("inputs", ParamType::Array),
    ParamRule::required("outputs", ParamType::Array),
    ParamRule::required("coin", ParamType::String),
];

/// Sign a bitcoin-like transaction
#[derive(Debug)]
pub struct SignTransaction {
    pub coin: &'static CoinInfo,
    pub inputs: Vec<TxInputType>,
    pub outputs: Vec<TxOutputType>,
    /// Resolved once; a PIN retry signs again with the same references
    refs: OnceCell<Vec<RefTransaction>>,
}

impl SignTransaction {
    pub fn parse(payload: &Value) -> Result<Self> {
        validate_params(payload, RULES)?;

        let currency = payload["coin"].as_str().unwrap_or_default();
        let coin = coin_by_currency(currency).ok_or_else(|| Error::validation("Coin not found"))?;

        let inputs = validate_inputs(&payload["inputs"], coin)?;
        let outputs = validate_outputs(&payload["outputs"], coin)?;
        check_dust(&outputs, coin)?;

        Ok(Self {
            coin,
            inputs,
            outputs,
            refs: OnceCell::new(),
        })
    }

    pub fn contract(&self) -> Contract {
        Contract {
            permissions: &[Permission::Read, Permission::Write],
            required_firmware: required_firmware(SIGN_TX_FIRMWARE, self.coin.min_firmware),
            use_device: true,
            use_ui: true,
            info: "Sign transaction",
        }
    }

    pub async fn run(&self, ctx: &mut MethodContext<'_>) -> Result<Value> {
        let broker = ctx.broker;
        let backends = ctx.backends;
        let device = ctx.device()?;
        device.coin(self.coin.name)?;

        let refs = self
            .refs
            .get_or_try_init(|| async {
                let backend = backends.create(self.coin.backend, self.coin.backend_url);
                resolve_referenced(backend.as_ref(), &self.inputs).await
            })
            .await?;

        info!(
            "Signing {} input(s), {} output(s) on {}",
            self.inputs.len(),
            self.outputs.len(),
            self.coin.name
        );
        let mut commands = device.commands(broker, PassphraseMode::Prompt);
        let signed = sign_tx(
            &mut commands,
            &self.inputs,
            &self.outputs,
            refs,
            self.coin.name,
        )
        .await?;

        Ok(json!({
            "type": "signtx",
            "signatures": signed.signatures,
            "serialized_tx": signed.serialized_tx,
        }))
    }
}
