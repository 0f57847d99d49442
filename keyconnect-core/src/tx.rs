//! Transaction input/output validation and referenced transaction shapes

use bitcoin::Address;
use keyconnect_device::messages::{TxInputType, TxOutputBinType, TxOutputType};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

use crate::backend::BackendTransaction;
use crate::coin::CoinInfo;
use crate::error::{Error, Result};
use crate::params::{ParamRule, ParamType, validate_params};
use crate::path::{coin_type, coerce_index, normalize_path, serialize_path};

pub const DEFAULT_INPUT_SCRIPT: &str = "SPENDADDRESS";
pub const DEFAULT_OUTPUT_SCRIPT: &str = "PAYTOADDRESS";

const INPUT_RULES: &[ParamRule] = &[
    ParamRule::required("address_n", ParamType::Array),
    ParamRule::required("prev_hash", ParamType::String),
    ParamRule::required("prev_index", ParamType::Number),
    ParamRule::optional("amount", ParamType::Number),
    ParamRule::optional("sequence", ParamType::Number),
    ParamRule::optional("script_type", ParamType::String),
];

const OUTPUT_RULES: &[ParamRule] = &[
    ParamRule::required("amount", ParamType::Number),
    ParamRule::optional("address", ParamType::String),
    ParamRule::optional("script_type", ParamType::String),
];

fn string_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(str::to_string)
}

fn is_tx_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate signing inputs and bring them into device wire shape.
///
/// Every input path must belong to `coin`.
pub fn validate_inputs(inputs: &Value, coin: &CoinInfo) -> Result<Vec<TxInputType>> {
    let inputs = inputs
        .as_array()
        .ok_or_else(|| Error::validation("Parameter \"inputs\" has invalid type. \"array\" expected."))?;

    inputs
        .iter()
        .map(|input| {
            validate_params(input, INPUT_RULES)?;

            let address_n = normalize_path(&input["address_n"])?;
            if coin_type(&address_n) != Some(coin.slip44) {
                return Err(Error::validation(format!(
                    "Input path {} does not match coin {}",
                    serialize_path(&address_n),
                    coin.name
                )));
            }

            let prev_hash = input["prev_hash"].as_str().unwrap_or_default().to_lowercase();
            if !is_tx_hash(&prev_hash) {
                return Err(Error::validation(format!(
                    "Invalid prev_hash \"{prev_hash}\""
                )));
            }

            let prev_index = coerce_index(&input["prev_index"])
                .ok_or_else(|| Error::validation("Invalid prev_index"))?;
            let amount = match input.get("amount") {
                Some(Value::Null) | None => None,
                Some(value) => Some(
                    value
                        .as_u64()
                        .ok_or_else(|| Error::validation("Invalid input amount"))?,
                ),
            };

            Ok(TxInputType {
                address_n,
                prev_hash,
                prev_index,
                script_sig: None,
                sequence: input.get("sequence").and_then(coerce_index),
                script_type: Some(
                    string_field(input, "script_type")
                        .unwrap_or_else(|| DEFAULT_INPUT_SCRIPT.to_string()),
                ),
                amount,
            })
        })
        .collect()
}

/// Validate outputs against the coin's network rules
pub fn validate_outputs(outputs: &Value, coin: &CoinInfo) -> Result<Vec<TxOutputType>> {
    let outputs = outputs
        .as_array()
        .ok_or_else(|| Error::validation("Parameter \"outputs\" has invalid type. \"array\" expected."))?;

    outputs
        .iter()
        .map(|output| {
            validate_params(output, OUTPUT_RULES)?;

            let amount = output["amount"]
                .as_u64()
                .ok_or_else(|| Error::validation("Invalid output amount"))?;

            let address = match string_field(output, "address") {
                Some(address) => {
                    Address::from_str(&address)
                        .and_then(|a| a.require_network(coin.network))
                        .map_err(|e| {
                            Error::validation(format!(
                                "Invalid {} output address {address}: {e}",
                                coin.name
                            ))
                        })?;
                    Some(address)
                }
                None => None,
            };

            let address_n = match output.get("address_n") {
                Some(Value::Null) | None => Vec::new(),
                Some(path) => normalize_path(path)?,
            };

            if address.is_none() && address_n.is_empty() {
                return Err(Error::validation("Output is missing address or address_n"));
            }

            Ok(TxOutputType {
                address,
                address_n,
                amount,
                script_type: string_field(output, "script_type")
                    .unwrap_or_else(|| DEFAULT_OUTPUT_SCRIPT.to_string()),
            })
        })
        .collect()
}

/// Refuse output sets whose total does not exceed the coin's dust limit
pub fn check_dust(outputs: &[TxOutputType], coin: &CoinInfo) -> Result<()> {
    let total = outputs
        .iter()
        .try_fold(0u64, |total, output| total.checked_add(output.amount))
        .ok_or_else(|| Error::validation("Output total overflows"))?;
    if total <= coin.dust_limit {
        return Err(Error::validation("AMOUNT_TOO_LOW"));
    }
    Ok(())
}

/// Distinct previous transaction hashes, in first-reference order
pub fn referenced_hashes(inputs: &[TxInputType]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .filter(|input| seen.insert(input.prev_hash.as_str()))
        .map(|input| input.prev_hash.clone())
        .collect()
}

/// Referenced transaction in the shape the device asks for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTransaction {
    pub hash: String,
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<TxInputType>,
    pub bin_outputs: Vec<TxOutputBinType>,
}

const COINBASE_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

impl From<BackendTransaction> for RefTransaction {
    fn from(tx: BackendTransaction) -> Self {
        let inputs = tx
            .inputs
            .into_iter()
            .map(|input| {
                let (prev_hash, prev_index) = match input.prev_hash {
                    Some(hash) => (hash.to_lowercase(), input.prev_index),
                    None => (COINBASE_HASH.to_string(), u32::MAX),
                };
                TxInputType {
                    address_n: Vec::new(),
                    prev_hash,
                    prev_index,
                    script_sig: Some(input.script_sig),
                    sequence: Some(input.sequence),
                    script_type: None,
                    amount: None,
                }
            })
            .collect();

        let bin_outputs = tx
            .outputs
            .into_iter()
            .map(|output| TxOutputBinType {
                amount: output.amount.to_sat(),
                script_pubkey: output.script_pubkey,
            })
            .collect();

        Self {
            hash: tx.hash.to_lowercase(),
            version: tx.version,
            lock_time: tx.lock_time,
            inputs,
            bin_outputs,
        }
    }
}
