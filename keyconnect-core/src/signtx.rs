//! Device side of transaction signing: the `TxRequest`/`TxAck` exchange

use keyconnect_device::DeviceCommands;
use keyconnect_device::messages::{
    Message, SignTx, TransactionType, TxAck, TxInputType, TxOutputType, TxRequest, TxRequestType,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::tx::RefTransaction;

/// Signing result: per-input signatures and the serialized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTx {
    pub signatures: Vec<String>,
    pub serialized_tx: String,
}

fn invalid(message: String) -> Error {
    keyconnect_device::Error::InvalidResponse(message).into()
}

fn pick<T: Clone>(items: &[T], index: u32, what: &str) -> Result<T> {
    items
        .get(index as usize)
        .cloned()
        .ok_or_else(|| invalid(format!("device requested unknown {what} #{index}")))
}

/// Answer the device's requests until it reports the transaction finished
pub async fn sign_tx(
    commands: &mut DeviceCommands<'_>,
    inputs: &[TxInputType],
    outputs: &[TxOutputType],
    refs: &[RefTransaction],
    coin_name: &str,
) -> Result<SignedTx> {
    let refs: HashMap<&str, &RefTransaction> =
        refs.iter().map(|tx| (tx.hash.as_str(), tx)).collect();

    let mut signatures = vec![String::new(); inputs.len()];
    let mut serialized_tx = String::new();

    let sign = SignTx {
        inputs_count: inputs.len() as u32,
        outputs_count: outputs.len() as u32,
        coin_name: coin_name.to_string(),
    };
    let mut response = commands.typed_call(Message::encode(&sign)?).await?;

    loop {
        let request: TxRequest = response.decode()?;

        if let Some(serialized) = &request.serialized {
            if let (Some(index), Some(signature)) =
                (serialized.signature_index, &serialized.signature)
            {
                let slot = signatures
                    .get_mut(index as usize)
                    .ok_or_else(|| invalid(format!("signature for unknown input #{index}")))?;
                *slot = signature.clone();
            }
            if let Some(chunk) = &serialized.serialized_tx {
                serialized_tx.push_str(chunk);
            }
        }

        if request.request_type == TxRequestType::Finished {
            debug!("Device finished signing {} input(s)", inputs.len());
            return Ok(SignedTx {
                signatures,
                serialized_tx,
            });
        }

        let details = request.details.unwrap_or_default();
        let index = details.request_index.unwrap_or_default();
        trace!(
            "TxRequest {:?} #{index} for {:?}",
            request.request_type, details.tx_hash
        );

        let tx = match details.tx_hash.as_deref() {
            None => match request.request_type {
                TxRequestType::Input => TransactionType {
                    inputs: vec![pick(inputs, index, "input")?],
                    ..Default::default()
                },
                TxRequestType::Output => TransactionType {
                    outputs: vec![pick(outputs, index, "output")?],
                    ..Default::default()
                },
                other => return Err(invalid(format!("unsupported request {other:?}"))),
            },
            Some(hash) => {
                let reference = refs
                    .get(hash.to_lowercase().as_str())
                    .ok_or_else(|| invalid(format!("device requested unknown transaction {hash}")))?;
                match request.request_type {
                    TxRequestType::Meta => TransactionType {
                        version: Some(reference.version),
                        lock_time: Some(reference.lock_time),
                        inputs_cnt: Some(reference.inputs.len() as u32),
                        outputs_cnt: Some(reference.bin_outputs.len() as u32),
                        ..Default::default()
                    },
                    TxRequestType::Input => TransactionType {
                        inputs: vec![pick(&reference.inputs, index, "referenced input")?],
                        ..Default::default()
                    },
                    TxRequestType::Output => TransactionType {
                        bin_outputs: vec![pick(&reference.bin_outputs, index, "referenced output")?],
                        ..Default::default()
                    },
                    other => return Err(invalid(format!("unsupported request {other:?}"))),
                }
            }
        };

        response = commands.typed_call(Message::encode(&TxAck { tx })?).await?;
    }
}
