//! Blockchain backends: referenced transaction lookup and account state

use async_trait::async_trait;
use bitcoin::{Amount, Denomination};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::coin::BackendKind;
use crate::config::Config;
use crate::error::{Error, Result};

/// Prior transaction as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTransaction {
    pub hash: String,
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<BackendInput>,
    pub outputs: Vec<BackendOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInput {
    /// `None` for a coinbase input
    pub prev_hash: Option<String>,
    pub prev_index: u32,
    pub sequence: u32,
    pub script_sig: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    pub amount: Amount,
    pub script_pubkey: String,
}

/// Account state merged into account-info results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
}

#[async_trait(?Send)]
pub trait Backend {
    async fn lookup_transaction(&self, hash: &str) -> Result<BackendTransaction>;

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo>;
}

/// Creates the backend serving a coin or network
pub trait BackendFactory {
    fn create(&self, kind: BackendKind, default_url: &str) -> Box<dyn Backend>;
}

/// Backends reached over HTTP, with endpoint overrides from [`Config`]
pub struct HttpBackends {
    insight_url: Option<String>,
    rippled_url: Option<String>,
    client: reqwest::Client,
}

impl HttpBackends {
    pub fn new(config: &Config) -> Self {
        Self {
            insight_url: config.insight_url.clone(),
            rippled_url: config.rippled_url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

impl BackendFactory for HttpBackends {
    fn create(&self, kind: BackendKind, default_url: &str) -> Box<dyn Backend> {
        match kind {
            BackendKind::Insight => {
                let url = self.insight_url.as_deref().unwrap_or(default_url);
                Box::new(InsightBackend::with_client(url, self.client.clone()))
            }
            BackendKind::Rippled => {
                let url = self.rippled_url.as_deref().unwrap_or(default_url);
                Box::new(RippledBackend::with_client(url, self.client.clone()))
            }
        }
    }
}

/// Parse a BTC denominated decimal, given as string or number, into an exact amount
pub fn parse_btc_amount(value: &Value) -> Result<Amount> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_u64() {
            Some(whole) => whole.to_string(),
            None => format!("{:.8}", n.as_f64().unwrap_or(f64::NAN)),
        },
        other => return Err(Error::Backend(format!("Invalid amount: {other}"))),
    };
    Amount::from_str_in(text.trim(), Denomination::Bitcoin)
        .map_err(|e| Error::Backend(format!("Invalid amount {text}: {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Backend returned {status}: {body}");
    let text = match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => status.to_string(),
    };
    Err(Error::Backend(text))
}

#[derive(Debug, Deserialize)]
struct InsightScript {
    #[serde(default)]
    hex: String,
}

#[derive(Debug, Deserialize)]
struct InsightInput {
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
    sequence: u32,
    #[serde(rename = "scriptSig", default)]
    script_sig: Option<InsightScript>,
    #[serde(default)]
    coinbase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightOutput {
    value: Value,
    #[serde(rename = "scriptPubKey")]
    script_pubkey: InsightScript,
}

#[derive(Debug, Deserialize)]
struct InsightTransaction {
    txid: String,
    version: u32,
    locktime: u32,
    vin: Vec<InsightInput>,
    vout: Vec<InsightOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightAddress {
    balance_sat: u64,
}

/// Insight REST API (`/api/tx/{hash}`, `/api/addr/{address}`)
pub struct InsightBackend {
    url: String,
    client: reqwest::Client,
}

impl InsightBackend {
    pub fn new(url: &str) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait(?Send)]
impl Backend for InsightBackend {
    async fn lookup_transaction(&self, hash: &str) -> Result<BackendTransaction> {
        let url = format!("{}/api/tx/{hash}", self.url);
        debug!("GET {url}");
        let response = check_status(self.client.get(&url).send().await?).await?;
        let tx: InsightTransaction = response.json().await?;

        let inputs = tx
            .vin
            .into_iter()
            .map(|input| match input.coinbase {
                Some(coinbase) => BackendInput {
                    prev_hash: None,
                    prev_index: u32::MAX,
                    sequence: input.sequence,
                    script_sig: coinbase,
                },
                None => BackendInput {
                    prev_hash: input.txid,
                    prev_index: input.vout.unwrap_or_default(),
                    sequence: input.sequence,
                    script_sig: input.script_sig.map(|s| s.hex).unwrap_or_default(),
                },
            })
            .collect();

        let outputs = tx
            .vout
            .into_iter()
            .map(|output| {
                Ok(BackendOutput {
                    amount: parse_btc_amount(&output.value)?,
                    script_pubkey: output.script_pubkey.hex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BackendTransaction {
            hash: tx.txid,
            version: tx.version,
            lock_time: tx.locktime,
            inputs,
            outputs,
        })
    }

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo> {
        let url = format!("{}/api/addr/{address}", self.url);
        debug!("GET {url}");
        let response = check_status(self.client.get(&url).send().await?).await?;
        let info: InsightAddress = response.json().await?;
        Ok(AccountInfo {
            balance: info.balance_sat.to_string(),
            sequence: None,
            block: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RippledEnvelope {
    result: RippledResult,
}

#[derive(Debug, Deserialize)]
struct RippledResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    account_data: Option<RippledAccountData>,
    #[serde(default)]
    ledger_index: Option<u64>,
    #[serde(default)]
    ledger_current_index: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RippledAccountData {
    balance: String,
    sequence: u64,
}

/// rippled JSON-RPC (`account_info`)
pub struct RippledBackend {
    url: String,
    client: reqwest::Client,
}

impl RippledBackend {
    pub fn new(url: &str) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<RippledResult> {
        let request_body = serde_json::json!({
            "method": method,
            "params": [params],
        });
        debug!("rippled {method}");
        let response = self.client.post(&self.url).json(&request_body).send().await?;
        let envelope: RippledEnvelope = check_status(response).await?.json().await?;
        Ok(envelope.result)
    }
}

#[async_trait(?Send)]
impl Backend for RippledBackend {
    async fn lookup_transaction(&self, hash: &str) -> Result<BackendTransaction> {
        Err(Error::Backend(format!(
            "Transaction lookup is not supported by rippled backend ({hash})"
        )))
    }

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo> {
        let result = self
            .rpc_call(
                "account_info",
                serde_json::json!({"account": address, "ledger_index": "validated"}),
            )
            .await?;
        let block = result.ledger_index.or(result.ledger_current_index);

        match (result.status.as_deref(), result.error.as_deref()) {
            // unfunded accounts are not an error for the caller
            (_, Some("actNotFound")) => Ok(AccountInfo {
                balance: "0".to_string(),
                sequence: Some(0),
                block,
            }),
            (_, Some(error)) => Err(Error::Backend(
                result.error_message.unwrap_or_else(|| error.to_string()),
            )),
            _ => {
                let data = result
                    .account_data
                    .ok_or_else(|| Error::Backend("Missing account_data in response".into()))?;
                Ok(AccountInfo {
                    balance: data.balance,
                    sequence: Some(data.sequence),
                    block,
                })
            }
        }
    }
}
