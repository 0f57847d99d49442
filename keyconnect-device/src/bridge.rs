//! HTTP device bridge transport (async implementation)

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::messages::Message;
use crate::transport::{DeviceDescriptor, Session, Transport};

pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:21324";

#[derive(Debug, Deserialize)]
struct BridgeInfo {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Acquired {
    session: String,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    error: String,
}

#[derive(Clone)]
struct BridgeClient {
    url: String,
    client: reqwest::Client,
}

impl BridgeClient {
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> Result<T> {
        let url = format!("{}{path}", self.url);
        debug!("POST {url}");
        let response = request(self.client.post(&url)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<BridgeError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(Error::InvalidResponse(format!(
                "bridge returned {status} for {path}: {message}"
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Transport talking to a local device bridge over HTTP
pub struct BridgeTransport {
    client: BridgeClient,
}

impl BridgeTransport {
    /// Probe the bridge at `url`; an unreachable bridge is `TransportMissing`
    pub async fn load(url: &str) -> Result<Self> {
        let client = BridgeClient {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        };

        match client.post::<BridgeInfo>("/", |r| r).await {
            Ok(bridge) => {
                info!(
                    "Using device bridge {} at {}",
                    bridge.version.as_deref().unwrap_or("(unknown version)"),
                    client.url
                );
                Ok(Self { client })
            }
            Err(e) => {
                warn!("Device bridge at {} is not usable: {e}", client.url);
                Err(Error::TransportMissing)
            }
        }
    }

    /// Load the bridge and apply the configuration found at `config`.
    ///
    /// Any failure along the way means there is no usable transport.
    pub async fn connect(url: &str, config: Option<&str>) -> Result<Self> {
        let transport = Self::load(url).await?;
        if let Some(location) = config {
            let blob = fetch_config(location).await.map_err(|e| {
                warn!("Failed to fetch transport configuration from {location}: {e}");
                Error::TransportMissing
            })?;
            transport.configure(&blob).await.map_err(|e| {
                warn!("Bridge rejected configuration: {e}");
                Error::TransportMissing
            })?;
        }
        Ok(transport)
    }
}

#[async_trait(?Send)]
impl Transport for BridgeTransport {
    async fn configure(&self, config: &[u8]) -> Result<()> {
        let body = hex::encode(config);
        self.client
            .post::<serde_json::Value>("/configure", |r| r.body(body))
            .await?;
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let devices: Vec<DeviceDescriptor> = self.client.post("/enumerate", |r| r).await?;
        debug!("Bridge enumerated {} device(s)", devices.len());
        Ok(devices)
    }

    async fn acquire(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn Session>> {
        let previous = descriptor.session.as_deref().unwrap_or("null");
        let path = format!("/acquire/{}/{previous}", descriptor.path);
        let acquired: Acquired = self.client.post(&path, |r| r).await?;
        debug!("Acquired {} as session {}", descriptor.path, acquired.session);

        Ok(Box::new(BridgeSession {
            client: self.client.clone(),
            session: acquired.session,
        }))
    }
}

struct BridgeSession {
    client: BridgeClient,
    session: String,
}

#[async_trait(?Send)]
impl Session for BridgeSession {
    async fn call(&mut self, message: Message) -> Result<Message> {
        debug!("Session {} -> {}", self.session, message.kind);
        let path = format!("/call/{}", self.session);
        let response: Message = self.client.post(&path, |r| r.json(&message)).await?;
        debug!("Session {} <- {}", self.session, response.kind);
        Ok(response)
    }

    async fn release(&mut self) -> Result<()> {
        let path = format!("/release/{}", self.session);
        self.client.post::<serde_json::Value>(&path, |r| r).await?;
        Ok(())
    }
}

/// Read a configuration blob from an http(s) URL or a local file
pub async fn fetch_config(location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(location).await?)
    }
}
