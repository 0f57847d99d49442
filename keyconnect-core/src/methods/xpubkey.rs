use keyconnect_device::{MIN_FIRMWARE, PassphraseMode};
use serde_json::{Value, json};
use tracing::info;

use super::{Contract, MethodContext, Permission};
use crate::error::{Error, Result};
use crate::path::{path_label, serialize_path, validate_path};

/// Export the extended public key at a derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpubKey {
    pub path: Vec<u32>,
}

impl XpubKey {
    pub fn parse(payload: &Value) -> Result<Self> {
        let path = payload
            .get("path")
            .filter(|p| !p.is_null())
            .ok_or_else(|| Error::validation("Parameter \"path\" is missing"))?;
        Ok(Self {
            path: validate_path(path, 1)?,
        })
    }

    pub fn contract(&self) -> Contract {
        Contract {
            permissions: &[Permission::Read],
            required_firmware: MIN_FIRMWARE,
            use_device: true,
            use_ui: true,
            info: "Export public key",
        }
    }

    pub async fn run(&self, ctx: &mut MethodContext<'_>) -> Result<Value> {
        let broker = ctx.broker;
        let label = path_label(&self.path);

        if !broker.request_confirmation(label.as_str()).await? {
            info!("Export of {label} declined");
            return Err(keyconnect_device::Error::Cancelled.into());
        }

        let key = ctx
            .device()?
            .commands(broker, PassphraseMode::Prompt)
            .get_public_key(&self.path)
            .await?;

        Ok(json!({
            "xpubkey": key.xpub,
            "path": serialize_path(&self.path),
        }))
    }
}
