use keyconnect_device::{MIN_FIRMWARE, PassphraseMode};
use serde_json::{Value, json};
use tracing::info;

use super::{Contract, MethodContext};
use crate::error::Result;
use crate::params::{ParamRule, ParamType, validate_params};

const RULES: &[ParamRule] = &[
    ParamRule::required("challenge_hidden", ParamType::String),
    ParamRule::required("challenge_visual", ParamType::String),
    ParamRule::optional("icon", ParamType::String),
];

/// Sign a login challenge for the caller's identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub challenge_hidden: String,
    pub challenge_visual: String,
    pub icon: Option<String>,
}

impl Login {
    pub fn parse(payload: &Value) -> Result<Self> {
        validate_params(payload, RULES)?;
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            challenge_hidden: field("challenge_hidden").unwrap_or_default(),
            challenge_visual: field("challenge_visual").unwrap_or_default(),
            icon: field("icon"),
        })
    }

    pub fn contract(&self) -> Contract {
        Contract {
            permissions: &[],
            required_firmware: MIN_FIRMWARE,
            use_device: true,
            use_ui: true,
            info: "Login",
        }
    }

    pub async fn run(&self, ctx: &mut MethodContext<'_>) -> Result<Value> {
        let identity = ctx.identity;
        let broker = ctx.broker;
        info!("Signing login challenge for {identity}");

        let signed = ctx
            .device()?
            .commands(broker, PassphraseMode::Empty)
            .sign_identity(
                identity.to_wire(),
                &self.challenge_hidden,
                &self.challenge_visual,
            )
            .await?;

        Ok(json!({
            "address": signed.address,
            "public_key": signed.public_key.to_lowercase(),
            "signature": signed.signature.to_lowercase(),
            "version": 2,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_login() -> Result<()> {
        let login = Login::parse(&json!({
            "type": "login",
            "challenge_hidden": "cd8552569d6e4509266ef137584d1e62c7579b5b8ed69bbafa4b864c6521e7c2",
            "challenge_visual": "2015-03-23 17:39:22"
        }))?;
        assert_eq!(login.challenge_visual, "2015-03-23 17:39:22");
        assert_eq!(login.icon, None);
        Ok(())
    }

    #[test]
    fn test_missing_challenge() {
        let error = Login::parse(&json!({"type": "login", "challenge_hidden": "00"})).unwrap_err();
        assert_eq!(error.to_string(), "Parameter \"challenge_visual\" is missing");
    }
}
