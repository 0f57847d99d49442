//! Supported request methods.
//!
//! Each method is parsed and validated from its payload up front, declares a
//! static [`Contract`], and exposes one asynchronous `run`.

mod account_info;
mod login;
mod sign_tx;
mod xpubkey;

pub use account_info::{RippleAccount, RippleGetAccountInfo};
pub use login::Login;
pub use sign_tx::SignTransaction;
pub use xpubkey::XpubKey;

use keyconnect_device::{Device, FirmwareVersion, InteractionBroker};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::backend::BackendFactory;
use crate::bundle::ProgressSender;
use crate::error::{Error, Result};
use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("read"),
            Permission::Write => f.write_str("write"),
        }
    }
}

/// What a method needs before it may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub permissions: &'static [Permission],
    pub required_firmware: FirmwareVersion,
    pub use_device: bool,
    pub use_ui: bool,
    pub info: &'static str,
}

/// Everything a running method may touch
pub struct MethodContext<'a> {
    pub device: Option<&'a mut Device>,
    pub broker: &'a InteractionBroker,
    pub backends: &'a dyn BackendFactory,
    pub identity: &'a Identity,
    pub progress: Option<&'a ProgressSender>,
}

impl MethodContext<'_> {
    pub fn device(&mut self) -> Result<&mut Device> {
        self.device
            .as_deref_mut()
            .ok_or(Error::Device(keyconnect_device::Error::NoConnectedDevice))
    }
}

#[derive(Debug)]
pub enum Method {
    Login(Login),
    XpubKey(XpubKey),
    SignTx(SignTransaction),
    RippleGetAccountInfo(RippleGetAccountInfo),
}

type Parser = fn(&Value) -> Result<Method>;

fn parse_login(payload: &Value) -> Result<Method> {
    Login::parse(payload).map(Method::Login)
}

fn parse_xpubkey(payload: &Value) -> Result<Method> {
    XpubKey::parse(payload).map(Method::XpubKey)
}

fn parse_signtx(payload: &Value) -> Result<Method> {
    SignTransaction::parse(payload).map(Method::SignTx)
}

fn parse_ripple_account_info(payload: &Value) -> Result<Method> {
    RippleGetAccountInfo::parse(payload).map(Method::RippleGetAccountInfo)
}

/// Request `type` to parser
const REGISTRY: &[(&str, Parser)] = &[
    ("login", parse_login),
    ("xpubkey", parse_xpubkey),
    ("signtx", parse_signtx),
    ("rippleGetAccountInfo", parse_ripple_account_info),
];

impl Method {
    /// Look up the payload's `type` and validate the payload for it
    pub fn parse(payload: &Value) -> Result<Self> {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or(Error::MethodNotFound)?;
        let (_, parse) = REGISTRY
            .iter()
            .find(|(name, _)| *name == kind)
            .ok_or(Error::MethodNotFound)?;
        parse(payload)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Login(_) => "login",
            Method::XpubKey(_) => "xpubkey",
            Method::SignTx(_) => "signtx",
            Method::RippleGetAccountInfo(_) => "rippleGetAccountInfo",
        }
    }

    pub fn contract(&self) -> Contract {
        match self {
            Method::Login(m) => m.contract(),
            Method::XpubKey(m) => m.contract(),
            Method::SignTx(m) => m.contract(),
            Method::RippleGetAccountInfo(m) => m.contract(),
        }
    }

    pub async fn run(&self, ctx: &mut MethodContext<'_>) -> Result<Value> {
        match self {
            Method::Login(m) => m.run(ctx).await,
            Method::XpubKey(m) => m.run(ctx).await,
            Method::SignTx(m) => m.run(ctx).await,
            Method::RippleGetAccountInfo(m) => m.run(ctx).await,
        }
    }
}
