use keyconnect_device::messages::IdentityType;
use std::fmt;
use url::Url;

use crate::error::{Error, Result};

/// Caller identity derived from the request origin, never from the payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub proto: String,
    pub host: String,
    pub port: Option<u16>,
    pub index: u32,
}

impl Identity {
    pub fn from_origin(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)
            .map_err(|e| Error::validation(format!("Invalid origin \"{origin}\": {e}")))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::validation(format!("Invalid origin \"{origin}\": no host")))?;

        Ok(Self {
            proto: url.scheme().to_string(),
            host: host.to_string(),
            port: url.port(),
            index: 0,
        })
    }

    /// Key under which granted permissions are remembered
    pub fn origin_key(&self) -> String {
        let mut key = format!("{}://{}", self.proto, self.host);
        if let Some(port) = self.port {
            key.push_str(&format!(":{port}"));
        }
        key
    }

    pub fn to_wire(&self) -> IdentityType {
        IdentityType {
            proto: self.proto.clone(),
            host: self.host.clone(),
            port: self.port.map(|p| p.to_string()),
            index: self.index,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.proto != "https" {
            write!(f, "{}://", self.proto)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}
