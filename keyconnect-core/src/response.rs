//! Inbound requests and outbound messages

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Message type of the out-of-band bundle progress notification
pub const BUNDLE_PROGRESS: &str = "ui-bundle-progress";

/// A caller request: the origin it came from and its tagged payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Echoed on the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub origin: String,
    #[serde(rename = "request")]
    pub payload: Value,
}

/// Final answer to one request.
///
/// Object payloads are flattened next to `success`; any other payload is
/// placed under `payload`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Response {
    pub fn success(payload: Value) -> Self {
        let body = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        Self {
            id: None,
            success: true,
            body,
        }
    }

    pub fn failure(error: &Error) -> Self {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(error.to_string()));
        body.insert("code".to_string(), Value::String(error.kind().to_string()));
        Self {
            id: None,
            success: false,
            body,
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

/// Per-item notification for bundled requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleProgress {
    pub progress: usize,
    pub response: Value,
}
