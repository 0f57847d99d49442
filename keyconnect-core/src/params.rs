//! Declarative presence and type checks for request payloads

use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Array,
    Boolean,
    Object,
}

impl ParamType {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Array => value.is_array(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Array => "array",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamRule {
    pub name: &'static str,
    pub kind: ParamType,
    pub obligatory: bool,
}

impl ParamRule {
    pub const fn required(name: &'static str, kind: ParamType) -> Self {
        Self {
            name,
            kind,
            obligatory: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamType) -> Self {
        Self {
            name,
            kind,
            obligatory: false,
        }
    }
}

/// Check `payload` against `rules`.
///
/// A `null` optional field counts as absent.
pub fn validate_params(payload: &Value, rules: &[ParamRule]) -> Result<()> {
    for rule in rules {
        match payload.get(rule.name) {
            None | Some(Value::Null) if rule.obligatory => {
                return Err(Error::validation(format!(
                    "Parameter \"{}\" is missing",
                    rule.name
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) if !rule.kind.matches(value) => {
                return Err(Error::validation(format!(
                    "Parameter \"{}\" has invalid type. \"{}\" expected.",
                    rule.name, rule.kind
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
