//! BIP-32 derivation paths as sent to the device

use serde_json::Value;

use crate::error::{Error, Result};

pub const HD_HARDENED: u32 = 0x8000_0000;

pub fn to_hardened(index: u32) -> u32 {
    index | HD_HARDENED
}

pub fn from_hardened(index: u32) -> u32 {
    index & !HD_HARDENED
}

/// Parse a `m/44'/0'/0'` style path
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>> {
    let path = path.trim();
    let rest = path
        .strip_prefix("m/")
        .or_else(|| path.strip_prefix("M/"))
        .or_else(|| (path == "m" || path == "M").then_some(""))
        .ok_or_else(|| Error::validation(format!("Not a valid path: {path}")))?;

    let mut components = Vec::new();
    for component in rest.split('/') {
        if component.is_empty() {
            continue;
        }

        let (number, hardened) = match component
            .strip_suffix('\'')
            .or_else(|| component.strip_suffix('h'))
        {
            Some(stripped) => (stripped, true),
            None => (component, false),
        };

        let number: u32 = number
            .parse()
            .ok()
            .filter(|n| n & HD_HARDENED == 0)
            .ok_or_else(|| Error::validation(format!("Not a valid path: {path}")))?;

        components.push(if hardened { to_hardened(number) } else { number });
    }

    Ok(components)
}

/// Coerce one JSON index to u32 the way the device protocol expects:
/// integers wrap modulo 2^32, anything else is rejected.
pub fn coerce_index(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        Some(n as u32)
    } else {
        value.as_i64().map(|n| n as u32)
    }
}

/// Accept a path as a JSON array of integers or as a string
pub fn normalize_path(value: &Value) -> Result<Vec<u32>> {
    match value {
        Value::String(s) => parse_derivation_path(s),
        Value::Array(items) => items
            .iter()
            .map(coerce_index)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::validation(format!("Not a valid path: {value}"))),
        _ => Err(Error::validation(format!("Not a valid path: {value}"))),
    }
}

/// Normalize `value` and require at least `min_length` components
pub fn validate_path(value: &Value, min_length: usize) -> Result<Vec<u32>> {
    let path = normalize_path(value)?;
    if path.len() < min_length {
        return Err(Error::validation(format!("Not a valid path: {value}")));
    }
    Ok(path)
}

/// Render a path as `m/44'/0'/0'`; hardened indices get a trailing `'`
pub fn serialize_path(path: &[u32]) -> String {
    let mut serialized = String::from("m");
    for &index in path {
        serialized.push('/');
        serialized.push_str(&from_hardened(index).to_string());
        if index & HD_HARDENED != 0 {
            serialized.push('\'');
        }
    }
    serialized
}

/// Human label shown when asking to export the key at `path`
pub fn path_label(path: &[u32]) -> String {
    match path {
        [purpose, _, account, ..] if *purpose == to_hardened(44) => {
            format!("Account #{}", from_hardened(*account) + 1)
        }
        [purpose, ..] if *purpose == to_hardened(45) => "Multisig wallet".to_string(),
        _ => serialize_path(path),
    }
}

/// SLIP-44 coin type encoded in an account path
pub fn coin_type(path: &[u32]) -> Option<u32> {
    path.get(1).map(|&index| from_hardened(index))
}
