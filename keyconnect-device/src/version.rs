//! Firmware version triple and its ordering

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identity signing v2 and the `PublicKey.xpub` field
pub const MIN_FIRMWARE: FirmwareVersion = FirmwareVersion::new(1, 3, 4);

/// Transaction signing over `TxRequest`/`TxAck`
pub const SIGN_TX_FIRMWARE: FirmwareVersion = FirmwareVersion::new(1, 6, 0);

/// Semantic version triple reported by the device.
///
/// A component that is missing or not numeric is kept as `None` and orders
/// below any present component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion([Option<u32>; 3]);

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self([Some(major), Some(minor), Some(patch)])
    }

    pub fn from_parts(major: Option<u32>, minor: Option<u32>, patch: Option<u32>) -> Self {
        Self([major, minor, patch])
    }

    pub fn at_least(&self, required: &FirmwareVersion) -> bool {
        self >= required
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ordering = match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for FirmwareVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.').map(|p| p.parse::<u32>().ok());
        Ok(Self([
            parts.next().flatten(),
            parts.next().flatten(),
            parts.next().flatten(),
        ]))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|c| c.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()))
            .collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> FirmwareVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(v("1.3.4").cmp(&v("1.3.4")), Ordering::Equal);
        assert!(v("1.3.4").at_least(&MIN_FIRMWARE));
    }

    #[test]
    fn test_numeric_component_compare() {
        assert_eq!(v("1.2.9").cmp(&v("1.3.0")), Ordering::Less);
        assert_eq!(v("1.10.0").cmp(&v("1.9.9")), Ordering::Greater);
        assert!(!v("1.5.2").at_least(&SIGN_TX_FIRMWARE));
        assert!(v("2.0.0").at_least(&SIGN_TX_FIRMWARE));
    }

    #[test]
    fn test_missing_component_is_lower() {
        assert_eq!(v("1.3").cmp(&v("1.3.0")), Ordering::Less);
        assert_eq!(v("1.3.x").cmp(&v("1.3.0")), Ordering::Less);
        assert_eq!(v("1.3.0").cmp(&v("1.3")), Ordering::Greater);
        assert_eq!(v("1.3").cmp(&v("1.3")), Ordering::Equal);
    }

    #[test]
    fn test_display() {
        assert_eq!(FirmwareVersion::new(1, 6, 0).to_string(), "1.6.0");
        assert_eq!(v("2.1").to_string(), "2.1.?");
    }
}
