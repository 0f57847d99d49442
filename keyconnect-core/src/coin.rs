//! Static coin and network registry

use bitcoin::Network;
use keyconnect_device::FirmwareVersion;

/// Which backend implementation serves a coin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Insight,
    Rippled,
}

/// Bitcoin-like coin signed through `SignTx`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinInfo {
    /// Name the device knows the coin by
    pub name: &'static str,
    pub shortcut: &'static str,
    pub network: Network,
    /// SLIP-44 coin type, the second index of an account path
    pub slip44: u32,
    /// Outputs must sum to more than this many satoshis
    pub dust_limit: u64,
    pub min_firmware: Option<FirmwareVersion>,
    pub backend: BackendKind,
    pub backend_url: &'static str,
}

/// Non-bitcoin network served by dedicated methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiscNetwork {
    pub name: &'static str,
    pub shortcut: &'static str,
    pub slip44: u32,
    pub min_firmware: Option<FirmwareVersion>,
    pub backend: BackendKind,
    pub backend_url: &'static str,
}

pub static COINS: &[CoinInfo] = &[
    CoinInfo {
        name: "Bitcoin",
        shortcut: "BTC",
        network: Network::Bitcoin,
        slip44: 0,
        dust_limit: 546,
        min_firmware: None,
        backend: BackendKind::Insight,
        backend_url: "https://insight.bitpay.com",
    },
    CoinInfo {
        name: "Testnet",
        shortcut: "TEST",
        network: Network::Testnet,
        slip44: 1,
        dust_limit: 546,
        min_firmware: None,
        backend: BackendKind::Insight,
        backend_url: "https://test-insight.bitpay.com",
    },
];

pub static MISC_NETWORKS: &[MiscNetwork] = &[MiscNetwork {
    name: "Ripple",
    shortcut: "xrp",
    slip44: 144,
    min_firmware: Some(FirmwareVersion::new(2, 0, 8)),
    backend: BackendKind::Rippled,
    backend_url: "https://s1.ripple.com:51234",
}];

/// Find a coin by name or shortcut, ignoring case
pub fn coin_by_currency(currency: &str) -> Option<&'static CoinInfo> {
    COINS.iter().find(|coin| {
        coin.name.eq_ignore_ascii_case(currency) || coin.shortcut.eq_ignore_ascii_case(currency)
    })
}

pub fn misc_network(shortcut: &str) -> Option<&'static MiscNetwork> {
    MISC_NETWORKS
        .iter()
        .find(|network| network.shortcut.eq_ignore_ascii_case(shortcut))
}

/// The stricter of a method's own requirement and a coin's minimum
pub fn required_firmware(
    method: FirmwareVersion,
    coin: Option<FirmwareVersion>,
) -> FirmwareVersion {
    coin.map_or(method, |coin| method.max(coin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_or_shortcut() {
        assert_eq!(coin_by_currency("btc").map(|c| c.name), Some("Bitcoin"));
        assert_eq!(coin_by_currency("Testnet").map(|c| c.slip44), Some(1));
        assert!(coin_by_currency("doge").is_none());
        assert_eq!(misc_network("XRP").map(|n| n.slip44), Some(144));
    }

    #[test]
    fn test_required_firmware_takes_maximum() {
        let method = FirmwareVersion::new(1, 6, 0);
        assert_eq!(required_firmware(method, None), method);
        assert_eq!(
            required_firmware(method, Some(FirmwareVersion::new(2, 0, 8))),
            FirmwareVersion::new(2, 0, 8)
        );
        assert_eq!(
            required_firmware(method, Some(FirmwareVersion::new(1, 5, 0))),
            method
        );
    }
}
