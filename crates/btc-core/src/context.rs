use bitcoin::{KnownHrp, Network, NetworkKind};

use crate::error::BtcError;
use crate::path::DerivationPath;

/// BIP-44 legacy account hierarchy.
pub const BIP44: u32 = 44;
/// BIP-49 P2SH-wrapped segwit account hierarchy.
pub const BIP49: u32 = 49;
/// BIP-84 native segwit account hierarchy.
pub const BIP84: u32 = 84;

/// SLIP-44 coin type for Bitcoin mainnet.
pub const MAINNET_COIN: u32 = 0;
/// SLIP-44 coin type shared by testnet and regtest.
pub const TESTNET_COIN: u32 = 1;

const HARDENED_LIMIT: u32 = 1 << 31;

/// Four-byte BIP32 serialization prefixes for one (purpose, coin) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedKeyVersion {
    pub private: [u8; 4],
    pub public: [u8; 4],
}

impl ExtendedKeyVersion {
    const XPUB: Self = Self::new([0x04, 0x88, 0xad, 0xe4], [0x04, 0x88, 0xb2, 0x1e]);
    const YPUB: Self = Self::new([0x04, 0x9d, 0x78, 0x78], [0x04, 0x9d, 0x7c, 0xb2]);
    const ZPUB: Self = Self::new([0x04, 0xb2, 0x43, 0x0c], [0x04, 0xb2, 0x47, 0x46]);
    const TPUB: Self = Self::new([0x04, 0x35, 0x83, 0x94], [0x04, 0x35, 0x87, 0xcf]);
    const UPUB: Self = Self::new([0x04, 0x4a, 0x4e, 0x28], [0x04, 0x4a, 0x52, 0x62]);
    const VPUB: Self = Self::new([0x04, 0x5f, 0x18, 0xbc], [0x04, 0x5f, 0x1c, 0xf6]);

    const fn new(private: [u8; 4], public: [u8; 4]) -> Self {
        Self { private, public }
    }

    /// Look up the version pair for a (purpose, coin) combination.
    pub fn for_account(purpose: u32, coin: u32) -> Option<Self> {
        match (purpose, coin) {
            (BIP44, MAINNET_COIN) => Some(Self::XPUB),
            (BIP49, MAINNET_COIN) => Some(Self::YPUB),
            (BIP84, MAINNET_COIN) => Some(Self::ZPUB),
            (BIP44, TESTNET_COIN) => Some(Self::TPUB),
            (BIP49, TESTNET_COIN) => Some(Self::UPUB),
            (BIP84, TESTNET_COIN) => Some(Self::VPUB),
            _ => None,
        }
    }

    /// Reverse lookup from a public version prefix to (purpose, coin).
    pub fn account_for_public(version: [u8; 4]) -> Option<(u32, u32)> {
        [
            (BIP44, MAINNET_COIN),
            (BIP49, MAINNET_COIN),
            (BIP84, MAINNET_COIN),
            (BIP44, TESTNET_COIN),
            (BIP49, TESTNET_COIN),
            (BIP84, TESTNET_COIN),
        ]
        .into_iter()
        .find(|&(purpose, coin)| {
            Self::for_account(purpose, coin).is_some_and(|v| v.public == version)
        })
    }
}

/// Purpose, coin and account of one BIP32 account hierarchy.
///
/// A context never changes after construction; use the `with_*` helpers to
/// obtain a new one. A single seed can back many contexts at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountContext {
    purpose: u32,
    coin: u32,
    account: u32,
}

impl AccountContext {
    /// Validate and build a context.
    pub fn new(purpose: u32, coin: u32, account: u32) -> Result<Self, BtcError> {
        if !matches!(purpose, BIP44 | BIP49 | BIP84) {
            return Err(BtcError::UnrecognizedAddressPurpose(purpose));
        }
        if !matches!(coin, MAINNET_COIN | TESTNET_COIN) {
            return Err(BtcError::UnsupportedCoin(coin));
        }
        if account >= HARDENED_LIMIT {
            return Err(BtcError::DerivationFailure(format!(
                "account {account} exceeds the hardened index range"
            )));
        }
        Ok(Self {
            purpose,
            coin,
            account,
        })
    }

    pub fn purpose(&self) -> u32 {
        self.purpose
    }

    pub fn coin(&self) -> u32 {
        self.coin
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    pub fn with_purpose(&self, purpose: u32) -> Result<Self, BtcError> {
        Self::new(purpose, self.coin, self.account)
    }

    pub fn with_coin(&self, coin: u32) -> Result<Self, BtcError> {
        Self::new(self.purpose, coin, self.account)
    }

    pub fn with_account(&self, account: u32) -> Result<Self, BtcError> {
        Self::new(self.purpose, self.coin, account)
    }

    /// Network parameters for this context. Coin 1 targets regtest.
    pub fn network(&self) -> Network {
        match self.coin {
            MAINNET_COIN => Network::Bitcoin,
            _ => Network::Regtest,
        }
    }

    pub fn network_kind(&self) -> NetworkKind {
        NetworkKind::from(self.network())
    }

    pub fn bech32_hrp(&self) -> KnownHrp {
        KnownHrp::from(self.network())
    }

    /// Human-readable part used for segwit addresses ("bc" or "bcrt").
    pub fn hrp_str(&self) -> &'static str {
        match self.coin {
            MAINNET_COIN => "bc",
            _ => "bcrt",
        }
    }

    pub fn is_testnet(&self) -> bool {
        self.coin == TESTNET_COIN
    }

    pub fn extended_key_version(&self) -> ExtendedKeyVersion {
        // new() only admits pairs present in the table
        ExtendedKeyVersion::for_account(self.purpose, self.coin).unwrap_or(ExtendedKeyVersion::XPUB)
    }

    /// Receive path (`change = 0`) at `index` within this account.
    pub fn receive_path(&self, index: u32) -> DerivationPath {
        DerivationPath::new(self.purpose, self.coin, self.account, 0, index)
    }

    /// Change path (`change = 1`) at `index` within this account.
    pub fn change_path(&self, index: u32) -> DerivationPath {
        DerivationPath::new(self.purpose, self.coin, self.account, 1, index)
    }

    /// Whether `path` lives under this account's purpose/coin/account.
    pub fn contains(&self, path: &DerivationPath) -> bool {
        path.purpose == self.purpose && path.coin == self.coin && path.account == self.account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_context_uses_bitcoin_network() {
        let ctx = AccountContext::new(BIP84, MAINNET_COIN, 0).unwrap();
        assert_eq!(ctx.network(), Network::Bitcoin);
        assert_eq!(ctx.network_kind(), NetworkKind::Main);
        assert_eq!(ctx.hrp_str(), "bc");
        assert!(!ctx.is_testnet());
    }

    #[test]
    fn testnet_coin_maps_to_regtest() {
        let ctx = AccountContext::new(BIP84, TESTNET_COIN, 0).unwrap();
        assert_eq!(ctx.network(), Network::Regtest);
        assert_eq!(ctx.network_kind(), NetworkKind::Test);
        assert_eq!(ctx.hrp_str(), "bcrt");
        assert_eq!(ctx.bech32_hrp(), KnownHrp::Regtest);
    }

    #[test]
    fn rejects_unknown_purpose() {
        assert_eq!(
            AccountContext::new(86, 0, 0),
            Err(BtcError::UnrecognizedAddressPurpose(86))
        );
    }

    #[test]
    fn rejects_unknown_coin() {
        assert_eq!(
            AccountContext::new(BIP84, 60, 0),
            Err(BtcError::UnsupportedCoin(60))
        );
    }

    #[test]
    fn rejects_hardened_account() {
        assert!(matches!(
            AccountContext::new(BIP84, 0, 1 << 31),
            Err(BtcError::DerivationFailure(_))
        ));
    }

    #[test]
    fn with_helpers_return_new_contexts() {
        let ctx = AccountContext::new(BIP49, 0, 0).unwrap();
        let other = ctx.with_purpose(BIP84).unwrap();
        assert_eq!(ctx.purpose(), BIP49);
        assert_eq!(other.purpose(), BIP84);
        assert_eq!(ctx.with_account(3).unwrap().account(), 3);
        assert_eq!(ctx.with_coin(1).unwrap().network(), Network::Regtest);
        assert!(ctx.with_coin(2).is_err());
    }

    #[test]
    fn version_table_matches_slip132() {
        let zpub = AccountContext::new(BIP84, 0, 0).unwrap().extended_key_version();
        assert_eq!(hex::encode(zpub.public), "04b24746");
        assert_eq!(hex::encode(zpub.private), "04b2430c");

        let upub = AccountContext::new(BIP49, 1, 0).unwrap().extended_key_version();
        assert_eq!(hex::encode(upub.public), "044a5262");

        let tpub = AccountContext::new(BIP44, 1, 0).unwrap().extended_key_version();
        assert_eq!(hex::encode(tpub.public), "043587cf");
    }

    #[test]
    fn reverse_version_lookup() {
        assert_eq!(
            ExtendedKeyVersion::account_for_public([0x04, 0x9d, 0x7c, 0xb2]),
            Some((BIP49, MAINNET_COIN))
        );
        assert_eq!(
            ExtendedKeyVersion::account_for_public([0x04, 0x5f, 0x1c, 0xf6]),
            Some((BIP84, TESTNET_COIN))
        );
        assert_eq!(ExtendedKeyVersion::account_for_public([0, 0, 0, 0]), None);
    }

    #[test]
    fn receive_and_change_paths() {
        let ctx = AccountContext::new(BIP84, 0, 2).unwrap();
        let receive = ctx.receive_path(7);
        assert_eq!(receive, DerivationPath::new(84, 0, 2, 0, 7));
        assert!(ctx.contains(&receive));
        assert_eq!(ctx.change_path(1).change, 1);
        assert!(!ctx.contains(&DerivationPath::new(49, 0, 2, 0, 7)));
    }
}
