use btc_core::{DerivationPath, MetaAddress, RbfOption, TransactionResult};

/// Derivation path passed across FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct PathData {
    pub purpose: u32,
    pub coin: u32,
    pub account: u32,
    pub change: u32,
    pub index: u32,
}

impl From<PathData> for DerivationPath {
    fn from(p: PathData) -> Self {
        DerivationPath::new(p.purpose, p.coin, p.account, p.change, p.index)
    }
}

impl From<DerivationPath> for PathData {
    fn from(p: DerivationPath) -> Self {
        Self {
            purpose: p.purpose,
            coin: p.coin,
            account: p.account,
            change: p.change,
            index: p.index,
        }
    }
}

/// Derived wallet address. `uncompressed_public_key` is empty for change addresses.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AddressData {
    pub address: String,
    pub path: PathData,
    pub uncompressed_public_key: String,
}

impl From<MetaAddress> for AddressData {
    fn from(m: MetaAddress) -> Self {
        Self {
            address: m.address,
            path: m.path.into(),
            uncompressed_public_key: m.uncompressed_public_key.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum RbfPolicy {
    MustBeRbf,
    MustNotBeRbf,
    AllowedToBeRbf,
}

impl From<RbfPolicy> for RbfOption {
    fn from(p: RbfPolicy) -> Self {
        match p {
            RbfPolicy::MustBeRbf => RbfOption::MustBeRbf,
            RbfPolicy::MustNotBeRbf => RbfOption::MustNotBeRbf,
            RbfPolicy::AllowedToBeRbf => RbfOption::AllowedToBeRbf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ChangeData {
    pub address: String,
    pub path: PathData,
    pub vout_index: u32,
}

/// Signed transaction returned to the host app
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct TransactionData {
    pub txid: String,
    pub encoded_tx: String,
    pub change: Option<ChangeData>,
}

impl From<TransactionResult> for TransactionData {
    fn from(r: TransactionResult) -> Self {
        Self {
            txid: r.txid,
            encoded_tx: r.encoded_tx,
            change: r.change.map(|c| ChangeData {
                address: c.address,
                path: c.path.into(),
                vout_index: c.vout_index,
            }),
        }
    }
}

/// Candidate encodings of an imported key
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ImportedKeyData {
    pub legacy: String,
    pub p2sh_segwit: String,
    pub native_segwit: String,
    pub possible_addresses: String,
}
