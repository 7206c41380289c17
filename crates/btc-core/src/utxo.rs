use crate::imported::ImportedPrivateKey;
use crate::path::DerivationPath;

/// Where the key that unlocks a UTXO comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningSource {
    /// Key derived from the wallet seed at this path.
    Derived(DerivationPath),
    /// Imported WIF key with a selected funding address.
    Imported(ImportedPrivateKey),
}

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount: u64,
    pub source: SigningSource,
    pub is_confirmed: bool,
}

impl Utxo {
    pub fn derived(
        txid: impl Into<String>,
        vout: u32,
        amount: u64,
        path: DerivationPath,
        is_confirmed: bool,
    ) -> Self {
        Self {
            txid: txid.into(),
            vout,
            amount,
            source: SigningSource::Derived(path),
            is_confirmed,
        }
    }

    pub fn imported(
        txid: impl Into<String>,
        vout: u32,
        amount: u64,
        key: ImportedPrivateKey,
        is_confirmed: bool,
    ) -> Self {
        Self {
            txid: txid.into(),
            vout,
            amount,
            source: SigningSource::Imported(key),
            is_confirmed,
        }
    }

    pub fn path(&self) -> Option<&DerivationPath> {
        match &self.source {
            SigningSource::Derived(path) => Some(path),
            SigningSource::Imported(_) => None,
        }
    }
}
