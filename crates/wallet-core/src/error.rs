use btc_core::BtcError;
use thiserror::Error;

#[derive(Debug, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Unrecognized address purpose: {0}")]
    UnrecognizedAddressPurpose(u32),

    #[error("Unsupported coin type: {0}")]
    UnsupportedCoin(u32),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Version prefix mismatch: expected leading byte {expected:#04x}, found {found:#04x}")]
    VersionPrefixMismatch { expected: u8, found: u8 },

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Master key unavailable for a watch-only wallet")]
    MissingMasterKey,

    #[error("Insufficient funds: need {needed} sat, have {available} sat")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Transaction too small: {amount} sat is below the {minimum} sat minimum")]
    TransactionTooSmall { amount: u64, minimum: u64 },

    #[error("Missing signing source: {0}")]
    MissingSigningSource(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Script verification failed on input {input}: {reason}")]
    ScriptVerificationFailed { input: u64, reason: String },

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Transaction request already finalized")]
    RequestConsumed,
}

impl From<BtcError> for WalletError {
    fn from(e: BtcError) -> Self {
        match e {
            BtcError::InvalidSeed(msg) => WalletError::InvalidSeed(msg),
            BtcError::DerivationFailure(msg) => WalletError::DerivationFailed(msg),
            BtcError::UnrecognizedAddressPurpose(purpose) => {
                WalletError::UnrecognizedAddressPurpose(purpose)
            }
            BtcError::UnsupportedCoin(coin) => WalletError::UnsupportedCoin(coin),
            BtcError::AddressDecodeFailure(msg) => WalletError::InvalidAddress(msg),
            BtcError::InvalidExtendedKey(msg) => WalletError::InvalidExtendedKey(msg),
            BtcError::VersionPrefixMismatch { expected, found } => {
                WalletError::VersionPrefixMismatch { expected, found }
            }
            BtcError::InvalidPrivateKey(msg) => WalletError::InvalidPrivateKey(msg),
            BtcError::MissingMasterKey => WalletError::MissingMasterKey,
            BtcError::InsufficientFunds { needed, available } => {
                WalletError::InsufficientFunds { needed, available }
            }
            BtcError::TransactionTooSmall { amount, minimum } => {
                WalletError::TransactionTooSmall { amount, minimum }
            }
            BtcError::MissingSigningSource(msg) => WalletError::MissingSigningSource(msg),
            BtcError::SigningError(msg) => WalletError::SigningFailed(msg),
            BtcError::ScriptVerificationFailure { input, reason } => {
                WalletError::ScriptVerificationFailed {
                    input: input as u64,
                    reason,
                }
            }
            BtcError::IndexOutOfBounds(msg) => WalletError::IndexOutOfBounds(msg),
        }
    }
}
