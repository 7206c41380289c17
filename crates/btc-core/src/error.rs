use thiserror::Error;

/// Errors produced while deriving keys, selecting coins, or building transactions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BtcError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("derivation failure: {0}")]
    DerivationFailure(String),

    #[error("unrecognized address purpose: {0}")]
    UnrecognizedAddressPurpose(u32),

    #[error("unsupported coin type: {0}")]
    UnsupportedCoin(u32),

    #[error("address decode failure: {0}")]
    AddressDecodeFailure(String),

    #[error("invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("version prefix mismatch: expected leading byte {expected:#04x}, found {found:#04x}")]
    VersionPrefixMismatch { expected: u8, found: u8 },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("master key unavailable for a watch-only key chain")]
    MissingMasterKey,

    #[error("insufficient funds: need {needed} sat, have {available} sat")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("transaction too small: {amount} sat is below the {minimum} sat minimum")]
    TransactionTooSmall { amount: u64, minimum: u64 },

    #[error("missing signing source: {0}")]
    MissingSigningSource(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("script verification failure on input {input}: {reason}")]
    ScriptVerificationFailure { input: usize, reason: String },

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),
}
