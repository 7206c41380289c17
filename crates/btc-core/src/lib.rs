//! Bitcoin transaction construction for an HD wallet.
//!
//! Derives BIP32 keys and BIP49/BIP84 addresses from a seed, selects coins
//! under rate-based, flat-fee and send-max strategies, then signs and
//! serializes P2PKH, P2SH-P2WPKH and P2WPKH spends.

pub mod address;
pub mod context;
pub mod error;
pub mod fee;
pub mod imported;
pub mod keys;
pub mod path;
pub mod request;
pub mod selection;
pub mod transaction;
pub mod utxo;
pub mod verify;

pub use address::{
    candidate_addresses, hrp_from_address, is_base58check_address, is_segwit_address,
    meta_address, CandidateAddresses, MetaAddress, OutputKind, PLACEHOLDER_DESTINATION,
};
pub use context::{AccountContext, ExtendedKeyVersion};
pub use error::BtcError;
pub use imported::ImportedPrivateKey;
pub use keys::{reprefix_extended_key, verify_message_signature, DerivedKey, KeyChain};
pub use path::DerivationPath;
pub use request::{FinalizedTransaction, RbfOption, TransactionRequest};
pub use selection::{CoinSelector, Selection, SelectionPolicy};
pub use transaction::{ChangeMetadata, TransactionBuilder, TransactionResult};
pub use utxo::{SigningSource, Utxo};
