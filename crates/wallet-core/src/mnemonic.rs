use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Validate a mnemonic phrase
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive the 64-byte BIP-39 seed from a mnemonic and optional passphrase.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase).to_vec()))
}

/// Validate a single word against the BIP-39 word list
pub fn is_valid_word(word: &str) -> bool {
    Language::English.find_word(word).is_some()
}

/// Zeroizable mnemonic wrapper
pub struct ZeroizingMnemonic {
    phrase: String,
}

impl ZeroizingMnemonic {
    pub fn new(phrase: String) -> Result<Self, WalletError> {
        if !validate_mnemonic(&phrase) {
            return Err(WalletError::InvalidMnemonic("Invalid mnemonic phrase".into()));
        }
        Ok(Self { phrase })
    }

    pub fn to_seed(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        mnemonic_to_seed(&self.phrase, passphrase)
    }

    pub fn words(&self) -> Vec<&str> {
        self.phrase.split_whitespace().collect()
    }
}

impl Drop for ZeroizingMnemonic {
    fn drop(&mut self) {
        self.phrase.zeroize();
    }
}
