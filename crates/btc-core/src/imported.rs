use std::fmt;

use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{CompressedPublicKey, PrivateKey};

use crate::address::{candidate_addresses, CandidateAddresses};
use crate::context::AccountContext;
use crate::error::BtcError;

/// A single WIF private key brought in from outside the HD tree.
///
/// The funding address is not recorded in a WIF string, so the key carries
/// all three encodings of its HASH160 and the caller picks the one that
/// actually holds the coins.
#[derive(Clone)]
pub struct ImportedPrivateKey {
    key: PrivateKey,
    public: CompressedPublicKey,
    context: AccountContext,
    candidates: CandidateAddresses,
    selected_address: Option<String>,
}

impl ImportedPrivateKey {
    /// Decode a compressed WIF key for use under `context`'s network.
    pub fn from_wif(wif: &str, context: &AccountContext) -> Result<Self, BtcError> {
        let key = PrivateKey::from_wif(wif.trim())
            .map_err(|e| BtcError::InvalidPrivateKey(format!("wif decode: {e}")))?;
        if !key.compressed {
            return Err(BtcError::InvalidPrivateKey(
                "uncompressed keys are not supported".into(),
            ));
        }
        if key.network != context.network_kind() {
            return Err(BtcError::InvalidPrivateKey(format!(
                "key is for {:?}, context expects {:?}",
                key.network,
                context.network_kind()
            )));
        }
        let secp = Secp256k1::signing_only();
        let public = CompressedPublicKey::from_private_key(&secp, &key)
            .map_err(|e| BtcError::InvalidPrivateKey(e.to_string()))?;
        let candidates = candidate_addresses(&public, context);
        Ok(Self {
            key,
            public,
            context: *context,
            candidates,
            selected_address: None,
        })
    }

    pub fn candidates(&self) -> &CandidateAddresses {
        &self.candidates
    }

    /// Candidate addresses joined by single spaces: legacy, P2SH-segwit, native segwit.
    pub fn possible_addresses(&self) -> String {
        self.candidates.iter().collect::<Vec<_>>().join(" ")
    }

    /// Record which candidate address holds the funds being spent.
    pub fn select_address(&mut self, address: &str) -> Result<(), BtcError> {
        if !self.candidates.contains(address) {
            return Err(BtcError::AddressDecodeFailure(format!(
                "{address} is not derived from the imported key"
            )));
        }
        self.selected_address = Some(address.to_string());
        Ok(())
    }

    pub fn with_selected_address(mut self, address: &str) -> Result<Self, BtcError> {
        self.select_address(address)?;
        Ok(self)
    }

    pub fn selected_address(&self) -> Option<&str> {
        self.selected_address.as_deref()
    }

    pub fn context(&self) -> &AccountContext {
        &self.context
    }

    pub fn public_key(&self) -> CompressedPublicKey {
        self.public
    }

    pub fn private_key_as_wif(&self) -> String {
        self.key.to_wif()
    }

    pub(crate) fn secret_key(&self) -> SecretKey {
        self.key.inner
    }
}

impl Drop for ImportedPrivateKey {
    fn drop(&mut self) {
        self.key.inner.non_secure_erase();
    }
}

impl PartialEq for ImportedPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
            && self.context == other.context
            && self.selected_address == other.selected_address
    }
}

impl Eq for ImportedPrivateKey {}

impl fmt::Debug for ImportedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedPrivateKey")
            .field("public", &self.public)
            .field("selected_address", &self.selected_address)
            .finish_non_exhaustive()
    }
}
