use std::sync::Arc;

use btc_core::{
    meta_address, AccountContext, DerivationPath, ImportedPrivateKey, KeyChain, MetaAddress,
    SelectionPolicy, TransactionBuilder, TransactionRequest, TransactionResult,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::mnemonic::ZeroizingMnemonic;

/// A key chain viewed through one account context.
///
/// Cloning is cheap: the key chain is shared, so several contexts (for
/// example BIP49 and BIP84) can be served from one seed at once.
#[derive(Clone)]
pub struct HdWallet {
    keys: Arc<KeyChain>,
    context: AccountContext,
    policy: SelectionPolicy,
}

impl HdWallet {
    pub fn from_mnemonic(phrase: &str, context: AccountContext) -> Result<Self, WalletError> {
        let mnemonic = ZeroizingMnemonic::new(phrase.to_string())?;
        let seed = mnemonic.to_seed("")?;
        Self::from_seed(&seed, context)
    }

    pub fn from_seed(seed: &[u8], context: AccountContext) -> Result<Self, WalletError> {
        Ok(Self {
            keys: Arc::new(KeyChain::from_seed(seed)?),
            context,
            policy: SelectionPolicy::default(),
        })
    }

    pub fn from_config(phrase: &str, config: &WalletConfig) -> Result<Self, WalletError> {
        let wallet = Self::from_mnemonic(phrase, config.context()?)?;
        Ok(wallet.with_policy(config.policy))
    }

    /// Watch-only wallet. Purpose, coin and account come from the key's
    /// version prefix and depth.
    pub fn from_account_extended_public_key(encoded: &str) -> Result<Self, WalletError> {
        let (keys, context) = KeyChain::from_account_extended_public_key(encoded)?;
        Ok(Self {
            keys: Arc::new(keys),
            context,
            policy: SelectionPolicy::default(),
        })
    }

    pub fn context(&self) -> &AccountContext {
        &self.context
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn is_watch_only(&self) -> bool {
        self.keys.is_watch_only()
    }

    /// Same keys, different account context.
    pub fn with_context(&self, context: AccountContext) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            context,
            policy: self.policy,
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn receive_address(&self, index: u32) -> Result<MetaAddress, WalletError> {
        Ok(meta_address(&self.keys, &self.context.receive_path(index), &self.context)?)
    }

    pub fn change_address(&self, index: u32) -> Result<MetaAddress, WalletError> {
        Ok(meta_address(&self.keys, &self.context.change_path(index), &self.context)?)
    }

    /// Scan receive and change indices `0..up_to` for `address`.
    pub fn check_for_address(&self, address: &str, up_to: u32) -> Result<MetaAddress, WalletError> {
        for index in 0..up_to {
            for candidate in [self.receive_address(index)?, self.change_address(index)?] {
                if candidate.address == address {
                    debug!(path = %candidate.path, "address found in wallet");
                    return Ok(candidate);
                }
            }
        }
        Err(WalletError::AddressNotFound(format!(
            "{address} not within the first {up_to} indices"
        )))
    }

    /// Compressed SEC1 public key at `path`, for sharing with other wallets.
    pub fn compressed_public_key_for_path(
        &self,
        path: &DerivationPath,
    ) -> Result<[u8; 33], WalletError> {
        Ok(self.keys.derive(path)?.compressed_public_key())
    }

    pub fn uncompressed_public_key_for_path(
        &self,
        path: &DerivationPath,
    ) -> Result<[u8; 65], WalletError> {
        Ok(self.keys.derive(path)?.uncompressed_public_key())
    }

    pub fn account_extended_public_key(&self) -> Result<String, WalletError> {
        Ok(self.keys.account_extended_public_key(&self.context)?)
    }

    pub fn signing_key(&self) -> Result<Zeroizing<[u8; 32]>, WalletError> {
        Ok(self.keys.signing_key()?)
    }

    pub fn signing_public_key(&self) -> Result<[u8; 33], WalletError> {
        Ok(self.keys.signing_public_key()?)
    }

    pub fn verification_key_hex(&self) -> Result<String, WalletError> {
        Ok(self.keys.verification_key_hex()?)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, WalletError> {
        Ok(self.keys.sign(message)?)
    }

    pub fn sign_hex(&self, message: &[u8]) -> Result<String, WalletError> {
        Ok(self.keys.sign_hex(message)?)
    }

    pub fn import_private_key(&self, wif: &str) -> Result<ImportedPrivateKey, WalletError> {
        Ok(ImportedPrivateKey::from_wif(wif, &self.context)?)
    }

    /// Finalize `request` and sign it with this wallet's keys.
    pub fn build_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResult, WalletError> {
        let finalized = request.finalize()?;
        Ok(TransactionBuilder::new(&self.keys).build(&finalized)?)
    }
}
