pub mod config;
pub mod error;
pub mod mnemonic;
pub mod types;
pub mod wallet;

use std::sync::{Arc, Mutex, PoisonError};

use btc_core::{AccountContext, TransactionRequest, Utxo};
use error::WalletError;
use types::{AddressData, ImportedKeyData, PathData, RbfPolicy, TransactionData};
use wallet::HdWallet;

uniffi::setup_scaffolding!();

// ─── UniFFI-exported functions ───────────────────────────────────────
// UniFFI passes owned String/Vec<u8> across FFI, so all functions
// accept owned types (not references).

/// Derive seed bytes from mnemonic + passphrase
#[uniffi::export]
pub fn mnemonic_to_seed(mnemonic_phrase: String, passphrase: String) -> Result<Vec<u8>, WalletError> {
    Ok(mnemonic::mnemonic_to_seed(&mnemonic_phrase, &passphrase)?.to_vec())
}

/// Validate a mnemonic phrase
#[uniffi::export]
pub fn validate_mnemonic(phrase: String) -> bool {
    mnemonic::validate_mnemonic(&phrase)
}

/// Check if a single word is in the BIP-39 word list
#[uniffi::export]
pub fn is_valid_bip39_word(word: String) -> bool {
    mnemonic::is_valid_word(&word)
}

#[uniffi::export]
pub fn is_base58check_address(address: String) -> bool {
    btc_core::is_base58check_address(&address)
}

#[uniffi::export]
pub fn is_segwit_address(address: String) -> bool {
    btc_core::is_segwit_address(&address)
}

#[uniffi::export]
pub fn hrp_from_address(address: String) -> Result<String, WalletError> {
    Ok(btc_core::hrp_from_address(&address)?)
}

/// Swap the 4-byte version prefix of a base58check extended key.
#[uniffi::export]
pub fn reprefix_extended_key(encoded: String, version: Vec<u8>) -> Result<String, WalletError> {
    let version: [u8; 4] = version.as_slice().try_into().map_err(|_| {
        WalletError::InvalidExtendedKey(format!("version must be 4 bytes, got {}", version.len()))
    })?;
    Ok(btc_core::reprefix_extended_key(&encoded, version)?)
}

fn to_u32(value: u64, what: &str) -> Result<u32, WalletError> {
    u32::try_from(value)
        .map_err(|_| WalletError::IndexOutOfBounds(format!("{what} {value} exceeds u32 range")))
}

// ─── Wallet handle ───────────────────────────────────────────────────

#[derive(uniffi::Object)]
pub struct HdWalletHandle {
    wallet: HdWallet,
}

#[uniffi::export]
impl HdWalletHandle {
    #[uniffi::constructor]
    pub fn from_mnemonic(
        mnemonic_phrase: String,
        purpose: u32,
        coin: u32,
        account: u32,
    ) -> Result<Arc<Self>, WalletError> {
        let context = AccountContext::new(purpose, coin, account)?;
        Ok(Arc::new(Self {
            wallet: HdWallet::from_mnemonic(&mnemonic_phrase, context)?,
        }))
    }

    #[uniffi::constructor]
    pub fn from_config(mnemonic_phrase: String, config_json: String) -> Result<Arc<Self>, WalletError> {
        let config = config::WalletConfig::from_json(&config_json)?;
        Ok(Arc::new(Self {
            wallet: HdWallet::from_config(&mnemonic_phrase, &config)?,
        }))
    }

    /// Watch-only wallet from an account xpub/ypub/zpub/tpub/upub/vpub.
    #[uniffi::constructor]
    pub fn from_account_extended_public_key(encoded: String) -> Result<Arc<Self>, WalletError> {
        Ok(Arc::new(Self {
            wallet: HdWallet::from_account_extended_public_key(&encoded)?,
        }))
    }

    pub fn with_context(&self, purpose: u32, coin: u32, account: u32) -> Result<Arc<Self>, WalletError> {
        let context = AccountContext::new(purpose, coin, account)?;
        Ok(Arc::new(Self {
            wallet: self.wallet.with_context(context),
        }))
    }

    pub fn is_watch_only(&self) -> bool {
        self.wallet.is_watch_only()
    }

    pub fn receive_address(&self, index: u32) -> Result<AddressData, WalletError> {
        Ok(self.wallet.receive_address(index)?.into())
    }

    pub fn change_address(&self, index: u32) -> Result<AddressData, WalletError> {
        Ok(self.wallet.change_address(index)?.into())
    }

    pub fn check_for_address(&self, address: String, up_to: u32) -> Result<AddressData, WalletError> {
        Ok(self.wallet.check_for_address(&address, up_to)?.into())
    }

    /// 33-byte SEC1 public key at `path`.
    pub fn compressed_public_key_for_path(&self, path: PathData) -> Result<Vec<u8>, WalletError> {
        Ok(self
            .wallet
            .compressed_public_key_for_path(&path.into())?
            .to_vec())
    }

    /// 65-byte SEC1 public key at `path`, `04` prefixed.
    pub fn uncompressed_public_key_for_path(&self, path: PathData) -> Result<Vec<u8>, WalletError> {
        Ok(self
            .wallet
            .uncompressed_public_key_for_path(&path.into())?
            .to_vec())
    }

    pub fn account_extended_public_key(&self) -> Result<String, WalletError> {
        self.wallet.account_extended_public_key()
    }

    /// Raw identity private key. The caller owns the returned copy.
    pub fn signing_key(&self) -> Result<Vec<u8>, WalletError> {
        Ok(self.wallet.signing_key()?.to_vec())
    }

    pub fn signing_public_key(&self) -> Result<Vec<u8>, WalletError> {
        Ok(self.wallet.signing_public_key()?.to_vec())
    }

    pub fn verification_key_hex(&self) -> Result<String, WalletError> {
        self.wallet.verification_key_hex()
    }

    /// DER signature of the double-SHA256 of `message` under the identity key.
    pub fn sign_message(&self, message: Vec<u8>) -> Result<Vec<u8>, WalletError> {
        self.wallet.sign(&message)
    }

    pub fn import_private_key(&self, wif: String) -> Result<ImportedKeyData, WalletError> {
        let key = self.wallet.import_private_key(&wif)?;
        let candidates = key.candidates();
        Ok(ImportedKeyData {
            legacy: candidates.legacy.clone(),
            p2sh_segwit: candidates.p2sh_segwit.clone(),
            native_segwit: candidates.native_segwit.clone(),
            possible_addresses: key.possible_addresses(),
        })
    }
}

// ─── Transaction request handle ──────────────────────────────────────

/// Single-use transaction request. `finalize_and_build` consumes it.
#[derive(uniffi::Object)]
pub struct TransactionRequestHandle {
    wallet: Arc<HdWalletHandle>,
    request: Mutex<Option<TransactionRequest>>,
}

impl TransactionRequestHandle {
    fn wrap(wallet: Arc<HdWalletHandle>, request: TransactionRequest) -> Arc<Self> {
        let request = request.with_policy(wallet.wallet.policy());
        Arc::new(Self {
            wallet,
            request: Mutex::new(Some(request)),
        })
    }

    fn with_request<R>(
        &self,
        f: impl FnOnce(&mut TransactionRequest) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        let mut guard = self.request.lock().unwrap_or_else(PoisonError::into_inner);
        let request = guard.as_mut().ok_or(WalletError::RequestConsumed)?;
        f(request)
    }
}

#[uniffi::export]
impl TransactionRequestHandle {
    #[uniffi::constructor]
    pub fn rate_based(
        wallet: Arc<HdWalletHandle>,
        destination: String,
        amount: u64,
        fee_rate: u64,
        change_path: PathData,
        block_height: u64,
        rbf: RbfPolicy,
    ) -> Result<Arc<Self>, WalletError> {
        let request = TransactionRequest::rate_based(
            *wallet.wallet.context(),
            destination,
            amount,
            fee_rate,
            change_path.into(),
            to_u32(block_height, "block height")?,
            rbf.into(),
        );
        Ok(Self::wrap(wallet, request))
    }

    #[uniffi::constructor]
    pub fn flat_fee(
        wallet: Arc<HdWalletHandle>,
        destination: String,
        amount: u64,
        fee: u64,
        change_path: PathData,
        block_height: u64,
    ) -> Result<Arc<Self>, WalletError> {
        let request = TransactionRequest::flat_fee(
            *wallet.wallet.context(),
            destination,
            amount,
            fee,
            change_path.into(),
            to_u32(block_height, "block height")?,
        );
        Ok(Self::wrap(wallet, request))
    }

    #[uniffi::constructor]
    pub fn send_max(
        wallet: Arc<HdWalletHandle>,
        destination: String,
        fee_rate: u64,
        block_height: u64,
    ) -> Result<Arc<Self>, WalletError> {
        let request = TransactionRequest::send_max(
            *wallet.wallet.context(),
            destination,
            fee_rate,
            to_u32(block_height, "block height")?,
        );
        Ok(Self::wrap(wallet, request))
    }

    pub fn set_rbf(&self, rbf: RbfPolicy) -> Result<(), WalletError> {
        self.with_request(|request| {
            request.set_rbf(rbf.into());
            Ok(())
        })
    }

    pub fn add_derived_utxo(
        &self,
        txid: String,
        vout: u64,
        amount: u64,
        path: PathData,
        is_confirmed: bool,
    ) -> Result<(), WalletError> {
        let vout = to_u32(vout, "vout")?;
        self.with_request(|request| {
            request.add_utxo(Utxo::derived(txid, vout, amount, path.into(), is_confirmed));
            Ok(())
        })
    }

    /// Add a UTXO locked to `selected_address`, one of the imported key's candidates.
    pub fn add_imported_utxo(
        &self,
        txid: String,
        vout: u64,
        amount: u64,
        wif: String,
        selected_address: String,
        is_confirmed: bool,
    ) -> Result<(), WalletError> {
        let vout = to_u32(vout, "vout")?;
        let key = self
            .wallet
            .wallet
            .import_private_key(&wif)?
            .with_selected_address(&selected_address)?;
        self.with_request(|request| {
            request.add_utxo(Utxo::imported(txid, vout, amount, key, is_confirmed));
            Ok(())
        })
    }

    /// Run coin selection, sign and verify. The request cannot be reused.
    pub fn finalize_and_build(&self) -> Result<TransactionData, WalletError> {
        let request = self
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(WalletError::RequestConsumed)?;
        Ok(self.wallet.wallet.build_transaction(request)?.into())
    }
}
