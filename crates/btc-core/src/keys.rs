use std::fmt;

use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::{CompressedPublicKey, NetworkKind};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::context::{AccountContext, ExtendedKeyVersion, BIP44};
use crate::error::BtcError;
use crate::path::DerivationPath;

/// Non-hardened child of the master key used as the wallet's identity key.
pub const IDENTITY_KEY_INDEX: u32 = 42;

const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;
const EXTENDED_KEY_LEN: usize = 78;

/// Key material for one derived child.
///
/// Watch-only key chains produce public-only keys. The secret scalar is
/// erased when the key is dropped.
pub struct DerivedKey {
    public: CompressedPublicKey,
    secret: Option<SecretKey>,
}

impl DerivedKey {
    fn from_secret(secp: &Secp256k1<All>, secret: SecretKey) -> Self {
        Self {
            public: CompressedPublicKey(PublicKey::from_secret_key(secp, &secret)),
            secret: Some(secret),
        }
    }

    pub fn public_key(&self) -> CompressedPublicKey {
        self.public
    }

    /// SEC1 compressed encoding (33 bytes).
    pub fn compressed_public_key(&self) -> [u8; 33] {
        self.public.to_bytes()
    }

    /// SEC1 uncompressed encoding (65 bytes, `04` prefix).
    pub fn uncompressed_public_key(&self) -> [u8; 65] {
        self.public.0.serialize_uncompressed()
    }

    pub fn has_private_key(&self) -> bool {
        self.secret.is_some()
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey, BtcError> {
        self.secret.ok_or(BtcError::MissingMasterKey)
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        if let Some(secret) = self.secret.as_mut() {
            secret.non_secure_erase();
        }
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("public", &self.public)
            .field("has_private_key", &self.secret.is_some())
            .finish()
    }
}

enum KeySource {
    Master(Xpriv),
    WatchOnly {
        context: AccountContext,
        account: Xpub,
    },
}

/// Read-only BIP32 derivation service built once from a seed or an account
/// extended public key. Every method takes `&self`, so a key chain can be
/// shared between threads.
pub struct KeyChain {
    source: KeySource,
    secp: Secp256k1<All>,
}

impl KeyChain {
    /// Build the master key from a BIP39 seed (16 to 64 bytes).
    pub fn from_seed(seed: &[u8]) -> Result<Self, BtcError> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
            return Err(BtcError::InvalidSeed(format!(
                "seed must be {MIN_SEED_LEN}..={MAX_SEED_LEN} bytes, got {}",
                seed.len()
            )));
        }
        let master = Xpriv::new_master(NetworkKind::Main, seed)
            .map_err(|e| BtcError::InvalidSeed(e.to_string()))?;
        Ok(Self {
            source: KeySource::Master(master),
            secp: Secp256k1::new(),
        })
    }

    /// Build a watch-only key chain from an account-level xpub/ypub/zpub/tpub/upub/vpub.
    ///
    /// The version prefix determines purpose and coin; the key's own child
    /// number gives the account. The returned context describes that account.
    pub fn from_account_extended_public_key(
        encoded: &str,
    ) -> Result<(Self, AccountContext), BtcError> {
        let mut data = decode_extended_key(encoded)?;
        let version = [data[0], data[1], data[2], data[3]];
        let (purpose, coin) = ExtendedKeyVersion::account_for_public(version).ok_or_else(|| {
            BtcError::InvalidExtendedKey(format!(
                "unrecognized version prefix {}",
                hex::encode(version)
            ))
        })?;

        // Xpub::decode only knows the xpub/tpub prefixes.
        let canonical = ExtendedKeyVersion::for_account(BIP44, coin)
            .ok_or(BtcError::UnsupportedCoin(coin))?;
        overwrite_version(&mut data, canonical.public)?;

        let account =
            Xpub::decode(&data).map_err(|e| BtcError::InvalidExtendedKey(e.to_string()))?;
        if account.depth != 3 {
            return Err(BtcError::InvalidExtendedKey(format!(
                "expected an account-level key at depth 3, got depth {}",
                account.depth
            )));
        }
        let account_index = match account.child_number {
            ChildNumber::Hardened { index } => index,
            ChildNumber::Normal { index } => {
                return Err(BtcError::InvalidExtendedKey(format!(
                    "account level must be hardened, got {index}"
                )))
            }
        };

        let context = AccountContext::new(purpose, coin, account_index)?;
        let chain = Self {
            source: KeySource::WatchOnly { context, account },
            secp: Secp256k1::new(),
        };
        Ok((chain, context))
    }

    /// True when the key chain only holds an account extended public key.
    pub fn is_watch_only(&self) -> bool {
        matches!(self.source, KeySource::WatchOnly { .. })
    }

    pub(crate) fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Derive the key at `path`: hardened purpose/coin/account, then normal change/index.
    pub fn derive(&self, path: &DerivationPath) -> Result<DerivedKey, BtcError> {
        match &self.source {
            KeySource::Master(master) => {
                let mut child = master
                    .derive_priv(&self.secp, &path.children()?)
                    .map_err(|e| BtcError::DerivationFailure(format!("{path}: {e}")))?;
                let key = DerivedKey::from_secret(&self.secp, child.private_key);
                child.private_key.non_secure_erase();
                Ok(key)
            }
            KeySource::WatchOnly { context, account } => {
                if !context.contains(path) {
                    return Err(BtcError::DerivationFailure(format!(
                        "{path} is outside the watch-only account m/{}'/{}'/{}'",
                        context.purpose(),
                        context.coin(),
                        context.account()
                    )));
                }
                let child = account
                    .derive_pub(&self.secp, &path.address_children()?)
                    .map_err(|e| BtcError::DerivationFailure(format!("{path}: {e}")))?;
                Ok(DerivedKey {
                    public: child.to_pub(),
                    secret: None,
                })
            }
        }
    }

    /// Identity key: `m/42`, independent of any account context.
    pub fn identity_key(&self) -> Result<DerivedKey, BtcError> {
        let KeySource::Master(master) = &self.source else {
            return Err(BtcError::MissingMasterKey);
        };
        let index = ChildNumber::from_normal_idx(IDENTITY_KEY_INDEX)
            .map_err(|e| BtcError::DerivationFailure(e.to_string()))?;
        let mut child = master
            .derive_priv(&self.secp, &[index])
            .map_err(|e| BtcError::DerivationFailure(format!("identity key: {e}")))?;
        let key = DerivedKey::from_secret(&self.secp, child.private_key);
        child.private_key.non_secure_erase();
        Ok(key)
    }

    /// Raw identity private scalar for message-encryption collaborators.
    pub fn signing_key(&self) -> Result<Zeroizing<[u8; 32]>, BtcError> {
        let identity = self.identity_key()?;
        Ok(Zeroizing::new(identity.secret_key()?.secret_bytes()))
    }

    /// Compressed identity public key.
    pub fn signing_public_key(&self) -> Result<[u8; 33], BtcError> {
        Ok(self.identity_key()?.compressed_public_key())
    }

    /// Hex form of [`signing_public_key`](Self::signing_public_key), used as a verification key.
    pub fn verification_key_hex(&self) -> Result<String, BtcError> {
        Ok(hex::encode(self.signing_public_key()?))
    }

    /// Sign `message` with the identity key.
    ///
    /// The message is double-SHA256 hashed and signed with RFC6979 nonces. The
    /// low-S DER signature is checked against the identity public key before
    /// it is returned.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BtcError> {
        let identity = self.identity_key()?;
        let mut secret = identity.secret_key()?.secret_bytes();
        let signing_key = SigningKey::from_bytes(&secret.into());
        secret.zeroize();
        let signing_key =
            signing_key.map_err(|e| BtcError::SigningError(format!("invalid identity scalar: {e}")))?;

        let digest = double_sha256(message);
        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .map_err(|e| BtcError::SigningError(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        if let Err(e) = signing_key.verifying_key().verify_prehash(&digest, &signature) {
            tracing::error!(error = %e, "identity signature failed self-verification");
            return Err(BtcError::SigningError(format!(
                "signature failed self-verification: {e}"
            )));
        }
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Hex-encoded form of [`sign`](Self::sign).
    pub fn sign_hex(&self, message: &[u8]) -> Result<String, BtcError> {
        Ok(hex::encode(self.sign(message)?))
    }

    /// Account-level extended public key with the SLIP-132 prefix for `context`.
    pub fn account_extended_public_key(
        &self,
        context: &AccountContext,
    ) -> Result<String, BtcError> {
        let target = context.extended_key_version().public;
        match &self.source {
            KeySource::Master(master) => {
                let path = context.receive_path(0).account_children()?;
                let mut account = master
                    .derive_priv(&self.secp, &path)
                    .map_err(|e| BtcError::DerivationFailure(format!("account key: {e}")))?;
                let neutered = Xpub::from_priv(&self.secp, &account);
                account.private_key.non_secure_erase();
                reprefix_extended_key(&neutered.to_string(), target)
            }
            KeySource::WatchOnly {
                context: held,
                account,
            } => {
                if held != context {
                    return Err(BtcError::DerivationFailure(format!(
                        "watch-only key chain holds m/{}'/{}'/{}' only",
                        held.purpose(),
                        held.coin(),
                        held.account()
                    )));
                }
                reprefix_extended_key(&account.to_string(), target)
            }
        }
    }
}

impl Drop for KeyChain {
    fn drop(&mut self) {
        if let KeySource::Master(master) = &mut self.source {
            master.private_key.non_secure_erase();
        }
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("watch_only", &self.is_watch_only())
            .finish()
    }
}

/// Replace the version prefix of a base58check extended key.
///
/// Only bytes 1..4 are rewritten. Byte 0 must already equal `version[0]`, which
/// guards against feeding in something that is not an extended key.
pub fn reprefix_extended_key(encoded: &str, version: [u8; 4]) -> Result<String, BtcError> {
    let mut data = decode_extended_key(encoded)?;
    overwrite_version(&mut data, version)?;
    Ok(bs58::encode(&data).with_check().into_string())
}

/// Verify a DER signature produced by [`KeyChain::sign`].
pub fn verify_message_signature(
    public_key: &[u8],
    message: &[u8],
    signature_der: &[u8],
) -> Result<bool, BtcError> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| BtcError::SigningError(format!("invalid public key: {e}")))?;
    let Ok(signature) = Signature::from_der(signature_der) else {
        return Ok(false);
    };
    Ok(key.verify_prehash(&double_sha256(message), &signature).is_ok())
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

fn decode_extended_key(encoded: &str) -> Result<Vec<u8>, BtcError> {
    let data = bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|e| BtcError::InvalidExtendedKey(format!("base58check decode failed: {e}")))?;
    if data.len() != EXTENDED_KEY_LEN {
        return Err(BtcError::InvalidExtendedKey(format!(
            "expected {EXTENDED_KEY_LEN} bytes, got {}",
            data.len()
        )));
    }
    Ok(data)
}

// Bytes 0..4 are the version field of every BIP32 serialization.
fn overwrite_version(data: &mut [u8], version: [u8; 4]) -> Result<(), BtcError> {
    if data[0] != version[0] {
        return Err(BtcError::VersionPrefixMismatch {
            expected: version[0],
            found: data[0],
        });
    }
    data[1..4].copy_from_slice(&version[1..4]);
    Ok(())
}
