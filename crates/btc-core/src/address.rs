use bitcoin::address::{Address, AddressType, NetworkUnchecked};
use bitcoin::{CompressedPublicKey, PublicKey, ScriptBuf};

use crate::context::{AccountContext, BIP49, BIP84};
use crate::error::BtcError;
use crate::keys::KeyChain;
use crate::path::DerivationPath;

/// Destination used by callers that want a size estimate before the real
/// recipient is known. Estimated as a native segwit output.
pub const PLACEHOLDER_DESTINATION: &str = "---placeholder---";

/// Estimated serialized size of a P2PKH output.
pub const P2PKH_OUTPUT_SIZE: u64 = 34;
/// Estimated serialized size of a P2SH output.
pub const P2SH_OUTPUT_SIZE: u64 = 32;
/// Estimated serialized size of a P2WPKH or P2WSH output.
pub const P2WPKH_OUTPUT_SIZE: u64 = 31;
/// Estimated serialized size of a bare pay-to-pubkey output.
pub const P2PK_OUTPUT_SIZE: u64 = 32;

/// Address derived for a wallet path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaAddress {
    pub address: String,
    pub path: DerivationPath,
    /// Hex uncompressed public key. Only receive addresses expose it.
    pub uncompressed_public_key: Option<String>,
}

impl MetaAddress {
    pub fn is_receive_address(&self) -> bool {
        self.path.is_receive()
    }
}

/// The three encodings a single imported key could have been funded through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAddresses {
    pub legacy: String,
    pub p2sh_segwit: String,
    pub native_segwit: String,
}

impl CandidateAddresses {
    pub fn contains(&self, address: &str) -> bool {
        self.iter().any(|candidate| candidate == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.legacy.as_str(),
            self.p2sh_segwit.as_str(),
            self.native_segwit.as_str(),
        ]
        .into_iter()
    }
}

/// Derive the address for `path` and, for receive paths, its uncompressed key.
pub fn meta_address(
    keys: &KeyChain,
    path: &DerivationPath,
    context: &AccountContext,
) -> Result<MetaAddress, BtcError> {
    let key = keys.derive(path)?;
    let address = address_for_public_key(&key.public_key(), path.purpose, context)?;
    let uncompressed_public_key = path
        .is_receive()
        .then(|| hex::encode(key.uncompressed_public_key()));
    Ok(MetaAddress {
        address: address.to_string(),
        path: *path,
        uncompressed_public_key,
    })
}

/// Encode a public key for the given BIP purpose on the context's network.
pub fn address_for_public_key(
    public_key: &CompressedPublicKey,
    purpose: u32,
    context: &AccountContext,
) -> Result<Address, BtcError> {
    match purpose {
        BIP84 => Ok(Address::p2wpkh(public_key, context.bech32_hrp())),
        BIP49 => Ok(Address::p2shwpkh(public_key, context.network_kind())),
        other => Err(BtcError::UnrecognizedAddressPurpose(other)),
    }
}

/// Legacy, P2SH-segwit and native segwit addresses sharing one HASH160.
pub fn candidate_addresses(
    public_key: &CompressedPublicKey,
    context: &AccountContext,
) -> CandidateAddresses {
    CandidateAddresses {
        legacy: Address::p2pkh(public_key.pubkey_hash(), context.network_kind()).to_string(),
        p2sh_segwit: Address::p2shwpkh(public_key, context.network_kind()).to_string(),
        native_segwit: Address::p2wpkh(public_key, context.bech32_hrp()).to_string(),
    }
}

/// Parse an address and require it to belong to the context's network.
pub fn parse_address(address: &str, context: &AccountContext) -> Result<Address, BtcError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::AddressDecodeFailure(format!("{address}: {e}")))?
        .require_network(context.network())
        .map_err(|e| BtcError::AddressDecodeFailure(format!("{address}: {e}")))
}

/// Output script families the fee model knows how to size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    PayToPubkey,
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
}

impl OutputKind {
    /// Classify a destination string. Hex-encoded public keys are bare
    /// pay-to-pubkey outputs; everything else must be an address on the
    /// context's network.
    pub fn classify(address: &str, context: &AccountContext) -> Result<Self, BtcError> {
        if address == PLACEHOLDER_DESTINATION {
            return Ok(Self::P2wpkh);
        }
        if parse_hex_public_key(address).is_some() {
            return Ok(Self::PayToPubkey);
        }
        match parse_address(address, context)?.address_type() {
            Some(AddressType::P2pkh) => Ok(Self::P2pkh),
            Some(AddressType::P2sh) => Ok(Self::P2sh),
            Some(AddressType::P2wpkh) => Ok(Self::P2wpkh),
            Some(AddressType::P2wsh) => Ok(Self::P2wsh),
            _ => Err(BtcError::AddressDecodeFailure(format!(
                "{address}: address type not supported"
            ))),
        }
    }

    pub fn output_size(self) -> u64 {
        match self {
            Self::PayToPubkey => P2PK_OUTPUT_SIZE,
            Self::P2pkh => P2PKH_OUTPUT_SIZE,
            Self::P2sh => P2SH_OUTPUT_SIZE,
            Self::P2wpkh | Self::P2wsh => P2WPKH_OUTPUT_SIZE,
        }
    }
}

/// Locking script paying to `address`.
pub fn destination_script(address: &str, context: &AccountContext) -> Result<ScriptBuf, BtcError> {
    if address == PLACEHOLDER_DESTINATION {
        return Err(BtcError::AddressDecodeFailure(
            "placeholder destination cannot be paid".into(),
        ));
    }
    if let Some(public_key) = parse_hex_public_key(address) {
        return Ok(ScriptBuf::new_p2pk(&public_key));
    }
    Ok(parse_address(address, context)?.script_pubkey())
}

fn parse_hex_public_key(candidate: &str) -> Option<PublicKey> {
    if !matches!(candidate.len(), 66 | 130) {
        return None;
    }
    let bytes = hex::decode(candidate).ok()?;
    PublicKey::from_slice(&bytes).ok()
}

/// True when `address` base58check-decodes to a non-empty payload.
pub fn is_base58check_address(address: &str) -> bool {
    bs58::decode(address)
        .with_check(None)
        .into_vec()
        .is_ok_and(|payload| !payload.is_empty())
}

/// True for bech32 P2WPKH/P2WSH addresses on mainnet or regtest.
pub fn is_segwit_address(address: &str) -> bool {
    segwit_hrp(address).is_ok()
}

/// Human-readable part of a segwit address ("bc", "bcrt").
pub fn hrp_from_address(address: &str) -> Result<String, BtcError> {
    segwit_hrp(address)
}

fn segwit_hrp(address: &str) -> Result<String, BtcError> {
    let lower = address.to_ascii_lowercase();
    if !lower.starts_with("bc") {
        return Err(BtcError::AddressDecodeFailure(format!(
            "{address}: not a bech32 segwit address"
        )));
    }
    let parsed = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::AddressDecodeFailure(format!("{address}: {e}")))?
        .assume_checked();
    match parsed.address_type() {
        Some(AddressType::P2wpkh) | Some(AddressType::P2wsh) => lower
            .rsplit_once('1')
            .map(|(hrp, _)| hrp.to_string())
            .ok_or_else(|| BtcError::AddressDecodeFailure(format!("{address}: missing separator"))),
        _ => Err(BtcError::AddressDecodeFailure(format!(
            "{address}: not a segwit address"
        ))),
    }
}
