use crate::address::OutputKind;
use crate::context::{AccountContext, BIP44, BIP49, BIP84};
use crate::error::BtcError;
use crate::utxo::{SigningSource, Utxo};

/// Version, locktime, segwit marker/flag and the in/out counts.
pub const BASE_SIZE: u64 = 11;
/// Estimated size of a P2PKH input (scriptSig with signature and compressed key).
pub const P2PKH_INPUT_SIZE: u64 = 147;
/// Estimated virtual size of a P2SH-wrapped P2WPKH input.
pub const P2SH_P2WPKH_INPUT_SIZE: u64 = 91;
/// Estimated virtual size of a native P2WPKH input.
pub const P2WPKH_INPUT_SIZE: u64 = 68;

fn input_size_for_purpose(purpose: u32) -> Result<u64, BtcError> {
    match purpose {
        BIP84 => Ok(P2WPKH_INPUT_SIZE),
        BIP49 => Ok(P2SH_P2WPKH_INPUT_SIZE),
        BIP44 => Ok(P2PKH_INPUT_SIZE),
        other => Err(BtcError::UnrecognizedAddressPurpose(other)),
    }
}

/// Estimated size of the input spending `utxo`.
pub fn input_size(utxo: &Utxo) -> Result<u64, BtcError> {
    match &utxo.source {
        SigningSource::Derived(path) => input_size_for_purpose(path.purpose),
        SigningSource::Imported(key) => {
            let selected = key.selected_address().ok_or_else(|| {
                BtcError::MissingSigningSource(format!(
                    "imported key for {}:{} has no selected address",
                    utxo.txid, utxo.vout
                ))
            })?;
            match OutputKind::classify(selected, key.context())? {
                OutputKind::P2pkh => Ok(P2PKH_INPUT_SIZE),
                OutputKind::P2sh => Ok(P2SH_P2WPKH_INPUT_SIZE),
                OutputKind::P2wpkh => Ok(P2WPKH_INPUT_SIZE),
                kind => Err(BtcError::MissingSigningSource(format!(
                    "imported key cannot spend a {kind:?} output"
                ))),
            }
        }
    }
}

/// Size of a change output paying back into `context`'s account.
pub fn change_output_size(context: &AccountContext) -> u64 {
    match context.purpose() {
        BIP84 => OutputKind::P2wpkh.output_size(),
        BIP49 => OutputKind::P2sh.output_size(),
        _ => OutputKind::P2pkh.output_size(),
    }
}

/// Estimated size of a transaction spending `utxos` to `destination`,
/// optionally with a change output.
pub fn estimate_size(
    utxos: &[Utxo],
    destination: &str,
    context: &AccountContext,
    include_change: bool,
) -> Result<u64, BtcError> {
    let mut size = BASE_SIZE + OutputKind::classify(destination, context)?.output_size();
    for utxo in utxos {
        size += input_size(utxo)?;
    }
    if include_change {
        size += change_output_size(context);
    }
    tracing::debug!(
        inputs = utxos.len(),
        include_change,
        size,
        "estimated transaction size"
    );
    Ok(size)
}
