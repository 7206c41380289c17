use bitcoin::consensus::encode::serialize;
use bitcoin::ecdsa::Signature;
use bitcoin::opcodes::all::OP_PUSHNUM_16;
use bitcoin::script::Instruction;
use bitcoin::{Script, Transaction, TxIn, TxOut};

use crate::error::BtcError;

/// Consensus rules checked by libbitcoinconsensus: P2SH, DERSIG, NULLDUMMY,
/// CHECKLOCKTIMEVERIFY, CHECKSEQUENCEVERIFY and WITNESS.
pub const CONSENSUS_FLAGS: u32 = bitcoinconsensus::VERIFY_ALL;

/// Check every input of a signed transaction against the output it spends.
///
/// Each input is run through the consensus script interpreter. The
/// standard-policy rules libconsensus does not accept as flags are checked
/// afterwards: SIGPUSHONLY, MINIMALDATA, LOW_S and STRICTENC.
pub fn verify_transaction(tx: &Transaction, prevouts: &[TxOut]) -> Result<(), BtcError> {
    if prevouts.len() != tx.input.len() {
        return Err(BtcError::ScriptVerificationFailure {
            input: prevouts.len().min(tx.input.len()),
            reason: format!(
                "{} inputs but {} prevouts",
                tx.input.len(),
                prevouts.len()
            ),
        });
    }
    let encoded = serialize(tx);
    for (index, (txin, prevout)) in tx.input.iter().zip(prevouts).enumerate() {
        verify_input(&encoded, index, txin, prevout).map_err(|reason| {
            tracing::error!(input = index, %reason, "signed input failed verification");
            BtcError::ScriptVerificationFailure {
                input: index,
                reason,
            }
        })?;
    }
    Ok(())
}

fn verify_input(encoded: &[u8], index: usize, txin: &TxIn, prevout: &TxOut) -> Result<(), String> {
    prevout
        .script_pubkey
        .verify_with_flags(index, prevout.value, encoded, CONSENSUS_FLAGS)
        .map_err(|e| e.to_string())?;

    let pushes = push_only(&txin.script_sig)?;
    let signature = if prevout.script_pubkey.is_p2pkh() {
        pushes.first().copied()
    } else {
        txin.witness.nth(0)
    };
    if let Some(signature) = signature {
        standard_signature(signature)?;
    }
    Ok(())
}

/// Pushes of a scriptSig. Fails on any opcode other than a push, and on
/// pushes that could have used a shorter encoding.
fn push_only(script: &Script) -> Result<Vec<&[u8]>, String> {
    let mut pushes = Vec::new();
    for ins in script.instructions_minimal() {
        match ins.map_err(|e| format!("scriptSig: {e}"))? {
            Instruction::PushBytes(bytes) => pushes.push(bytes.as_bytes()),
            Instruction::Op(op) if op.to_u8() <= OP_PUSHNUM_16.to_u8() => {}
            Instruction::Op(op) => return Err(format!("non-push opcode {op} in scriptSig")),
        }
    }
    Ok(pushes)
}

fn standard_signature(bytes: &[u8]) -> Result<(), String> {
    let signature = Signature::from_slice(bytes).map_err(|e| format!("signature encoding: {e}"))?;
    let mut normalized = signature.signature;
    normalized.normalize_s();
    if normalized != signature.signature {
        return Err("signature S value is not low".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::script::Builder;
    use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
    use bitcoin::sighash::{EcdsaSighashType, SighashCache};
    use bitcoin::transaction::Version;
    use bitcoin::{
        Amount, CompressedPublicKey, OutPoint, PublicKey, ScriptBuf, Sequence, Witness,
    };

    const SECRET: [u8; 32] = [0x42; 32];

    fn unsigned(spk: &ScriptBuf) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(90_000),
                script_pubkey: spk.clone(),
            }],
        }
    }

    fn keys() -> (SecretKey, CompressedPublicKey) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&SECRET).unwrap();
        let public = CompressedPublicKey(bitcoin::secp256k1::PublicKey::from_secret_key(
            &secp, &secret,
        ));
        (secret, public)
    }

    fn sign(secret: &SecretKey, digest: [u8; 32]) -> Signature {
        let msg = Message::from_digest(digest);
        Signature::sighash_all(Secp256k1::new().sign_ecdsa(&msg, secret))
    }

    fn signed_p2wpkh() -> (Transaction, Vec<TxOut>) {
        let (secret, public) = keys();
        let spk = ScriptBuf::new_p2wpkh(&public.wpubkey_hash());
        let prevouts = vec![TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey: spk.clone(),
        }];
        let mut tx = unsigned(&spk);
        let sighash = SighashCache::new(&tx)
            .p2wpkh_signature_hash(0, &spk, Amount::from_sat(100_000), EcdsaSighashType::All)
            .unwrap();
        let signature = sign(&secret, sighash.to_byte_array());
        tx.input[0].witness = Witness::p2wpkh(&signature, &public.0);
        (tx, prevouts)
    }

    fn signed_p2pkh() -> (Transaction, Vec<TxOut>, Signature, PublicKey) {
        let (secret, public) = keys();
        let public = PublicKey::from(public);
        let spk = ScriptBuf::new_p2pkh(&public.pubkey_hash());
        let prevouts = vec![TxOut {
            value: Amount::from_sat(100_000),
            script_pubkey: spk.clone(),
        }];
        let mut tx = unsigned(&spk);
        let sighash = SighashCache::new(&tx)
            .legacy_signature_hash(0, &spk, EcdsaSighashType::All.to_u32())
            .unwrap();
        let signature = sign(&secret, sighash.to_byte_array());
        tx.input[0].script_sig = Builder::new()
            .push_slice(signature.serialize())
            .push_key(&public)
            .into_script();
        (tx, prevouts, signature, public)
    }

    #[test]
    fn accepts_valid_p2wpkh_spend() {
        let (tx, prevouts) = signed_p2wpkh();
        verify_transaction(&tx, &prevouts).unwrap();
    }

    #[test]
    fn accepts_valid_p2pkh_spend() {
        let (tx, prevouts, _, _) = signed_p2pkh();
        verify_transaction(&tx, &prevouts).unwrap();
    }

    #[test]
    fn rejects_wrong_amount() {
        let (tx, mut prevouts) = signed_p2wpkh();
        prevouts[0].value = Amount::from_sat(100_001);
        assert!(matches!(
            verify_transaction(&tx, &prevouts),
            Err(BtcError::ScriptVerificationFailure { input: 0, .. })
        ));
    }

    #[test]
    fn rejects_tampered_output() {
        let (mut tx, prevouts) = signed_p2wpkh();
        tx.output[0].value = Amount::from_sat(95_000);
        assert!(verify_transaction(&tx, &prevouts).is_err());
    }

    #[test]
    fn rejects_missing_witness() {
        let (mut tx, prevouts) = signed_p2wpkh();
        tx.input[0].witness = Witness::default();
        assert!(verify_transaction(&tx, &prevouts).is_err());
    }

    #[test]
    fn rejects_segwit_input_signed_with_legacy_sighash() {
        let (secret, public) = keys();
        let (mut tx, prevouts) = signed_p2wpkh();
        let spk = prevouts[0].script_pubkey.clone();
        let sighash = SighashCache::new(&tx)
            .legacy_signature_hash(0, &spk, EcdsaSighashType::All.to_u32())
            .unwrap();
        let signature = sign(&secret, sighash.to_byte_array());
        tx.input[0].witness = Witness::p2wpkh(&signature, &public.0);
        assert!(matches!(
            verify_transaction(&tx, &prevouts),
            Err(BtcError::ScriptVerificationFailure { input: 0, .. })
        ));
    }

    #[test]
    fn rejects_non_minimal_signature_push() {
        let (mut tx, prevouts, signature, public) = signed_p2pkh();
        let sig = signature.serialize();
        let mut script = vec![0x4c, sig.len() as u8];
        script.extend_from_slice(&sig);
        script.push(33);
        script.extend_from_slice(&public.to_bytes());
        tx.input[0].script_sig = ScriptBuf::from_bytes(script);

        let err = verify_transaction(&tx, &prevouts).unwrap_err();
        assert!(matches!(err, BtcError::ScriptVerificationFailure { input: 0, .. }));
        assert!(err.to_string().contains("scriptSig"));
    }

    #[test]
    fn rejects_non_push_opcode_in_script_sig() {
        let (mut tx, prevouts, signature, public) = signed_p2pkh();
        tx.input[0].script_sig = Builder::new()
            .push_slice(signature.serialize())
            .push_key(&public)
            .push_opcode(bitcoin::opcodes::all::OP_NOP)
            .into_script();
        assert!(verify_transaction(&tx, &prevouts).is_err());
    }

    #[test]
    fn rejects_prevout_count_mismatch() {
        let (tx, _) = signed_p2wpkh();
        assert!(matches!(
            verify_transaction(&tx, &[]),
            Err(BtcError::ScriptVerificationFailure { .. })
        ));
    }

    #[test]
    fn rejects_unspendable_script() {
        let (tx, mut prevouts) = signed_p2wpkh();
        prevouts[0].script_pubkey = ScriptBuf::new();
        assert!(verify_transaction(&tx, &prevouts).is_err());
    }
}
