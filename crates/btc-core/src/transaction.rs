use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::ecdsa::Signature;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{Message, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, PublicKey, ScriptBuf, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use tracing::info;

use crate::address::{address_for_public_key, destination_script, OutputKind};
use crate::context::{BIP44, BIP49, BIP84};
use crate::error::BtcError;
use crate::keys::KeyChain;
use crate::path::DerivationPath;
use crate::request::FinalizedTransaction;
use crate::utxo::{SigningSource, Utxo};
use crate::verify::verify_transaction;

/// Where the change output of a built transaction went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMetadata {
    pub address: String,
    pub path: DerivationPath,
    pub vout_index: u32,
}

/// A signed, verified transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    /// Display-order transaction id.
    pub txid: String,
    /// Consensus-serialized transaction, hex encoded.
    pub encoded_tx: String,
    pub change: Option<ChangeMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpendKind {
    P2pkh,
    P2shP2wpkh,
    P2wpkh,
}

struct InputSigner {
    kind: SpendKind,
    public: CompressedPublicKey,
    secret: SecretKey,
}

impl InputSigner {
    /// Locking script of the output this key spends.
    fn script_pubkey(&self) -> ScriptBuf {
        match self.kind {
            SpendKind::P2pkh => ScriptBuf::new_p2pkh(&self.public.pubkey_hash()),
            SpendKind::P2wpkh => self.witness_program(),
            SpendKind::P2shP2wpkh => ScriptBuf::new_p2sh(&self.witness_program().script_hash()),
        }
    }

    fn witness_program(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&self.public.wpubkey_hash())
    }
}

impl Drop for InputSigner {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

/// Builds and signs transactions from finalized coin selections.
pub struct TransactionBuilder<'a> {
    keys: &'a KeyChain,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(keys: &'a KeyChain) -> Self {
        Self { keys }
    }

    /// Assemble, sign and verify. Either every input is signed and verified
    /// or nothing is returned.
    pub fn build(&self, finalized: &FinalizedTransaction) -> Result<TransactionResult, BtcError> {
        let context = &finalized.context;

        let mut output = vec![TxOut {
            value: Amount::from_sat(finalized.amount),
            script_pubkey: destination_script(&finalized.destination, context)?,
        }];
        let mut change = None;
        if finalized.should_add_change() {
            let path = finalized.change_path.ok_or_else(|| {
                BtcError::DerivationFailure("change requested without a change path".into())
            })?;
            let key = self.keys.derive(&path)?;
            let address = address_for_public_key(&key.public_key(), path.purpose, context)?;
            output.push(TxOut {
                value: Amount::from_sat(finalized.change),
                script_pubkey: address.script_pubkey(),
            });
            change = Some(ChangeMetadata {
                address: address.to_string(),
                path,
                vout_index: 1,
            });
        }

        let sequence = finalized.sequence();
        let mut input = Vec::with_capacity(finalized.required.len());
        let mut signers = Vec::with_capacity(finalized.required.len());
        let mut prevouts = Vec::with_capacity(finalized.required.len());
        for utxo in &finalized.required {
            let txid = Txid::from_str(&utxo.txid)
                .map_err(|e| BtcError::AddressDecodeFailure(format!("txid {}: {e}", utxo.txid)))?;
            input.push(TxIn {
                previous_output: OutPoint::new(txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::default(),
            });
            let signer = self.signer_for(utxo)?;
            prevouts.push(TxOut {
                value: Amount::from_sat(utxo.amount),
                script_pubkey: signer.script_pubkey(),
            });
            signers.push(signer);
        }

        let mut tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::from_consensus(finalized.block_height),
            input,
            output,
        };

        let unlocks = self.sign_inputs(&tx, &signers, &prevouts)?;
        for (txin, (script_sig, witness)) in tx.input.iter_mut().zip(unlocks) {
            txin.script_sig = script_sig;
            txin.witness = witness;
        }

        verify_transaction(&tx, &prevouts)?;

        let txid = tx.compute_txid().to_string();
        info!(
            %txid,
            inputs = tx.input.len(),
            outputs = tx.output.len(),
            fee = finalized.fee,
            "built transaction"
        );
        Ok(TransactionResult {
            txid,
            encoded_tx: serialize_hex(&tx),
            change,
        })
    }

    fn signer_for(&self, utxo: &Utxo) -> Result<InputSigner, BtcError> {
        match &utxo.source {
            SigningSource::Derived(path) => {
                let kind = match path.purpose {
                    BIP84 => SpendKind::P2wpkh,
                    BIP49 => SpendKind::P2shP2wpkh,
                    BIP44 => SpendKind::P2pkh,
                    other => return Err(BtcError::UnrecognizedAddressPurpose(other)),
                };
                let key = self.keys.derive(path)?;
                Ok(InputSigner {
                    kind,
                    public: key.public_key(),
                    secret: key.secret_key()?,
                })
            }
            SigningSource::Imported(imported) => {
                let selected = imported.selected_address().ok_or_else(|| {
                    BtcError::MissingSigningSource(format!(
                        "imported key for {}:{} has no selected address",
                        utxo.txid, utxo.vout
                    ))
                })?;
                let kind = match OutputKind::classify(selected, imported.context())? {
                    OutputKind::P2pkh => SpendKind::P2pkh,
                    OutputKind::P2sh => SpendKind::P2shP2wpkh,
                    OutputKind::P2wpkh => SpendKind::P2wpkh,
                    other => {
                        return Err(BtcError::MissingSigningSource(format!(
                            "imported key cannot spend a {other:?} output"
                        )))
                    }
                };
                Ok(InputSigner {
                    kind,
                    public: imported.public_key(),
                    secret: imported.secret_key(),
                })
            }
        }
    }

    fn sign_inputs(
        &self,
        tx: &Transaction,
        signers: &[InputSigner],
        prevouts: &[TxOut],
    ) -> Result<Vec<(ScriptBuf, Witness)>, BtcError> {
        let secp = self.keys.secp();
        let mut cache = SighashCache::new(tx);
        let mut unlocks = Vec::with_capacity(signers.len());

        for (index, (signer, prevout)) in signers.iter().zip(prevouts).enumerate() {
            let digest = match signer.kind {
                SpendKind::P2pkh => cache
                    .legacy_signature_hash(
                        index,
                        &prevout.script_pubkey,
                        EcdsaSighashType::All.to_u32(),
                    )
                    .map_err(|e| BtcError::SigningError(format!("input {index}: {e}")))?
                    .to_byte_array(),
                SpendKind::P2wpkh | SpendKind::P2shP2wpkh => cache
                    .p2wpkh_signature_hash(
                        index,
                        &signer.witness_program(),
                        prevout.value,
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| BtcError::SigningError(format!("input {index}: {e}")))?
                    .to_byte_array(),
            };
            let msg = Message::from_digest(digest);
            let signature = Signature::sighash_all(secp.sign_ecdsa(&msg, &signer.secret));

            let unlock = match signer.kind {
                SpendKind::P2pkh => (
                    Builder::new()
                        .push_slice(signature.serialize())
                        .push_key(&PublicKey::from(signer.public))
                        .into_script(),
                    Witness::default(),
                ),
                SpendKind::P2wpkh => (
                    ScriptBuf::new(),
                    Witness::p2wpkh(&signature, &signer.public.0),
                ),
                SpendKind::P2shP2wpkh => {
                    let redeem = PushBytesBuf::try_from(signer.witness_program().into_bytes())
                        .map_err(|e| BtcError::SigningError(format!("redeem script: {e}")))?;
                    (
                        Builder::new().push_slice(redeem).into_script(),
                        Witness::p2wpkh(&signature, &signer.public.0),
                    )
                }
            };
            unlocks.push(unlock);
        }
        Ok(unlocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AccountContext;
    use crate::imported::ImportedPrivateKey;
    use crate::request::{RbfOption, TransactionRequest};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_chain() -> KeyChain {
        let mnemonic =
            bip39::Mnemonic::parse_in_normalized(bip39::Language::English, TEST_MNEMONIC).unwrap();
        KeyChain::from_seed(&mnemonic.to_seed("")).unwrap()
    }

    #[test]
    fn flat_fee_p2sh_segwit_matches_known_transaction() {
        let context = AccountContext::new(49, 0, 0).unwrap();
        let mut request = TransactionRequest::flat_fee(
            context,
            "3BgxxADLtnoKu9oytQiiVzYUqvo8weCVy9",
            13_584,
            3_000,
            DerivationPath::new(49, 0, 0, 1, 56),
            539_943,
        );
        request.add_utxo(Utxo::derived(
            "1a08dafe993fdc17fdc661988c88f97a9974013291e759b9b5766b8e97c78f87",
            1,
            2_788_424,
            DerivationPath::new(49, 0, 0, 1, 53),
            true,
        ));
        let finalized = request.finalize().unwrap();
        let result = TransactionBuilder::new(&test_chain()).build(&finalized).unwrap();

        assert_eq!(
            result.encoded_tx,
            "01000000000101878fc7978e6b76b5b959e791320174997af9888c9861c6fd17dc3f99feda081a0100000017160014509060a6bedf13087124c0aeafc6e3db4e1e9a08fdffffff02103500000000000017a9146daec6ddb6faaf01f83f515045822a94d0c2331e87804b2a000000000017a914e0bc3e6f5f4080b4f007c6307ba579595e459a0687024730440220031851e7fc75043bfa4bb7234478408fd024a50088fee8e16953d347bcfc37ae022050604330a862f1e6d3d2941e0bc5911d3b2f55c8e396e4d0d8c43acbf7e66f16012103d447f34dd13359a8fc64ed3977fcecea3f6802f842f9a9f857de07453b715735273d0800"
        );
        assert_eq!(
            result.txid,
            "20d9d7eae4283573e042de272c0fc6af7df5a1100c4871127fa07c9022da1945"
        );
        let change = result.change.unwrap();
        assert_eq!(change.address, "3NBJnvo9U5YbJnr1pALFqQEur1wXWJrjoM");
        assert_eq!(change.vout_index, 1);
        assert_eq!(finalized.change, 2_771_840);
    }

    #[test]
    fn flat_fee_native_segwit_matches_known_transaction() {
        let context = AccountContext::new(84, 0, 0).unwrap();
        let mut request = TransactionRequest::flat_fee(
            context,
            "bc1qjv79zewlvyyyd5y0qfk3svexzrqnammllj7mw6",
            9_755,
            846,
            DerivationPath::new(84, 0, 0, 1, 1),
            590_582,
        );
        request.add_utxo(Utxo::derived(
            "a89a9bed1f2daca01a0dca58f7fd0f2f0bf114d762b38e65845c5d1489339a69",
            0,
            96_537,
            DerivationPath::new(84, 0, 0, 0, 1),
            true,
        ));
        let finalized = request.finalize().unwrap();
        let result = TransactionBuilder::new(&test_chain()).build(&finalized).unwrap();

        assert_eq!(
            result.encoded_tx,
            "01000000000101699a3389145d5c84658eb362d714f10b2f0ffdf758ca0d1aa0ac2d1fed9b9aa80000000000fdffffff021b26000000000000160014933c5165df610846d08f026d18332610c13eef7fb04f0100000000001600144227d834f1aae95273f0c87495f4ff0cb366545202483045022100b232240638739a01414442f38f5e2747c891746597edaffbb0120b89120d12fd02201f5de6f8b938492c28459d07f5824fdddd0b869e522680429ca7b08515cd6eaf012103e775fd51f0dfb8cd865d9ff1cca2a158cf651fe997fdc9fee9c1d3b5e995ea77f6020900"
        );
        assert_eq!(
            result.txid,
            "fe7f9a6de3203eb300cc66159e762251d675b5555dbd215c3574e75a762ca402"
        );
        let change = result.change.unwrap();
        assert_eq!(change.address, "bc1qggnasd834t54yulsep6fta8lpjekv4zj6gv5rf");
        assert_eq!(finalized.change, 85_936);
    }

    #[test]
    fn imported_legacy_key_signs_p2pkh_input() {
        let context = AccountContext::new(84, 0, 0).unwrap();
        let key = ImportedPrivateKey::from_wif(
            "L2uv4eejGywPPmsESp3N9Vum9HGX6gBg6RTWJ5oakN9HFTiSKB8i",
            &context,
        )
        .unwrap()
        .with_selected_address("1Ad4RSbPrFvo4T5eRMFCoieYf9AuhYdL3h")
        .unwrap();
        let mut request = TransactionRequest::send_max(
            context,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
            10,
            600_000,
        );
        request.add_utxo(Utxo::imported("cd".repeat(32), 2, 50_000, key, true));
        let finalized = request.finalize().unwrap();
        let result = TransactionBuilder::new(&test_chain()).build(&finalized).unwrap();

        assert!(result.change.is_none());
        let bytes = hex::decode(&result.encoded_tx).unwrap();
        let tx: Transaction = bitcoin::consensus::deserialize(&bytes).unwrap();
        assert_eq!(tx.input.len(), 1);
        assert!(tx.input[0].witness.is_empty());
        assert_eq!(tx.input[0].script_sig.instructions().count(), 2);
        assert_eq!(tx.input[0].sequence, bitcoin::Sequence::MAX);
        assert_eq!(tx.output[0].value.to_sat(), 50_000 - 10 * (11 + 147 + 31));
    }

    #[test]
    fn mixed_inputs_all_verify() {
        let context = AccountContext::new(84, 0, 0).unwrap();
        let imported = ImportedPrivateKey::from_wif(
            "L2hgQ3HC3Ru88Jkn5TDwReqeZPhWW4AePebUVFnEQCGJnTPQLgAv",
            &context,
        )
        .unwrap()
        .with_selected_address("bc1q2ef8pkkefnamef2sv97dls5ktrq3jlg2ru8ceu")
        .unwrap();
        let mut request = TransactionRequest::rate_based(
            context,
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA",
            150_000,
            2,
            DerivationPath::new(84, 0, 0, 1, 0),
            700_000,
            RbfOption::AllowedToBeRbf,
        );
        request.add_utxo(Utxo::derived(
            "01".repeat(32),
            0,
            60_000,
            DerivationPath::new(49, 0, 0, 0, 0),
            true,
        ));
        request.add_utxo(Utxo::derived(
            "02".repeat(32),
            1,
            60_000,
            DerivationPath::new(44, 0, 0, 0, 0),
            true,
        ));
        request.add_utxo(Utxo::imported("03".repeat(32), 0, 60_000, imported, false));
        let finalized = request.finalize().unwrap();
        assert_eq!(finalized.utxo_count(), 3);

        let result = TransactionBuilder::new(&test_chain()).build(&finalized).unwrap();
        let tx: Transaction =
            bitcoin::consensus::deserialize(&hex::decode(&result.encoded_tx).unwrap()).unwrap();
        assert_eq!(tx.version, Version::ONE);
        assert_eq!(tx.lock_time, LockTime::from_consensus(700_000));
        assert!(tx
            .input
            .iter()
            .all(|i| i.sequence == bitcoin::Sequence::ENABLE_RBF_NO_LOCKTIME));
        assert_eq!(tx.output.len(), 2);
        assert_eq!(result.change.unwrap().address, "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el");
    }

    #[test]
    fn pay_to_pubkey_destination() {
        let context = AccountContext::new(84, 0, 0).unwrap();
        let mut request = TransactionRequest::send_max(
            context,
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
            1,
            1,
        );
        request.add_utxo(Utxo::derived(
            "04".repeat(32),
            0,
            10_000,
            DerivationPath::new(84, 0, 0, 0, 0),
            true,
        ));
        let finalized = request.finalize().unwrap();
        let result = TransactionBuilder::new(&test_chain()).build(&finalized).unwrap();
        let tx: Transaction =
            bitcoin::consensus::deserialize(&hex::decode(&result.encoded_tx).unwrap()).unwrap();
        assert!(tx.output[0].script_pubkey.is_p2pk());
    }

    #[test]
    fn malformed_txid_is_rejected() {
        let context = AccountContext::new(84, 0, 0).unwrap();
        let mut request = TransactionRequest::send_max(
            context,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
            1,
            1,
        );
        request.add_utxo(Utxo::derived(
            "not-a-txid",
            0,
            10_000,
            DerivationPath::new(84, 0, 0, 0, 0),
            true,
        ));
        let finalized = request.finalize().unwrap();
        assert!(matches!(
            TransactionBuilder::new(&test_chain()).build(&finalized),
            Err(BtcError::AddressDecodeFailure(_))
        ));
    }

    #[test]
    fn watch_only_chain_cannot_sign() {
        let chain = test_chain();
        let context = AccountContext::new(84, 0, 0).unwrap();
        let zpub = chain.account_extended_public_key(&context).unwrap();
        let (watch_only, _) = KeyChain::from_account_extended_public_key(&zpub).unwrap();

        let mut request = TransactionRequest::send_max(
            context,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
            1,
            1,
        );
        request.add_utxo(Utxo::derived(
            "05".repeat(32),
            0,
            10_000,
            DerivationPath::new(84, 0, 0, 0, 0),
            true,
        ));
        let finalized = request.finalize().unwrap();
        assert_eq!(
            TransactionBuilder::new(&watch_only).build(&finalized),
            Err(BtcError::MissingMasterKey)
        );
    }
}
