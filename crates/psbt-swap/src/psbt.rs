//! PSBT encoding of an unsigned swap draft.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bitcoin::absolute::LockTime;
use bitcoin::key::Secp256k1;
use bitcoin::psbt::{Input, Psbt};
use bitcoin::secp256k1::{PublicKey, XOnlyPublicKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, CompressedPublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::account::RoleKey;
use crate::assemble::UnsignedTransactionDraft;
use crate::error::PsbtError;
use crate::sighash::SigHashMode;
use crate::utxo::parse_address;

/// Build a version 2 PSBT from `draft`.
///
/// Each input carries its witness UTXO and `SINGLE|ANYONECANPAY`. Nested segwit inputs get the
/// P2WPKH redeem script and taproot inputs the internal key, both derived from the role's
/// public key, which must reproduce the spent script.
pub fn to_psbt(draft: &UnsignedTransactionDraft) -> Result<Psbt, PsbtError> {
    let network = draft.network();

    let input = draft
        .inputs()
        .iter()
        .map(|input| TxIn {
            previous_output: input.source_output.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        })
        .collect();

    let output = draft
        .outputs()
        .iter()
        .map(|output| {
            let address = parse_address(network, &output.recipient_address).map_err(|e| {
                PsbtError::InvalidAddress {
                    network,
                    address: output.recipient_address.clone(),
                    message: e.to_string(),
                }
            })?;
            Ok(TxOut {
                value: Amount::from_sat(output.value_sats),
                script_pubkey: address.script_pubkey(),
            })
        })
        .collect::<Result<Vec<_>, PsbtError>>()?;

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    };

    let mut psbt = Psbt::from_unsigned_tx(tx)?;

    for (slot, input) in psbt.inputs.iter_mut().zip(draft.inputs()) {
        let source = &input.source_output;
        let role = draft
            .roles()
            .role_of(&source.owner_address)
            .ok_or_else(|| PsbtError::UnknownOwner {
                input_index: input.input_index,
                address: source.owner_address.clone(),
            })?;

        slot.witness_utxo = Some(TxOut {
            value: Amount::from_sat(source.value_sats),
            script_pubkey: source.script_pubkey.clone(),
        });
        slot.sighash_type = Some(SigHashMode::SINGLE_ANYONE_CAN_PAY.to_psbt_sighash_type());

        attach_spend_info(slot, draft.roles().get(role), &source.script_pubkey)?;
    }

    Ok(psbt)
}

fn attach_spend_info(
    slot: &mut Input,
    key: &RoleKey,
    script_pubkey: &ScriptBuf,
) -> Result<(), PsbtError> {
    let mismatch = || PsbtError::PublicKeyMismatch {
        role: key.role,
        address: key.address.clone(),
    };

    if script_pubkey.is_p2sh() {
        let redeem_script = ScriptBuf::new_p2wpkh(&compressed_key(key)?.wpubkey_hash());
        if ScriptBuf::new_p2sh(&redeem_script.script_hash()) != *script_pubkey {
            return Err(mismatch());
        }
        slot.redeem_script = Some(redeem_script);
    } else if script_pubkey.is_p2wpkh() {
        if ScriptBuf::new_p2wpkh(&compressed_key(key)?.wpubkey_hash()) != *script_pubkey {
            return Err(mismatch());
        }
    } else if script_pubkey.is_p2tr() {
        let internal_key = x_only_key(key)?;
        let secp = Secp256k1::verification_only();
        if ScriptBuf::new_p2tr(&secp, internal_key, None) != *script_pubkey {
            return Err(mismatch());
        }
        slot.tap_internal_key = Some(internal_key);
    } else {
        return Err(PsbtError::UnsupportedAddressType {
            role: key.role,
            address: key.address.clone(),
        });
    }

    Ok(())
}

fn compressed_key(key: &RoleKey) -> Result<CompressedPublicKey, PsbtError> {
    CompressedPublicKey::from_slice(&key.public_key).map_err(|e| PsbtError::InvalidPublicKey {
        role: key.role,
        message: e.to_string(),
    })
}

fn x_only_key(key: &RoleKey) -> Result<XOnlyPublicKey, PsbtError> {
    let parsed = if key.public_key.len() == 32 {
        XOnlyPublicKey::from_slice(&key.public_key)
    } else {
        PublicKey::from_slice(&key.public_key).map(|full| full.x_only_public_key().0)
    };

    parsed.map_err(|e| PsbtError::InvalidPublicKey {
        role: key.role,
        message: e.to_string(),
    })
}

#[must_use]
pub fn encode_psbt_base64(psbt: &Psbt) -> String {
    STANDARD.encode(psbt.serialize())
}

pub fn decode_psbt_base64(encoded: &str) -> Result<Psbt, PsbtError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| PsbtError::Base64(e.to_string()))?;
    Ok(Psbt::deserialize(&bytes)?)
}

#[cfg(test)]
mod tests {
    use bitcoin::TapSighashType;

    use super::*;
    use crate::account::{AddressRole, SigningRoles};
    use crate::assemble::{SwapRecipients, assemble};
    use crate::fixtures::{self, ORDINALS_PUBKEY};
    use crate::network::Network;
    use crate::utxo::SpendablePair;

    const NETWORK: Network = Network::Testnet;

    fn draft_for(roles: &SigningRoles) -> UnsignedTransactionDraft {
        let pair = SpendablePair {
            payment: vec![fixtures::utxo(NETWORK, &roles.payment.address, 1, 10_000)],
            ordinals: vec![fixtures::utxo(NETWORK, &roles.ordinals.address, 2, 1_000)],
        };
        assemble(NETWORK, roles, &pair, &SwapRecipients::between(roles)).expect("draft")
    }

    #[test]
    fn encodes_swap_with_role_specific_spend_info() {
        let roles = fixtures::roles(NETWORK);
        let draft = draft_for(&roles);

        let psbt = to_psbt(&draft).expect("psbt");

        assert_eq!(psbt.unsigned_tx.version, Version::TWO);
        assert_eq!(psbt.unsigned_tx.input.len(), 2);
        assert_eq!(psbt.unsigned_tx.output[0].value, Amount::from_sat(10_000));
        assert_eq!(psbt.unsigned_tx.output[1].value, Amount::from_sat(1_000));
        assert_eq!(
            psbt.unsigned_tx.input[1].previous_output,
            draft.inputs()[1].source_output.outpoint()
        );

        for input in &psbt.inputs {
            let sighash = input.sighash_type.expect("sighash set").taproot_hash_ty();
            assert_eq!(sighash.expect("valid"), TapSighashType::SinglePlusAnyoneCanPay);
            assert!(input.witness_utxo.is_some());
        }

        let payment = &psbt.inputs[0];
        assert!(payment.redeem_script.as_ref().is_some_and(|s| s.is_p2wpkh()));
        assert!(payment.tap_internal_key.is_none());

        let ordinals = &psbt.inputs[1];
        assert!(ordinals.redeem_script.is_none());
        assert_eq!(
            ordinals.tap_internal_key.map(|k| k.to_string()),
            Some(ORDINALS_PUBKEY.to_string())
        );
    }

    #[test]
    fn base64_encoding_is_standard_and_reversible() {
        let roles = fixtures::roles(NETWORK);
        let psbt = to_psbt(&draft_for(&roles)).expect("psbt");

        let encoded = encode_psbt_base64(&psbt);

        assert!(encoded.starts_with("cHNidP8"));
        assert_eq!(decode_psbt_base64(&encoded).expect("decode"), psbt);
        assert!(matches!(
            decode_psbt_base64("not base64!"),
            Err(PsbtError::Base64(_))
        ));
    }

    #[test]
    fn key_that_does_not_control_address_is_rejected() {
        let mut roles = fixtures::roles(NETWORK);
        roles.payment = RoleKey::from_hex(
            AddressRole::Payment,
            roles.payment.address,
            &format!("02{ORDINALS_PUBKEY}"),
        )
        .expect("key");

        let err = to_psbt(&draft_for(&roles)).expect_err("wrong payment key");

        assert!(matches!(
            err,
            PsbtError::PublicKeyMismatch {
                role: AddressRole::Payment,
                ..
            }
        ));
    }

    #[test]
    fn taproot_accepts_compressed_key_form() {
        let mut roles = fixtures::roles(NETWORK);
        roles.ordinals = RoleKey::from_hex(
            AddressRole::Ordinals,
            roles.ordinals.address,
            &format!("02{ORDINALS_PUBKEY}"),
        )
        .expect("key");

        let psbt = to_psbt(&draft_for(&roles)).expect("psbt");

        assert_eq!(
            psbt.inputs[1].tap_internal_key.map(|k| k.to_string()),
            Some(ORDINALS_PUBKEY.to_string())
        );
    }
}
