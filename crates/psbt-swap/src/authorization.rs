//! Per-signer authorization of draft inputs.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::assemble::UnsignedTransactionDraft;
use crate::error::AuthorizationError;
use crate::sighash::SigHashMode;

/// Inputs one address is asked to sign, and under which signature-hash flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningAuthorization {
    pub signer_address: String,
    pub input_indexes: BTreeSet<u32>,
    pub sig_hash: SigHashMode,
}

/// Group the draft's inputs by owning address, in order of first appearance.
///
/// Every input ends up in exactly one authorization, always with `SINGLE|ANYONECANPAY`.
/// An input whose owner matches neither role aborts the whole request.
pub fn build_authorizations(
    draft: &UnsignedTransactionDraft,
) -> Result<Vec<SigningAuthorization>, AuthorizationError> {
    let roles = draft.roles();
    let mut authorizations: Vec<SigningAuthorization> = Vec::new();
    let mut seen = HashSet::new();

    for input in draft.inputs() {
        let owner = &input.source_output.owner_address;

        if roles.role_of(owner).is_none() {
            error!(
                input_index = input.input_index,
                owner_address = %owner,
                "input owner matches no signing role"
            );
            return Err(AuthorizationError::OwnershipMismatch {
                input_index: input.input_index,
                owner_address: owner.clone(),
            });
        }

        if !seen.insert(input.input_index) {
            error!(input_index = input.input_index, "input authorized twice");
            return Err(AuthorizationError::DoubleAuthorized {
                input_index: input.input_index,
            });
        }

        match authorizations
            .iter_mut()
            .find(|authorization| &authorization.signer_address == owner)
        {
            Some(authorization) => {
                authorization.input_indexes.insert(input.input_index);
            }
            None => authorizations.push(SigningAuthorization {
                signer_address: owner.clone(),
                input_indexes: BTreeSet::from([input.input_index]),
                sig_hash: SigHashMode::SINGLE_ANYONE_CAN_PAY,
            }),
        }
    }

    Ok(authorizations)
}
