//! Unsigned swap assembly.
//!
//! A swap spends exactly one output from each role and pays each value to the other side:
//!
//! | index | input                 | output                                   |
//! |-------|-----------------------|------------------------------------------|
//! | 0     | selected payment UTXO | payment value (minus fee) to `ordinals_recipient` |
//! | 1     | selected ordinals UTXO| ordinals value to `payment_recipient`    |
//!
//! The ordering is fixed here and nowhere else; authorization indexes and the
//! `SINGLE|ANYONECANPAY` output pairing both depend on it.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::{AddressRole, SigningRoles};
use crate::error::{AssembleError, EmptyAddress, InsufficientFunds};
use crate::network::Network;
use crate::utxo::{SpendablePair, UnspentOutput, parse_address};

/// Chooses which output of a role's UTXO set is spent.
pub trait SelectionPolicy {
    fn select<'a>(
        &self,
        role: AddressRole,
        candidates: &'a [UnspentOutput],
    ) -> Option<&'a UnspentOutput>;
}

/// Spend whatever the source listed first.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl SelectionPolicy for FirstAvailable {
    fn select<'a>(
        &self,
        _role: AddressRole,
        candidates: &'a [UnspentOutput],
    ) -> Option<&'a UnspentOutput> {
        candidates.first()
    }
}

/// Spend the largest output; the earliest listed one wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestValue;

impl SelectionPolicy for LargestValue {
    fn select<'a>(
        &self,
        _role: AddressRole,
        candidates: &'a [UnspentOutput],
    ) -> Option<&'a UnspentOutput> {
        candidates
            .iter()
            .min_by_key(|candidate| Reverse(candidate.value_sats))
    }
}

/// Where each side of the swap is paid, plus an optional fee taken from output 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecipients {
    /// Receives the payment input's value.
    pub ordinals_recipient: String,
    /// Receives the ordinals input's value.
    pub payment_recipient: String,
    #[serde(default)]
    pub fee_sats: u64,
}

impl SwapRecipients {
    /// Swap the two outputs between the wallet's own addresses.
    #[must_use]
    pub fn between(roles: &SigningRoles) -> Self {
        Self {
            ordinals_recipient: roles.ordinals.address.clone(),
            payment_recipient: roles.payment.address.clone(),
            fee_sats: 0,
        }
    }

    #[must_use]
    pub const fn with_fee(mut self, fee_sats: u64) -> Self {
        self.fee_sats = fee_sats;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub source_output: UnspentOutput,
    pub input_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub recipient_address: String,
    pub value_sats: u64,
    /// Pays back to the wallet's payment address.
    pub is_change: bool,
}

/// Ordered inputs and outputs of a swap before any signature exists.
///
/// Only built through [`UnsignedTransactionDraft::new`], which checks the totals; it is
/// serialized for display but never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransactionDraft {
    network: Network,
    roles: SigningRoles,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl UnsignedTransactionDraft {
    /// Index `sources` densely from 0 in the given order.
    ///
    /// Fails when the outputs spend more than the inputs provide.
    pub fn new(
        network: Network,
        roles: SigningRoles,
        sources: Vec<UnspentOutput>,
        outputs: Vec<TransactionOutput>,
    ) -> Result<Self, AssembleError> {
        let inputs = sources
            .into_iter()
            .zip(0_u32..)
            .map(|(source_output, input_index)| TransactionInput {
                source_output,
                input_index,
            })
            .collect();

        let draft = Self {
            network,
            roles,
            inputs,
            outputs,
        };

        let inputs_sats = draft.input_total_sats()?;
        let outputs_sats = draft.output_total_sats()?;
        if outputs_sats > inputs_sats {
            return Err(AssembleError::OutputsExceedInputs {
                inputs_sats,
                outputs_sats,
            });
        }

        Ok(draft)
    }

    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    #[must_use]
    pub const fn roles(&self) -> &SigningRoles {
        &self.roles
    }

    #[must_use]
    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn input_total_sats(&self) -> Result<u64, AssembleError> {
        self.inputs
            .iter()
            .try_fold(0_u64, |acc, input| {
                acc.checked_add(input.source_output.value_sats)
            })
            .ok_or(AssembleError::ValueOverflow("inputs"))
    }

    pub fn output_total_sats(&self) -> Result<u64, AssembleError> {
        self.outputs
            .iter()
            .try_fold(0_u64, |acc, output| acc.checked_add(output.value_sats))
            .ok_or(AssembleError::ValueOverflow("outputs"))
    }

    /// Difference between inputs and outputs, never negative for a constructed draft.
    pub fn implicit_fee_sats(&self) -> Result<u64, AssembleError> {
        Ok(self
            .input_total_sats()?
            .saturating_sub(self.output_total_sats()?))
    }
}

/// Assemble a swap spending the first available output of each role.
pub fn assemble(
    network: Network,
    roles: &SigningRoles,
    spendable: &SpendablePair,
    recipients: &SwapRecipients,
) -> Result<UnsignedTransactionDraft, AssembleError> {
    assemble_with_policy(network, roles, spendable, recipients, &FirstAvailable)
}

pub fn assemble_with_policy<P>(
    network: Network,
    roles: &SigningRoles,
    spendable: &SpendablePair,
    recipients: &SwapRecipients,
    policy: &P,
) -> Result<UnsignedTransactionDraft, AssembleError>
where
    P: SelectionPolicy + ?Sized,
{
    let payment = policy.select(AddressRole::Payment, &spendable.payment);
    let ordinals = policy.select(AddressRole::Ordinals, &spendable.ordinals);

    let (payment, ordinals) = match (payment, ordinals) {
        (Some(payment), Some(ordinals)) => (payment, ordinals),
        (payment, ordinals) => {
            let empty = [
                (AddressRole::Payment, payment.is_none()),
                (AddressRole::Ordinals, ordinals.is_none()),
            ]
            .into_iter()
            .filter(|(_, is_empty)| *is_empty)
            .map(|(role, _)| EmptyAddress {
                role,
                address: roles.get(role).address.clone(),
            })
            .collect();

            return Err(InsufficientFunds { empty }.into());
        }
    };

    for recipient in [&recipients.ordinals_recipient, &recipients.payment_recipient] {
        parse_address(network, recipient).map_err(|e| AssembleError::InvalidRecipient {
            network,
            address: recipient.clone(),
            message: e.to_string(),
        })?;
    }

    let to_ordinals_recipient = payment
        .value_sats
        .checked_sub(recipients.fee_sats)
        .ok_or(AssembleError::FeeExceedsInput {
            fee_sats: recipients.fee_sats,
            available_sats: payment.value_sats,
        })?;

    let outputs = vec![
        TransactionOutput {
            recipient_address: recipients.ordinals_recipient.clone(),
            value_sats: to_ordinals_recipient,
            is_change: recipients.ordinals_recipient == roles.payment.address,
        },
        TransactionOutput {
            recipient_address: recipients.payment_recipient.clone(),
            value_sats: ordinals.value_sats,
            is_change: recipients.payment_recipient == roles.payment.address,
        },
    ];

    let draft = UnsignedTransactionDraft::new(
        network,
        roles.clone(),
        vec![payment.clone(), ordinals.clone()],
        outputs,
    )?;

    debug!(
        %network,
        payment_outpoint = %payment.outpoint(),
        ordinals_outpoint = %ordinals.outpoint(),
        fee_sats = recipients.fee_sats,
        "assembled swap draft"
    );

    Ok(draft)
}
