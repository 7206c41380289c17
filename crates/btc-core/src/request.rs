use bitcoin::Sequence;
use serde::{Deserialize, Serialize};

use crate::address::OutputKind;
use crate::context::AccountContext;
use crate::error::BtcError;
use crate::path::DerivationPath;
use crate::selection::{CoinSelector, Selection, SelectionPolicy};
use crate::utxo::Utxo;

/// Replace-by-fee signalling for every input of the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RbfOption {
    MustBeRbf,
    MustNotBeRbf,
    /// Signal RBF only when spending an unconfirmed output.
    AllowedToBeRbf,
}

impl RbfOption {
    pub fn sequence_for(self, required: &[Utxo]) -> Sequence {
        match self {
            RbfOption::MustBeRbf => Sequence::ENABLE_RBF_NO_LOCKTIME,
            RbfOption::MustNotBeRbf => Sequence::MAX,
            RbfOption::AllowedToBeRbf => {
                if required.iter().any(|u| !u.is_confirmed) {
                    Sequence::ENABLE_RBF_NO_LOCKTIME
                } else {
                    Sequence::MAX
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeeStrategy {
    Rate { amount: u64, rate: u64 },
    Flat { amount: u64, fee: u64 },
    SendMax { rate: u64 },
}

/// A payment being assembled. Collects candidate UTXOs, then runs coin
/// selection once in [`finalize`](Self::finalize).
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    context: AccountContext,
    destination: String,
    strategy: FeeStrategy,
    change_path: Option<DerivationPath>,
    block_height: u32,
    rbf: RbfOption,
    policy: SelectionPolicy,
    utxos: Vec<Utxo>,
}

impl TransactionRequest {
    /// Pay `amount` with a fee of `rate` sat/vbyte, returning change to `change_path`.
    pub fn rate_based(
        context: AccountContext,
        destination: impl Into<String>,
        amount: u64,
        rate: u64,
        change_path: DerivationPath,
        block_height: u32,
        rbf: RbfOption,
    ) -> Self {
        Self::new(
            context,
            destination.into(),
            FeeStrategy::Rate { amount, rate },
            Some(change_path),
            block_height,
            rbf,
        )
    }

    /// Pay `amount` with a fixed total `fee`. Signals RBF by default.
    pub fn flat_fee(
        context: AccountContext,
        destination: impl Into<String>,
        amount: u64,
        fee: u64,
        change_path: DerivationPath,
        block_height: u32,
    ) -> Self {
        Self::new(
            context,
            destination.into(),
            FeeStrategy::Flat { amount, fee },
            Some(change_path),
            block_height,
            RbfOption::MustBeRbf,
        )
    }

    /// Sweep every added UTXO to `destination`. Never signals RBF by default.
    pub fn send_max(
        context: AccountContext,
        destination: impl Into<String>,
        rate: u64,
        block_height: u32,
    ) -> Self {
        Self::new(
            context,
            destination.into(),
            FeeStrategy::SendMax { rate },
            None,
            block_height,
            RbfOption::MustNotBeRbf,
        )
    }

    fn new(
        context: AccountContext,
        destination: String,
        strategy: FeeStrategy,
        change_path: Option<DerivationPath>,
        block_height: u32,
        rbf: RbfOption,
    ) -> Self {
        Self {
            context,
            destination,
            strategy,
            change_path,
            block_height,
            rbf,
            policy: SelectionPolicy::default(),
            utxos: Vec::new(),
        }
    }

    pub fn with_rbf(mut self, rbf: RbfOption) -> Self {
        self.rbf = rbf;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_rbf(&mut self, rbf: RbfOption) {
        self.rbf = rbf;
    }

    pub fn add_utxo(&mut self, utxo: Utxo) {
        self.utxos.push(utxo);
    }

    pub fn context(&self) -> &AccountContext {
        &self.context
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn candidate_count(&self) -> usize {
        self.utxos.len()
    }

    /// Run coin selection. Consumes the request.
    pub fn finalize(self) -> Result<FinalizedTransaction, BtcError> {
        OutputKind::classify(&self.destination, &self.context)?;
        let selector = CoinSelector::new(&self.context, &self.destination, self.policy);
        let selection = match self.strategy {
            FeeStrategy::Rate { amount, rate } => {
                selector.select_with_rate(&self.utxos, amount, rate)?
            }
            FeeStrategy::Flat { amount, fee } => {
                selector.select_with_flat_fee(&self.utxos, amount, fee)?
            }
            FeeStrategy::SendMax { rate } => selector.select_send_max(&self.utxos, rate)?,
        };
        let Selection {
            required,
            amount,
            fee,
            change,
        } = selection;
        Ok(FinalizedTransaction {
            context: self.context,
            destination: self.destination,
            required,
            amount,
            fee,
            change,
            change_path: self.change_path,
            block_height: self.block_height,
            rbf: self.rbf,
        })
    }
}

/// Coin selection result plus everything needed to build and sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    pub context: AccountContext,
    pub destination: String,
    pub required: Vec<Utxo>,
    pub amount: u64,
    pub fee: u64,
    pub change: u64,
    pub change_path: Option<DerivationPath>,
    pub block_height: u32,
    pub rbf: RbfOption,
}

impl FinalizedTransaction {
    pub fn utxo_count(&self) -> usize {
        self.required.len()
    }

    pub fn required_utxo_at(&self, index: usize) -> Result<&Utxo, BtcError> {
        self.required.get(index).ok_or_else(|| {
            BtcError::IndexOutOfBounds(format!(
                "utxo {index} of {} required",
                self.required.len()
            ))
        })
    }

    pub fn should_add_change(&self) -> bool {
        self.change > 0
    }

    pub fn sequence(&self) -> Sequence {
        self.rbf.sequence_for(&self.required)
    }
}
