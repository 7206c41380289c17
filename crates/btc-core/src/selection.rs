use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::AccountContext;
use crate::error::BtcError;
use crate::fee::{estimate_size, input_size};
use crate::utxo::Utxo;

/// Default dust threshold in satoshis: smaller change is folded into the fee.
pub const DEFAULT_DUST_THRESHOLD: u64 = 1_000;
/// Default minimum payment in satoshis.
pub const DEFAULT_MIN_AMOUNT: u64 = 546;

fn default_dust_threshold() -> u64 {
    DEFAULT_DUST_THRESHOLD
}

fn default_min_amount() -> u64 {
    DEFAULT_MIN_AMOUNT
}

/// Tunables for coin selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: u64,
    #[serde(default = "default_min_amount")]
    pub min_amount: u64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            min_amount: DEFAULT_MIN_AMOUNT,
        }
    }
}

/// Outcome of coin selection. `required` keeps caller order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub required: Vec<Utxo>,
    pub amount: u64,
    /// Miner fee: inputs minus outputs.
    pub fee: u64,
    /// Zero means no change output.
    pub change: u64,
}

impl Selection {
    pub fn total_input(&self) -> u64 {
        self.required.iter().map(|u| u.amount).sum()
    }
}

/// Chooses inputs for one payment to `destination` under `context`.
#[derive(Debug, Clone, Copy)]
pub struct CoinSelector<'a> {
    context: &'a AccountContext,
    destination: &'a str,
    policy: SelectionPolicy,
}

impl<'a> CoinSelector<'a> {
    pub fn new(context: &'a AccountContext, destination: &'a str, policy: SelectionPolicy) -> Self {
        Self {
            context,
            destination,
            policy,
        }
    }

    fn check_minimum(&self, amount: u64) -> Result<(), BtcError> {
        if amount < self.policy.min_amount {
            return Err(BtcError::TransactionTooSmall {
                amount,
                minimum: self.policy.min_amount,
            });
        }
        Ok(())
    }

    fn fee_for(&self, utxos: &[Utxo], rate: u64, with_change: bool) -> Result<u64, BtcError> {
        let size = estimate_size(utxos, self.destination, self.context, with_change)?;
        Ok(rate.saturating_mul(size))
    }

    fn insufficient(needed: u64, available: u64) -> BtcError {
        warn!(needed, available, "insufficient funds for transaction");
        BtcError::InsufficientFunds { needed, available }
    }

    /// Pick UTXOs in caller order until `amount` plus a `rate` sat/vbyte fee
    /// is covered. Surplus too small to pay for its own output is folded into
    /// the fee.
    pub fn select_with_rate(
        &self,
        candidates: &[Utxo],
        amount: u64,
        rate: u64,
    ) -> Result<Selection, BtcError> {
        self.check_minimum(amount)?;

        let mut required: Vec<Utxo> = Vec::new();
        let mut total: u64 = 0;
        let mut fee: u64 = 0;
        let mut change: u64 = 0;

        for utxo in candidates {
            let fee_per_input = rate.saturating_mul(input_size(utxo)?);
            if amount.saturating_add(fee) <= total && !required.is_empty() {
                break;
            }

            required.push(utxo.clone());
            total = total.saturating_add(utxo.amount);
            fee = self.fee_for(&required, rate, false)?;

            let Some(surplus) = total.checked_sub(amount.saturating_add(fee)) else {
                continue;
            };
            if surplus == 0 {
                debug!(inputs = required.len(), fee, "exact match, no change");
                break;
            }
            if surplus < fee_per_input.saturating_add(self.policy.dust_threshold) {
                fee += surplus;
                debug!(inputs = required.len(), fee, surplus, "surplus folded into fee");
                break;
            }

            let fee_with_change = self.fee_for(&required, rate, true)?;
            match total.checked_sub(amount.saturating_add(fee_with_change)) {
                Some(remaining) => {
                    fee = fee_with_change;
                    change = remaining;
                    debug!(inputs = required.len(), fee, change, "selected with change");
                }
                None => {
                    fee += surplus;
                    debug!(inputs = required.len(), fee, "change unaffordable, folded into fee");
                }
            }
            break;
        }

        let needed = amount.saturating_add(fee);
        if required.is_empty() || total < needed {
            return Err(Self::insufficient(needed, total));
        }
        Ok(Selection {
            required,
            amount,
            fee,
            change,
        })
    }

    /// Pick UTXOs in caller order until `amount + flat_fee` is covered.
    /// Surplus below the dust threshold goes to the miner.
    pub fn select_with_flat_fee(
        &self,
        candidates: &[Utxo],
        amount: u64,
        flat_fee: u64,
    ) -> Result<Selection, BtcError> {
        self.check_minimum(amount)?;
        let needed = amount.saturating_add(flat_fee);

        let mut required: Vec<Utxo> = Vec::new();
        let mut total: u64 = 0;
        for utxo in candidates {
            if total >= needed && !required.is_empty() {
                break;
            }
            required.push(utxo.clone());
            total = total.saturating_add(utxo.amount);
        }

        if required.is_empty() || total < needed {
            return Err(Self::insufficient(needed, total));
        }

        let surplus = total - needed;
        let (fee, change) = if surplus >= self.policy.dust_threshold {
            (flat_fee, surplus)
        } else {
            (flat_fee + surplus, 0)
        };
        debug!(inputs = required.len(), fee, change, "flat-fee selection");
        Ok(Selection {
            required,
            amount,
            fee,
            change,
        })
    }

    /// Spend every candidate to the destination with no change output.
    pub fn select_send_max(&self, candidates: &[Utxo], rate: u64) -> Result<Selection, BtcError> {
        if candidates.is_empty() {
            return Err(Self::insufficient(0, 0));
        }
        let required = candidates.to_vec();
        let total = required.iter().fold(0u64, |acc, u| acc.saturating_add(u.amount));
        let fee = self.fee_for(&required, rate, false)?;
        let amount = total
            .checked_sub(fee)
            .ok_or_else(|| Self::insufficient(fee, total))?;
        self.check_minimum(amount)?;
        debug!(inputs = required.len(), amount, fee, "send-max selection");
        Ok(Selection {
            required,
            amount,
            fee,
            change: 0,
        })
    }
}
