use crate::error::ChainError;
use crate::transaction::{Amount, Transaction};
use std::collections::BTreeMap;

/// Net balance change per account id.
pub type BalanceDeltas = BTreeMap<String, Amount>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPolicy {
    /// Settle the whole batch or nothing. Only aggregate net deltas are
    /// checked against balances, once every transaction has been tallied.
    AllOrNothing,
    /// Walk the batch in order and drop any transaction that would leave its
    /// sender's running net delta larger than the sender's balance.
    DropRejected,
}

/// Outcome of settling a batch, not yet applied to any account.
#[derive(Debug, Clone, Default)]
pub struct SettlementPlan {
    pub accepted: Vec<Transaction>,
    pub deltas: BalanceDeltas,
    pub rejected: Vec<(Transaction, ChainError)>,
}

fn underfunded(account: &str, balance: Amount, delta: Amount) -> ChainError {
    ChainError::UnderfundedTransaction(format!(
        "{} has balance {} but a net change of {}",
        account, balance, delta
    ))
}

/// `true` when `balance + delta` stays non-negative (and representable).
fn covers(balance: Amount, delta: Amount) -> bool {
    balance.checked_add(delta).map_or(false, |after| after >= 0)
}

/// Computes the net effect of `pending` against `balances` (a snapshot of
/// live balances) under `policy`. Nothing is mutated; the caller commits
/// `deltas` once the block is sealed.
///
/// With [`SettlementPolicy::AllOrNothing`] the first problem found is
/// returned as the error. With [`SettlementPolicy::DropRejected`] problems
/// are recorded in `rejected` and the call always succeeds.
pub fn settle(
    pending: &[Transaction],
    balances: &BTreeMap<String, Amount>,
    policy: SettlementPolicy,
) -> Result<SettlementPlan, ChainError> {
    let mut plan = SettlementPlan::default();

    for transaction in pending {
        match stage(transaction, balances, &plan.deltas, policy) {
            Ok((sender_delta, receiver_delta)) => {
                plan.deltas
                    .insert(transaction.sender().to_string(), sender_delta);
                if let Some(receiver_delta) = receiver_delta {
                    plan.deltas
                        .insert(transaction.receiver().to_string(), receiver_delta);
                }
                plan.accepted.push(transaction.clone());
            }
            Err(reason) => match policy {
                SettlementPolicy::AllOrNothing => return Err(reason),
                SettlementPolicy::DropRejected => plan.rejected.push((transaction.clone(), reason)),
            },
        }
    }

    if policy == SettlementPolicy::AllOrNothing {
        for (account, delta) in &plan.deltas {
            let balance = balances.get(account).copied().unwrap_or(0);
            if !covers(balance, *delta) {
                return Err(underfunded(account, balance, *delta));
            }
        }
    }

    Ok(plan)
}

/// Checks one transaction against the running table and returns the new
/// sender delta and, unless sender and receiver coincide, the new receiver
/// delta. A self-transfer is checked as a debit but nets to no change.
fn stage(
    transaction: &Transaction,
    balances: &BTreeMap<String, Amount>,
    deltas: &BalanceDeltas,
    policy: SettlementPolicy,
) -> Result<(Amount, Option<Amount>), ChainError> {
    let sender = transaction.sender();
    let receiver = transaction.receiver();
    let value = transaction.value();

    let sender_balance = *balances
        .get(sender)
        .ok_or_else(|| ChainError::UnknownAccount(sender.to_string()))?;
    if !balances.contains_key(receiver) {
        return Err(ChainError::UnknownAccount(receiver.to_string()));
    }

    let sender_delta = deltas
        .get(sender)
        .copied()
        .unwrap_or(0)
        .checked_sub(value)
        .ok_or_else(|| underfunded(sender, sender_balance, Amount::MIN))?;

    if policy == SettlementPolicy::DropRejected && !covers(sender_balance, sender_delta) {
        return Err(underfunded(sender, sender_balance, sender_delta));
    }

    if sender == receiver {
        return Ok((sender_delta + value, None));
    }

    let receiver_delta = deltas
        .get(receiver)
        .copied()
        .unwrap_or(0)
        .checked_add(value)
        .ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Balance of {} would overflow", receiver))
        })?;
    Ok((sender_delta, Some(receiver_delta)))
}
