use crate::blockchain::core::chain::{AccountRegistry, Block, Blockchain};
use crate::error::{ChainError, IntegrityViolation};
use crate::transaction::{Amount, Transaction};
use std::collections::HashMap;
use tracing::{info, warn};

/// Every block must name the recomputed hash of the block before it.
pub fn validate_hash_links(chain: &[Block]) -> Result<(), ChainError> {
    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.previous_block_hash.as_deref() != Some(previous.hash_block()?.as_str()) {
            return Err(IntegrityViolation::BrokenHashLink {
                index: current.index,
            }
            .into());
        }
    }
    Ok(())
}

/// Every block after the first must carry its true content hash, and that
/// hash must be below the target stored on the block itself.
pub fn validate_proof_of_work(chain: &[Block]) -> Result<(), ChainError> {
    for block in chain.iter().skip(1) {
        let computed = block.hash_block()?;
        if computed != block.block_hash {
            return Err(IntegrityViolation::StaleBlockHash {
                index: block.index,
                stored: block.block_hash.clone(),
                computed,
            }
            .into());
        }

        let target = block
            .hash_target
            .as_ref()
            .ok_or(IntegrityViolation::MissingHashTarget { index: block.index })?;
        if !target.is_met_by_hex(&block.block_hash) {
            return Err(IntegrityViolation::HashAboveTarget { index: block.index }.into());
        }
    }
    Ok(())
}

/// Replays every transaction from the accounts' initial balances, in block
/// index order and by nonce within a block, failing if any sender dips below
/// zero. Live balances are not consulted.
pub fn validate_balances(chain: &[Block], accounts: &AccountRegistry) -> Result<(), ChainError> {
    let initial: Vec<(String, Amount)> = accounts
        .iter()
        .map(|(id, account)| (id.clone(), account.read().initial_balance()))
        .collect();
    let mut balances: HashMap<&str, Amount> = initial
        .iter()
        .map(|(id, balance)| (id.as_str(), *balance))
        .collect();

    let mut blocks: Vec<&Block> = chain.iter().collect();
    blocks.sort_by_key(|block| block.index);

    for block in blocks {
        let mut transactions: Vec<&Transaction> = block.transactions.iter().collect();
        transactions.sort_by_key(|tx| tx.nonce());

        for tx in transactions {
            let receiver = balances.entry(tx.receiver()).or_insert(0);
            *receiver = receiver.saturating_add(tx.value());

            let sender = balances.entry(tx.sender()).or_insert(0);
            *sender = sender.saturating_sub(tx.value());
            if *sender < 0 {
                return Err(IntegrityViolation::NegativeBalance {
                    index: block.index,
                    account: tx.sender().to_string(),
                    balance: *sender,
                }
                .into());
            }
        }
    }
    Ok(())
}

impl Blockchain {
    /// Runs the hash-link, proof-of-work and balance-replay passes in that
    /// order, stopping at the first failure.
    pub fn check_integrity(&self) -> Result<(), ChainError> {
        validate_hash_links(self.chain())?;
        info!("chain hash links are valid");
        validate_proof_of_work(self.chain())?;
        info!("block hashes meet their targets");
        validate_balances(self.chain(), self.accounts())?;
        info!("account balances replay without going negative");
        Ok(())
    }

    /// `true` when all three validation passes succeed. Never modifies the
    /// chain.
    pub fn validate_blockchain(&self) -> bool {
        match self.check_integrity() {
            Ok(()) => true,
            Err(e) => {
                warn!("blockchain is invalid: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BlockPreimage;
    use crate::test_utils::{test_account, LIGHT_TARGET};
    use std::sync::Arc;

    fn funded_ledger() -> Blockchain {
        let mut ledger = Blockchain::new(LIGHT_TARGET.parse().unwrap()).unwrap();
        let a = test_account("A", 100, 0);
        let b = test_account("B", 100, 1);
        ledger.add_account(Arc::clone(&a)).unwrap();
        ledger.add_account(Arc::clone(&b)).unwrap();

        let tx = a.write().create_transaction("B", 30, "").unwrap();
        assert!(ledger.add_transaction(tx));
        ledger.create_new_block().unwrap();
        let tx = b.write().create_transaction("A", 10, "").unwrap();
        assert!(ledger.add_transaction(tx));
        ledger.create_new_block().unwrap();
        ledger
    }

    fn violation(ledger: &Blockchain) -> IntegrityViolation {
        match ledger.check_integrity() {
            Err(ChainError::ChainIntegrityViolation(v)) => v,
            other => panic!("expected an integrity violation, got {:?}", other),
        }
    }

    #[test]
    fn test_fresh_chains_are_valid() {
        let ledger = Blockchain::new(LIGHT_TARGET.parse().unwrap()).unwrap();
        assert!(ledger.validate_blockchain());
        assert!(funded_ledger().validate_blockchain());
    }

    #[test]
    fn test_tampered_nonce_is_detected() {
        let mut ledger = funded_ledger();
        let nonce = ledger.chain()[1].nonce.unwrap();
        ledger.chain_mut()[1].nonce = Some(nonce + 1);
        assert!(matches!(violation(&ledger), IntegrityViolation::BrokenHashLink { index: 2 }));
    }

    #[test]
    fn test_tampered_last_block_fails_proof_of_work() {
        let mut ledger = funded_ledger();
        ledger.chain_mut()[2].transactions.clear();
        assert!(matches!(violation(&ledger), IntegrityViolation::StaleBlockHash { index: 2, .. }));
    }

    #[test]
    fn test_tampered_previous_hash_is_detected() {
        let mut ledger = funded_ledger();
        ledger.chain_mut()[2].previous_block_hash = Some("00".repeat(32));
        assert!(!ledger.validate_blockchain());
    }

    #[test]
    fn test_forged_low_effort_hash_fails_target_check() {
        let mut ledger = funded_ledger();
        let tip = ledger.chain()[2].clone();
        let target = tip.hash_target.clone().unwrap();

        // Pick a nonce whose honest hash misses the stored target.
        let preimage = BlockPreimage::new(
            tip.index,
            &tip.transactions,
            tip.previous_block_hash.as_deref(),
        )
        .unwrap();
        let nonce = (0..)
            .find(|n| !target.is_met_by(&preimage.digest(Some(*n))))
            .unwrap();

        let tip = &mut ledger.chain_mut()[2];
        tip.nonce = Some(nonce);
        tip.block_hash = preimage.hash_hex(Some(nonce));
        assert!(matches!(violation(&ledger), IntegrityViolation::HashAboveTarget { index: 2 }));
    }

    #[test]
    fn test_missing_target_is_detected() {
        let mut ledger = funded_ledger();
        ledger.chain_mut()[2].hash_target = None;
        assert!(matches!(violation(&ledger), IntegrityViolation::MissingHashTarget { index: 2 }));
    }

    #[test]
    fn test_balance_replay_uses_initial_balances() {
        let ledger = funded_ledger();
        // Live balances are irrelevant to the replay.
        ledger.account("A").unwrap().write().debit(1_000);
        assert!(validate_balances(ledger.chain(), ledger.accounts()).is_ok());
    }

    #[test]
    fn test_balance_replay_catches_overspend() {
        let ledger = funded_ledger();
        let mut chain = ledger.chain().to_vec();
        let overspend = chain[2].transactions[0].clone();
        for _ in 0..20 {
            chain[2].transactions.push(overspend.clone());
        }
        let err = validate_balances(&chain, ledger.accounts()).unwrap_err();
        assert!(matches!(
            err,
            ChainError::ChainIntegrityViolation(IntegrityViolation::NegativeBalance { index: 2, ref account, .. })
                if account == "B"
        ));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let ledger = funded_ledger();
        assert_eq!(ledger.validate_blockchain(), ledger.validate_blockchain());
        assert!(ledger.validate_blockchain());
    }
}
