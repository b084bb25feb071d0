use crate::account::{Account, SharedAccount};
use crate::canonical::to_canonical_vec;
use crate::config::LedgerConfig;
use crate::crypto::DEFAULT_KEY_BITS;
use crate::error::ChainError;
use crate::miner::Miner;
use crate::transaction::{Amount, Transaction};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::state::{settle, SettlementPlan, SettlementPolicy};

/// Stands in for the previous-block hash of the genesis block, so every
/// ledger starts from the same block.
pub const GENESIS_MESSAGE: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

pub type Sha256Hash = [u8; 32];

/// Accounts known to a ledger, keyed by id.
pub type AccountRegistry = BTreeMap<String, SharedAccount>;

/// Difficulty bound. A block hash qualifies when, read as an unsigned
/// integer, it is strictly less than the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashTarget {
    hex: String,
    value: BigUint,
}

impl HashTarget {
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Compares a raw big-endian digest against the target.
    pub fn is_met_by(&self, digest: &[u8]) -> bool {
        BigUint::from_bytes_be(digest) < self.value
    }

    /// Compares a hex-encoded hash against the target. Unparsable hashes
    /// never qualify.
    pub fn is_met_by_hex(&self, hash_hex: &str) -> bool {
        parse_hex(hash_hex).map_or(false, |hash| hash < self.value)
    }
}

fn parse_hex(text: &str) -> Option<BigUint> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
}

impl FromStr for HashTarget {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_hex(s).ok_or_else(|| {
            ChainError::InvalidHashTarget(format!("'{}' is not a hexadecimal number", s))
        })?;
        Ok(HashTarget {
            hex: s.to_string(),
            value,
        })
    }
}

impl TryFrom<String> for HashTarget {
    type Error = ChainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashTarget> for String {
    fn from(target: HashTarget) -> Self {
        target.hex
    }
}

impl fmt::Display for HashTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Canonical bytes of a block with the nonce left open. Everything except the
/// nonce is serialized once; the SHA-256 state over the prefix is reused for
/// each candidate.
///
/// The hashed document is `{"index": .., "nonce": .., "previous_block_hash": ..,
/// "transactions": [..]}` in canonical form.
#[derive(Clone)]
pub struct BlockPreimage {
    prefix_state: Sha256,
    suffix: Vec<u8>,
}

impl BlockPreimage {
    pub fn new(
        index: u64,
        transactions: &[Transaction],
        previous_block_hash: Option<&str>,
    ) -> Result<Self, ChainError> {
        let prefix = format!("{{\"index\": {}, \"nonce\": ", index);

        let mut suffix = b", \"previous_block_hash\": ".to_vec();
        suffix.extend(to_canonical_vec(&previous_block_hash)?);
        suffix.extend_from_slice(b", \"transactions\": ");
        suffix.extend(to_canonical_vec(transactions)?);
        suffix.push(b'}');

        Ok(BlockPreimage {
            prefix_state: Sha256::new_with_prefix(prefix.as_bytes()),
            suffix,
        })
    }

    pub fn digest(&self, nonce: Option<u64>) -> Sha256Hash {
        let mut hasher = self.prefix_state.clone();
        match nonce {
            Some(n) => hasher.update(n.to_string().as_bytes()),
            None => hasher.update(b"null"),
        }
        hasher.update(&self.suffix);
        hasher.finalize().into()
    }

    pub fn hash_hex(&self, nonce: Option<u64>) -> String {
        hex::encode(self.digest(nonce))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    /// Content hash of the prior block; the genesis block carries
    /// [`GENESIS_MESSAGE`] here.
    pub previous_block_hash: Option<String>,
    /// Target in force when this block was sealed. `None` only for genesis.
    pub hash_target: Option<HashTarget>,
    /// Proof-of-work nonce. `None` only for genesis.
    pub nonce: Option<u64>,
    /// Hash recorded at sealing time; validation recomputes and compares.
    pub block_hash: String,
}

impl Block {
    /// The fixed first block: no transactions, no target, not mined.
    pub fn genesis() -> Result<Self, ChainError> {
        let previous_block_hash = Some(GENESIS_MESSAGE.to_string());
        let block_hash =
            BlockPreimage::new(0, &[], previous_block_hash.as_deref())?.hash_hex(None);
        Ok(Block {
            index: 0,
            transactions: Vec::new(),
            previous_block_hash,
            hash_target: None,
            nonce: None,
            block_hash,
        })
    }

    /// Builds a block and searches for its proof of work.
    pub fn mine(
        index: u64,
        transactions: Vec<Transaction>,
        previous_block_hash: String,
        hash_target: HashTarget,
        miner: &Miner,
    ) -> Result<Self, ChainError> {
        let preimage = BlockPreimage::new(index, &transactions, Some(&previous_block_hash))?;
        let seal = miner.mine(&preimage, &hash_target)?;
        Ok(Block {
            index,
            transactions,
            previous_block_hash: Some(previous_block_hash),
            hash_target: Some(hash_target),
            nonce: Some(seal.nonce),
            block_hash: seal.block_hash,
        })
    }

    /// Recomputes the content hash from the current fields. Pure; gives the
    /// same bytes mining produced for unchanged fields.
    pub fn hash_block(&self) -> Result<String, ChainError> {
        let preimage = BlockPreimage::new(
            self.index,
            &self.transactions,
            self.previous_block_hash.as_deref(),
        )?;
        Ok(preimage.hash_hex(self.nonce))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// Current balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub id: String,
    pub balance: Amount,
}

/// The ledger: chain, pending pool, account registry and active difficulty.
pub struct Blockchain {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    accounts: AccountRegistry,
    hash_target: HashTarget,
    miner: Miner,
    default_balance: Amount,
    key_bits: usize,
}

impl Blockchain {
    /// Creates a ledger holding only the genesis block, mining sequentially.
    pub fn new(hash_target: HashTarget) -> Result<Self, ChainError> {
        Ok(Blockchain {
            chain: vec![Block::genesis()?],
            pending_transactions: Vec::new(),
            accounts: AccountRegistry::new(),
            hash_target,
            miner: Miner::sequential(),
            default_balance: crate::account::DEFAULT_BALANCE,
            key_bits: DEFAULT_KEY_BITS,
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ChainError> {
        config.validate()?;
        let mut blockchain = Self::new(config.ledger.hash_target.parse()?)?;
        blockchain.miner = Miner::from_config(&config.mining)?;
        blockchain.default_balance = config.ledger.default_balance;
        blockchain.key_bits = config.crypto.key_bits;
        Ok(blockchain)
    }

    pub fn with_miner(mut self, miner: Miner) -> Self {
        self.miner = miner;
        self
    }

    pub fn hash_target(&self) -> &HashTarget {
        &self.hash_target
    }

    /// Changes the difficulty for blocks sealed from now on. Sealed blocks
    /// keep the target they were mined against.
    pub fn set_hash_target(&mut self, hash_target: HashTarget) {
        info!(old = %self.hash_target, new = %hash_target, "hash target changed");
        self.hash_target = hash_target;
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Direct access to sealed blocks, bypassing every ledger rule. Only
    /// useful for exercising validation against a tampered chain.
    #[doc(hidden)]
    pub fn chain_mut(&mut self) -> &mut Vec<Block> {
        &mut self.chain
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn account(&self, id: &str) -> Option<SharedAccount> {
        self.accounts.get(id).cloned()
    }

    /// Registers an account. Ids are unique within a ledger.
    pub fn add_account(&mut self, account: SharedAccount) -> Result<(), ChainError> {
        let id = account.read().id().to_string();
        if self.accounts.contains_key(&id) {
            return Err(ChainError::DuplicateAccount(id));
        }
        info!(account = %id, balance = account.read().balance(), "registered account");
        self.accounts.insert(id, account);
        Ok(())
    }

    /// Creates an account with the configured default balance and key size,
    /// registers it and returns the shared handle.
    pub fn open_account(&mut self, id: &str) -> Result<SharedAccount, ChainError> {
        self.open_account_with_balance(id, self.default_balance)
    }

    pub fn open_account_with_balance(
        &mut self,
        id: &str,
        balance: Amount,
    ) -> Result<SharedAccount, ChainError> {
        if self.accounts.contains_key(id) {
            return Err(ChainError::DuplicateAccount(id.to_string()));
        }
        let account = Account::new(id, balance, self.key_bits)?.into_shared();
        self.add_account(Arc::clone(&account))?;
        Ok(account)
    }

    pub fn get_account_balances(&self) -> Vec<AccountBalance> {
        self.accounts
            .iter()
            .map(|(id, account)| AccountBalance {
                id: id.clone(),
                balance: account.read().balance(),
            })
            .collect()
    }

    /// Admits a transaction into the pending pool if its signature verifies
    /// against the registered sender's key. An unknown sender fails the
    /// same way as a bad signature.
    pub fn try_add_transaction(&mut self, transaction: Transaction) -> Result<(), ChainError> {
        transaction.validate_value()?;

        let sender = self.accounts.get(transaction.sender()).ok_or_else(|| {
            ChainError::SignatureInvalid(format!("Unknown sender {}", transaction.sender()))
        })?;
        transaction.verify_with_key(sender.read().public_key())?;

        info!(
            sender = transaction.sender(),
            receiver = transaction.receiver(),
            value = transaction.value(),
            nonce = transaction.nonce(),
            "admitted transaction"
        );
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Boolean form of [`Blockchain::try_add_transaction`].
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        let sender = transaction.sender().to_string();
        let nonce = transaction.nonce();
        match self.try_add_transaction(transaction) {
            Ok(()) => true,
            Err(e) => {
                warn!(%sender, nonce, "transaction rejected at admission: {}", e);
                false
            }
        }
    }

    fn balance_snapshot(&self) -> BTreeMap<String, Amount> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.read().balance()))
            .collect()
    }

    /// Settles the pending pool into a new block and appends it.
    ///
    /// The whole batch is first tried atomically against aggregate net
    /// deltas. If any account would go negative or any party is unknown,
    /// transactions are instead admitted one at a time in pending order and
    /// those that cannot settle are dropped for good. Balances change and
    /// the pool is cleared only once mining succeeds; a mining failure
    /// leaves the ledger as it was.
    pub fn create_new_block(&mut self) -> Result<&Block, ChainError> {
        let balances = self.balance_snapshot();
        let plan = match settle(
            &self.pending_transactions,
            &balances,
            SettlementPolicy::AllOrNothing,
        ) {
            Ok(plan) => plan,
            Err(reason) => {
                info!("batch does not settle atomically ({}), settling per transaction", reason);
                settle(
                    &self.pending_transactions,
                    &balances,
                    SettlementPolicy::DropRejected,
                )?
            }
        };
        let SettlementPlan {
            accepted,
            deltas,
            rejected,
        } = plan;
        for (transaction, reason) in &rejected {
            warn!(
                sender = transaction.sender(),
                nonce = transaction.nonce(),
                "dropping transaction: {}",
                reason
            );
        }

        let previous_block_hash = self
            .chain
            .last()
            .map(|block| block.block_hash.clone())
            .ok_or_else(|| ChainError::InvalidBlock("Chain has no genesis block".to_string()))?;
        let index = self.chain.len() as u64;
        let block = Block::mine(
            index,
            accepted,
            previous_block_hash,
            self.hash_target.clone(),
            &self.miner,
        )?;

        for (id, delta) in &deltas {
            if let Some(account) = self.accounts.get(id) {
                let mut account = account.write();
                if *delta >= 0 {
                    account.credit(*delta);
                } else {
                    account.debit(-*delta);
                }
            }
        }
        self.pending_transactions.clear();

        info!(
            index,
            transactions = block.transactions.len(),
            dropped = rejected.len(),
            hash = %block.block_hash,
            "sealed block"
        );
        self.chain.push(block);
        Ok(&self.chain[self.chain.len() - 1])
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chain ({} blocks, target {}):", self.chain.len(), self.hash_target)?;
        for block in &self.chain {
            writeln!(
                f,
                "  #{} {} ({} transactions)",
                block.index,
                block.block_hash,
                block.transactions.len()
            )?;
        }
        write!(f, "Pending transactions: {}", self.pending_transactions.len())
    }
}
