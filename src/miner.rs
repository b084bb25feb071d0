//! Proof-of-work nonce search
//!
//! A block is sealed by the first nonce, counting up from 0, whose content
//! hash read as a big-endian integer is strictly below the hash target. The
//! parallel strategy scans the same nonces in fixed-size rounds and keeps the
//! lowest hit of each round, so both strategies return the same nonce.

use crate::blockchain::{BlockPreimage, HashTarget};
use crate::config::MiningConfig;
use crate::error::ChainError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Nonces each worker thread scans per parallel round.
const PARALLEL_CHUNK_PER_THREAD: u64 = 4_096;

/// Attempts between progress log lines in the sequential search.
const PROGRESS_INTERVAL: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningStrategy {
    #[default]
    Sequential,
    Parallel,
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub nonce: u64,
    pub block_hash: String,
}

#[derive(Debug, Clone)]
pub struct Miner {
    strategy: MiningStrategy,
    max_attempts: Option<u64>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Default for Miner {
    fn default() -> Self {
        Self::sequential()
    }
}

impl Miner {
    /// Unbounded single-threaded search.
    pub fn sequential() -> Self {
        Miner {
            strategy: MiningStrategy::Sequential,
            max_attempts: None,
            pool: None,
        }
    }

    /// Parallel search on a dedicated pool of `threads` workers, or on the
    /// global rayon pool when `threads` is `None`.
    pub fn parallel(threads: Option<usize>) -> Result<Self, ChainError> {
        let pool = match threads {
            Some(n) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("pow-miner-{}", i))
                    .build()
                    .map_err(|e| ChainError::ConfigError(format!("Mining pool: {}", e)))?,
            )),
            None => None,
        };
        Ok(Miner {
            strategy: MiningStrategy::Parallel,
            max_attempts: None,
            pool,
        })
    }

    pub fn from_config(config: &MiningConfig) -> Result<Self, ChainError> {
        let miner = match config.strategy {
            MiningStrategy::Sequential => Self::sequential(),
            MiningStrategy::Parallel => Self::parallel(config.threads)?,
        };
        Ok(miner.with_max_attempts(config.max_attempts))
    }

    /// Caps the number of nonces tried; `None` searches without bound.
    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn strategy(&self) -> MiningStrategy {
        self.strategy
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    /// Finds the first nonce whose hash is below `target`.
    pub fn mine(&self, preimage: &BlockPreimage, target: &HashTarget) -> Result<Seal, ChainError> {
        let limit = self.max_attempts.unwrap_or(u64::MAX);
        let found = match self.strategy {
            MiningStrategy::Sequential => mine_sequential(preimage, target, limit),
            MiningStrategy::Parallel => match &self.pool {
                Some(pool) => pool.install(|| mine_parallel(preimage, target, limit)),
                None => mine_parallel(preimage, target, limit),
            },
        };

        match found {
            Some(nonce) => {
                let block_hash = preimage.hash_hex(Some(nonce));
                info!(nonce, attempts = nonce + 1, %block_hash, "found proof of work");
                Ok(Seal { nonce, block_hash })
            }
            None => Err(ChainError::ProofOfWorkExhaustion { attempts: limit }),
        }
    }
}

fn mine_sequential(preimage: &BlockPreimage, target: &HashTarget, limit: u64) -> Option<u64> {
    for nonce in 0..limit {
        if target.is_met_by(&preimage.digest(Some(nonce))) {
            return Some(nonce);
        }
        if nonce > 0 && nonce % PROGRESS_INTERVAL == 0 {
            debug!(nonce, "still mining");
        }
    }
    None
}

fn mine_parallel(preimage: &BlockPreimage, target: &HashTarget, limit: u64) -> Option<u64> {
    let round = (rayon::current_num_threads() as u64).max(1) * PARALLEL_CHUNK_PER_THREAD;
    let mut start = 0u64;
    while start < limit {
        let end = start.saturating_add(round).min(limit);
        let hit = (start..end)
            .into_par_iter()
            .find_first(|&nonce| target.is_met_by(&preimage.digest(Some(nonce))));
        if hit.is_some() {
            return hit;
        }
        debug!(searched = end, "still mining");
        start = end;
    }
    None
}
