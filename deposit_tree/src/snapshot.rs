use hashing::{hash_256_256, mix_in_length, ZERO_HASHES};
use serde::{Deserialize, Serialize};
use types::phase0::{
    consts::DEPOSIT_CONTRACT_TREE_DEPTH,
    primitives::{DepositIndex, ExecutionBlockHash, ExecutionBlockNumber, H256},
};

use crate::Error;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct FinalizedExecutionBlock {
    pub deposit_root: H256,
    pub deposit_count: DepositIndex,
    pub block_hash: ExecutionBlockHash,
    pub block_height: ExecutionBlockNumber,
}

/// [EIP-4881](https://eips.ethereum.org/EIPS/eip-4881) deposit tree snapshot.
///
/// Serializes to the shape used by the `/eth/v1/beacon/deposit_snapshot` endpoint.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DepositTreeSnapshot {
    pub finalized: Vec<H256>,
    pub deposit_root: H256,
    #[serde(with = "serde_utils::string_or_native")]
    pub deposit_count: DepositIndex,
    pub execution_block_hash: ExecutionBlockHash,
    #[serde(with = "serde_utils::string_or_native")]
    pub execution_block_height: ExecutionBlockNumber,
}

impl DepositTreeSnapshot {
    /// Computes the deposit root (with the length mixed in) from the finalized hashes alone.
    pub fn calculate_root(&self) -> Result<H256, Error> {
        let mut size = self.deposit_count;
        let mut remaining = self.finalized.iter().rev();
        let mut root = ZERO_HASHES[0];

        for zero_hash in ZERO_HASHES.iter().take(DEPOSIT_CONTRACT_TREE_DEPTH) {
            root = if size & 1 == 1 {
                let finalized = remaining.next().ok_or(Error::SnapshotHashesExhausted)?;
                hash_256_256(*finalized, root)
            } else {
                hash_256_256(root, *zero_hash)
            };

            size >>= 1;
        }

        Ok(mix_in_length(root, self.deposit_count))
    }

    pub fn from_tree_parts(
        finalized: Vec<H256>,
        deposit_count: DepositIndex,
        (execution_block_hash, execution_block_height): (ExecutionBlockHash, ExecutionBlockNumber),
    ) -> Result<Self, Error> {
        let mut snapshot = Self {
            finalized,
            deposit_root: H256::zero(),
            deposit_count,
            execution_block_hash,
            execution_block_height,
        };

        snapshot.deposit_root = snapshot.calculate_root()?;

        Ok(snapshot)
    }

    #[must_use]
    pub const fn execution_block(&self) -> FinalizedExecutionBlock {
        FinalizedExecutionBlock {
            deposit_root: self.deposit_root,
            deposit_count: self.deposit_count,
            block_hash: self.execution_block_hash,
            block_height: self.execution_block_height,
        }
    }
}
