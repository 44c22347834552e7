use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard},
};

use anyhow::{ensure, Result};
use deposit_tree::{DepositTree, DepositTreeSnapshot, MerkleTreeNode};
use log::{info, warn};
use std_ext::DefaultExt as _;
use thiserror::Error;
use types::phase0::{
    containers::DepositData,
    primitives::{DepositIndex, ExecutionBlockHash, ExecutionBlockNumber, PublicKeyBytes, H256},
};

use crate::{DepositRecord, Eth1Config};

/// The part of the deposit tree that will never change again.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct FinalizedAccumulator {
    pub tree: MerkleTreeNode,
    /// Index of the last finalized deposit. `None` if nothing has been finalized yet.
    pub frontier_index: Option<DepositIndex>,
}

/// All deposits observed in the deposit contract along with the deposit tree built from them.
///
/// Records and the tree are kept behind a single lock so that they never go out of sync.
/// Deposits must be inserted in order. Concurrent inserts of the same index result in one failure.
#[derive(Default)]
pub struct DepositCache {
    state: RwLock<State>,
}

impl DepositCache {
    pub fn new(config: &Eth1Config) -> Result<Self> {
        let Some(snapshot) = config.default_deposit_tree.as_ref() else {
            return Ok(Self::default());
        };

        let live_tree = DepositTree::from_snapshot(snapshot)?;

        let finalized = FinalizedAccumulator {
            tree: live_tree.merkle_tree.clone(),
            frontier_index: snapshot.deposit_count.checked_sub(1),
        };

        info!(
            "loaded deposit tree snapshot \
             (deposit_count: {}, execution_block_height: {})",
            snapshot.deposit_count, snapshot.execution_block_height,
        );

        let state = State {
            finalized,
            live_tree,
            ..State::default()
        };

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Adds a single deposit.
    ///
    /// Fails without changing anything if the deposit does not directly follow the last one.
    pub fn insert(&self, record: DepositRecord) -> Result<()> {
        let mut state = self.state.write().expect("deposit cache lock is poisoned");

        state.validate(record.index, &record.data, record.block_number)?;
        state.live_tree.push_leaf(record.data.hash_tree_root())?;
        state.apply(record);

        features::log!(DebugEth1, "inserted deposit: {record:?}");

        Ok(())
    }

    /// Adds a deposit as the next one in sequence and returns the resulting record.
    pub fn push_deposit(
        &self,
        data: DepositData,
        block_number: ExecutionBlockNumber,
    ) -> Result<DepositRecord> {
        let mut state = self.state.write().expect("deposit cache lock is poisoned");

        let index = state.records.len() as DepositIndex;

        state.validate(index, &data, block_number)?;
        state.live_tree.push_leaf(data.hash_tree_root())?;

        let record = DepositRecord {
            data,
            block_number,
            index,
            deposit_root: state.live_tree.root(),
        };

        state.apply(record);

        features::log!(DebugEth1, "pushed deposit: {record:?}");

        Ok(record)
    }

    /// Replaces all records with `records`.
    ///
    /// Leaves the deposit tree alone.
    /// It is expected to be restored separately, usually from a snapshot.
    pub fn insert_bulk(&self, mut records: Vec<DepositRecord>) {
        records.sort_by_key(|record| record.index);

        let mut by_pubkey = HashMap::<_, Vec<_>>::new();

        for record in &records {
            by_pubkey.entry(record.pubkey()).or_default().push(*record);
        }

        let mut state = self.state.write().expect("deposit cache lock is poisoned");

        features::log!(
            DebugEth1,
            "replacing {} deposit records with {}",
            state.records.len(),
            records.len(),
        );

        state.records = records;
        state.by_pubkey = by_pubkey;
    }

    /// Finalizes all deposits up to and including `eth1_index`.
    ///
    /// Does nothing if there are no deposits or if they are already finalized.
    pub fn finalize_through(&self, eth1_index: DepositIndex) -> Result<()> {
        let mut state = self.state.write().expect("deposit cache lock is poisoned");

        let Some(last_index) = (state.records.len() as DepositIndex).checked_sub(1) else {
            return Ok(());
        };

        let eth1_index = eth1_index.min(last_index);

        if state
            .finalized
            .frontier_index
            .is_some_and(|frontier_index| eth1_index <= frontier_index)
        {
            return Ok(());
        }

        state.live_tree.finalize_deposits(eth1_index + 1)?;

        state.finalized = FinalizedAccumulator {
            tree: state.live_tree.merkle_tree.clone(),
            frontier_index: Some(eth1_index),
        };

        info!("finalized deposits up to index {eth1_index}");

        Ok(())
    }

    #[must_use]
    pub fn all_records(&self) -> Vec<DepositRecord> {
        self.read().records.clone()
    }

    /// Returns deposits observed at or below `until_block_number`, or all of them if it is `None`.
    #[must_use]
    pub fn all_deposits(
        &self,
        until_block_number: Option<ExecutionBlockNumber>,
    ) -> Vec<DepositRecord> {
        let state = self.read();
        state.records[..state.count_until(until_block_number)].to_vec()
    }

    /// Returns deposits after `last_finalized_index` observed at or below `until_block_number`.
    ///
    /// Returns all deposits up to `until_block_number` if nothing has been finalized yet.
    #[must_use]
    pub fn non_finalized_deposits(
        &self,
        last_finalized_index: DepositIndex,
        until_block_number: Option<ExecutionBlockNumber>,
    ) -> Vec<DepositRecord> {
        let state = self.read();
        let records = &state.records[..state.count_until(until_block_number)];

        if state.finalized.frontier_index.is_none() {
            return records.to_vec();
        }

        records
            .iter()
            .filter(|record| record.index > last_finalized_index)
            .copied()
            .collect()
    }

    /// Returns the earliest deposit made with `pubkey`.
    #[must_use]
    pub fn deposit_by_pubkey(&self, pubkey: &PublicKeyBytes) -> Option<DepositRecord> {
        self.read()
            .by_pubkey
            .get(pubkey)
            .and_then(|records| records.first())
            .copied()
    }

    /// Returns the number of deposits observed at or below `block_number`
    /// and the deposit root recorded when the last of them was added.
    #[must_use]
    pub fn count_and_root_at_height(
        &self,
        block_number: ExecutionBlockNumber,
    ) -> (DepositIndex, H256) {
        let state = self.read();
        let count = state.count_until(Some(block_number));

        match count.checked_sub(1).map(|index| &state.records[index]) {
            Some(record) => (count as DepositIndex, record.deposit_root),
            None => (0, H256::zero()),
        }
    }

    #[must_use]
    pub fn finalized_snapshot(&self) -> FinalizedAccumulator {
        self.read().finalized.clone()
    }

    #[must_use]
    pub fn deposit_count(&self) -> DepositIndex {
        self.read().records.len() as DepositIndex
    }

    /// Root of the deposit tree without the deposit count mixed in.
    #[must_use]
    pub fn live_root(&self) -> H256 {
        self.read().live_tree.merkle_root()
    }

    /// Root of the deposit tree as reported by the deposit contract.
    #[must_use]
    pub fn deposit_root(&self) -> H256 {
        self.read().live_tree.root()
    }

    /// Returns the deposit data root at `index` and a proof against [`Self::deposit_root`].
    pub fn deposit_proof(&self, index: DepositIndex) -> Result<(H256, Vec<H256>)> {
        self.read()
            .live_tree
            .generate_proof(index)
            .map_err(Into::into)
    }

    /// Returns an EIP-4881 snapshot of the finalized part of the deposit tree.
    ///
    /// `execution_block_hash` should be the hash of the block containing the last finalized deposit.
    pub fn deposit_tree_snapshot(
        &self,
        execution_block_hash: ExecutionBlockHash,
    ) -> Result<Option<DepositTreeSnapshot>> {
        let state = self.read();

        let Some(frontier_index) = state.finalized.frontier_index else {
            return Ok(None);
        };

        let block_height = state
            .records
            .get(usize::try_from(frontier_index)?)
            .map(|record| record.block_number)
            .or_else(|| {
                state
                    .live_tree
                    .finalized_execution_block
                    .filter(|block| block.deposit_count == frontier_index + 1)
                    .map(|block| block.block_height)
            })
            .ok_or(Error::FrontierRecordMissing {
                index: frontier_index,
            })?;

        let (deposit_count, finalized) = state.finalized.tree.get_finalized();

        let snapshot = DepositTreeSnapshot::from_tree_parts(
            finalized,
            deposit_count,
            (execution_block_hash, block_height),
        )?;

        Ok(Some(snapshot))
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("deposit cache lock is poisoned")
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("deposit {index} has empty deposit data")]
    EmptyDepositData { index: DepositIndex },
    #[error("deposit index out of sequence (expected: {expected}, actual: {actual})")]
    UnexpectedIndex {
        expected: DepositIndex,
        actual: DepositIndex,
    },
    #[error(
        "deposit {index} is in block {block_number} \
         but the previous deposit is in block {previous_block_number}"
    )]
    BlockNumberDecreased {
        index: DepositIndex,
        block_number: ExecutionBlockNumber,
        previous_block_number: ExecutionBlockNumber,
    },
    #[error("deposit tree contains {tree_deposit_count} deposits but deposit {index} is next")]
    TreeOutOfSync {
        index: DepositIndex,
        tree_deposit_count: DepositIndex,
    },
    #[error("block of last finalized deposit {index} is unknown")]
    FrontierRecordMissing { index: DepositIndex },
}

#[derive(Default)]
struct State {
    // Sorted by index. Block numbers are nondecreasing.
    records: Vec<DepositRecord>,
    by_pubkey: HashMap<PublicKeyBytes, Vec<DepositRecord>>,
    finalized: FinalizedAccumulator,
    live_tree: DepositTree,
}

impl State {
    fn validate(
        &self,
        index: DepositIndex,
        data: &DepositData,
        block_number: ExecutionBlockNumber,
    ) -> Result<()> {
        if data.is_default() {
            warn!("rejected deposit {index} with empty deposit data");
            return Err(Error::EmptyDepositData { index }.into());
        }

        let expected = self.records.len() as DepositIndex;
        let actual = index;

        ensure!(
            actual == expected,
            Error::UnexpectedIndex { expected, actual },
        );

        if let Some(previous) = self.records.last() {
            ensure!(
                block_number >= previous.block_number,
                Error::BlockNumberDecreased {
                    index,
                    block_number,
                    previous_block_number: previous.block_number,
                },
            );
        }

        let tree_deposit_count = self.live_tree.deposit_count;

        ensure!(
            tree_deposit_count == index,
            Error::TreeOutOfSync {
                index,
                tree_deposit_count,
            },
        );

        Ok(())
    }

    fn apply(&mut self, record: DepositRecord) {
        self.by_pubkey
            .entry(record.pubkey())
            .or_default()
            .push(record);

        let position = self
            .records
            .partition_point(|existing| existing.index < record.index);

        self.records.insert(position, record);
    }

    fn count_until(&self, until_block_number: Option<ExecutionBlockNumber>) -> usize {
        match until_block_number {
            Some(block_number) => self
                .records
                .partition_point(|record| record.block_number <= block_number),
            None => self.records.len(),
        }
    }
}
