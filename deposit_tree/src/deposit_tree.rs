use anyhow::{ensure, Result};
use hashing::{mix_in_length, u64_chunk};
use types::phase0::{
    consts::DEPOSIT_CONTRACT_TREE_DEPTH,
    containers::DepositData,
    primitives::{DepositIndex, H256},
};

use crate::{DepositTreeSnapshot, Error, FinalizedExecutionBlock, MerkleTreeNode};

const MAX_DEPOSITS: DepositIndex = 1 << DEPOSIT_CONTRACT_TREE_DEPTH;

/// The deposit contract tree as described in EIP-4881.
///
/// Wraps a [`MerkleTreeNode`] of depth 32 together with the number of deposits in it,
/// which is mixed into the root the same way the deposit contract does it.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct DepositTree {
    pub merkle_tree: MerkleTreeNode,
    pub deposit_count: DepositIndex,
    pub finalized_execution_block: Option<FinalizedExecutionBlock>,
}

impl DepositTree {
    #[must_use]
    pub fn create(leaves: &[H256]) -> Self {
        Self {
            merkle_tree: MerkleTreeNode::create(leaves, DEPOSIT_CONTRACT_TREE_DEPTH),
            deposit_count: leaves.len() as DepositIndex,
            finalized_execution_block: None,
        }
    }

    /// Root of the tree with the deposit count mixed in.
    ///
    /// This is what `get_deposit_root` in the deposit contract returns
    /// and what `Eth1Data.deposit_root` contains.
    #[must_use]
    pub fn root(&self) -> H256 {
        mix_in_length(self.merkle_root(), self.deposit_count)
    }

    /// Root of the tree without the deposit count.
    #[must_use]
    pub fn merkle_root(&self) -> H256 {
        self.merkle_tree.root()
    }

    #[must_use]
    pub fn finalized_deposit_count(&self) -> DepositIndex {
        self.finalized_execution_block
            .map(|block| block.deposit_count)
            .unwrap_or_default()
    }

    /// Appends a deposit and returns the new deposit root.
    pub fn push(&mut self, index: DepositIndex, data: DepositData) -> Result<H256> {
        features::log!(
            DebugDepositTree,
            "DepositTree::push (deposit_count: {}, index: {index}, data: {data:?})",
            self.deposit_count,
        );

        self.validate_index(index)?;
        self.push_leaf(data.hash_tree_root())?;

        Ok(self.root())
    }

    pub fn push_leaf(&mut self, leaf: H256) -> Result<(), Error> {
        if self.deposit_count >= MAX_DEPOSITS || self.merkle_tree.is_full() {
            return Err(Error::MerkleTreeFull);
        }

        self.merkle_tree
            .push_leaf(leaf, DEPOSIT_CONTRACT_TREE_DEPTH)?;

        self.deposit_count += 1;

        Ok(())
    }

    /// Finalizes deposits up to `finalized_execution_block.deposit_count`.
    pub fn finalize(
        &mut self,
        finalized_execution_block: FinalizedExecutionBlock,
    ) -> Result<(), Error> {
        self.finalize_deposits(finalized_execution_block.deposit_count)?;
        self.finalized_execution_block = Some(finalized_execution_block);
        Ok(())
    }

    /// Finalizes the first `deposit_count` deposits without recording an execution block.
    pub fn finalize_deposits(&mut self, deposit_count: DepositIndex) -> Result<(), Error> {
        if deposit_count > self.deposit_count {
            return Err(Error::FinalizePastEnd {
                requested: deposit_count,
                deposit_count: self.deposit_count,
            });
        }

        let (finalized, _) = self.merkle_tree.get_finalized();

        if deposit_count < finalized {
            return Err(Error::FinalizeBackwards {
                requested: deposit_count,
                finalized,
            });
        }

        features::log!(
            DebugDepositTree,
            "DepositTree::finalize_deposits (finalized: {finalized}, requested: {deposit_count})",
        );

        self.merkle_tree
            .finalize(deposit_count, DEPOSIT_CONTRACT_TREE_DEPTH);

        Ok(())
    }

    /// Return the leaf at `index` and a Merkle proof of its inclusion.
    ///
    /// The proof is in "bottom-up" order and has `DEPOSIT_CONTRACT_TREE_DEPTH + 1` elements.
    /// The last one is the deposit count, which makes the proof verify against [`Self::root`].
    pub fn generate_proof(&self, index: DepositIndex) -> Result<(H256, Vec<H256>), Error> {
        if index >= self.deposit_count {
            return Err(Error::ProofIndexOutOfRange {
                index,
                deposit_count: self.deposit_count,
            });
        }

        let (leaf, mut proof) = self
            .merkle_tree
            .generate_proof(index, DEPOSIT_CONTRACT_TREE_DEPTH)?;

        proof.push(u64_chunk(self.deposit_count));

        Ok((leaf, proof))
    }

    /// Get snapshot of finalized deposit tree (if tree is finalized).
    #[must_use]
    pub fn get_snapshot(&self) -> Option<DepositTreeSnapshot> {
        let finalized_execution_block = self.finalized_execution_block?;
        let (deposit_count, finalized) = self.merkle_tree.get_finalized();

        debug_assert_eq!(deposit_count, finalized_execution_block.deposit_count);

        Some(DepositTreeSnapshot {
            finalized,
            deposit_root: finalized_execution_block.deposit_root,
            deposit_count,
            execution_block_hash: finalized_execution_block.block_hash,
            execution_block_height: finalized_execution_block.block_height,
        })
    }

    pub fn from_snapshot(snapshot: &DepositTreeSnapshot) -> Result<Self> {
        ensure!(
            snapshot.deposit_count <= MAX_DEPOSITS,
            Error::SnapshotCountTooLarge {
                deposit_count: snapshot.deposit_count,
                capacity: MAX_DEPOSITS,
            },
        );

        ensure!(
            snapshot.deposit_count == 0 || !snapshot.finalized.is_empty(),
            Error::SnapshotHashesMissing {
                deposit_count: snapshot.deposit_count,
            },
        );

        let computed = snapshot.calculate_root()?;

        ensure!(
            computed == snapshot.deposit_root,
            Error::SnapshotRootMismatch {
                expected: snapshot.deposit_root,
                computed,
            },
        );

        let merkle_tree = MerkleTreeNode::from_snapshot(
            &snapshot.finalized,
            snapshot.deposit_count,
            DEPOSIT_CONTRACT_TREE_DEPTH,
        )?;

        Ok(Self {
            merkle_tree,
            deposit_count: snapshot.deposit_count,
            finalized_execution_block: Some(snapshot.execution_block()),
        })
    }

    fn validate_index(&self, index: DepositIndex) -> Result<()> {
        ensure!(index < MAX_DEPOSITS, Error::Full { index });

        let expected = self.deposit_count;
        let actual = index;

        ensure!(
            actual == expected,
            Error::UnexpectedIndex { expected, actual },
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use types::phase0::primitives::{PublicKeyBytes, SignatureBytes};

    use crate::verify_merkle_proof;

    use super::*;

    fn deposit_data(seed: u8) -> DepositData {
        DepositData {
            pubkey: PublicKeyBytes::repeat_byte(seed),
            withdrawal_credentials: H256::repeat_byte(seed),
            amount: 32_000_000_000,
            signature: SignatureBytes::repeat_byte(seed),
        }
    }

    fn tree_with_deposits(count: u8) -> DepositTree {
        let mut tree = DepositTree::default();

        for seed in 0..count {
            tree.push(seed.into(), deposit_data(seed))
                .expect("deposits are pushed in order");
        }

        tree
    }

    #[test]
    fn push_returns_root_of_equivalent_tree() {
        let mut tree = DepositTree::default();
        let mut leaves = vec![];

        for seed in 0..5 {
            let data = deposit_data(seed);
            leaves.push(data.hash_tree_root());

            let root = tree
                .push(seed.into(), data)
                .expect("deposits are pushed in order");

            assert_eq!(root, DepositTree::create(&leaves).root());
        }
    }

    #[test]
    fn push_rejects_unexpected_index() {
        let mut tree = tree_with_deposits(2);
        let before = tree.clone();

        for index in [0, 1, 3] {
            let error = tree
                .push(index, deposit_data(9))
                .expect_err("index other than 2 should be rejected");

            assert_eq!(
                error.downcast_ref::<Error>(),
                Some(&Error::UnexpectedIndex {
                    expected: 2,
                    actual: index,
                }),
            );
        }

        assert_eq!(tree, before);
    }

    #[test]
    fn push_rejects_index_past_capacity() {
        let mut tree = DepositTree::default();

        let error = tree
            .push(MAX_DEPOSITS, deposit_data(0))
            .expect_err("index past capacity should be rejected");

        assert_eq!(
            error.downcast_ref::<Error>(),
            Some(&Error::Full {
                index: MAX_DEPOSITS,
            }),
        );
    }

    #[test]
    fn proofs_verify_against_mixed_in_root() {
        let tree = tree_with_deposits(6);
        let root = tree.root();

        for index in 0..6 {
            let (leaf, proof) = tree.generate_proof(index).expect("deposit exists");

            assert_eq!(proof.len(), DEPOSIT_CONTRACT_TREE_DEPTH + 1);
            assert_eq!(leaf, deposit_data(index as u8).hash_tree_root());
            assert!(verify_merkle_proof(
                leaf,
                &proof,
                DEPOSIT_CONTRACT_TREE_DEPTH + 1,
                index,
                root,
            ));
        }

        assert_eq!(
            tree.generate_proof(6),
            Err(Error::ProofIndexOutOfRange {
                index: 6,
                deposit_count: 6,
            }),
        );
    }

    #[test]
    fn snapshot_round_trip_preserves_root() {
        let mut tree = tree_with_deposits(7);

        assert_eq!(tree.get_snapshot(), None);

        let deposit_root = tree.root();

        tree.finalize(FinalizedExecutionBlock {
            deposit_root,
            deposit_count: 7,
            block_hash: H256::repeat_byte(0xbb),
            block_height: 100,
        })
        .expect("all deposits can be finalized");

        let snapshot = tree.get_snapshot().expect("tree has been finalized");

        assert_eq!(snapshot.finalized.len(), 3);
        assert_eq!(snapshot.calculate_root(), Ok(deposit_root));

        let restored = DepositTree::from_snapshot(&snapshot).expect("snapshot is valid");

        assert_eq!(restored.root(), deposit_root);
        assert_eq!(restored.deposit_count, 7);
        assert_eq!(restored.get_snapshot(), Some(snapshot));
    }

    #[test]
    fn restored_tree_accepts_further_deposits() {
        let mut original = tree_with_deposits(5);

        original
            .finalize(FinalizedExecutionBlock {
                deposit_root: original.root(),
                deposit_count: 5,
                block_hash: H256::zero(),
                block_height: 1,
            })
            .expect("all deposits can be finalized");

        let snapshot = original.get_snapshot().expect("tree has been finalized");
        let mut restored = DepositTree::from_snapshot(&snapshot).expect("snapshot is valid");

        for seed in 5..9 {
            let original_root = original
                .push(seed.into(), deposit_data(seed))
                .expect("deposits are pushed in order");

            let restored_root = restored
                .push(seed.into(), deposit_data(seed))
                .expect("deposits are pushed in order");

            assert_eq!(restored_root, original_root);
        }
    }

    #[test]
    fn partial_finalization_matches_root_at_that_count() {
        let leaves = (0..10).map(deposit_data).map(|data| data.hash_tree_root()).collect_vec();
        let mut tree = DepositTree::create(&leaves);

        let historical_root = DepositTree::create(&leaves[..6]).root();

        tree.finalize(FinalizedExecutionBlock {
            deposit_root: historical_root,
            deposit_count: 6,
            block_hash: H256::zero(),
            block_height: 1,
        })
        .expect("6 of 10 deposits can be finalized");

        let snapshot = tree.get_snapshot().expect("tree has been finalized");

        assert_eq!(snapshot.calculate_root(), Ok(historical_root));
        assert_eq!(tree.root(), DepositTree::create(&leaves).root());
    }

    #[test]
    fn finalize_rejects_going_past_end_or_backwards() {
        let mut tree = tree_with_deposits(4);

        assert_eq!(
            tree.finalize_deposits(5),
            Err(Error::FinalizePastEnd {
                requested: 5,
                deposit_count: 4,
            }),
        );

        tree.finalize_deposits(3).expect("3 of 4 deposits can be finalized");

        assert_eq!(
            tree.finalize_deposits(2),
            Err(Error::FinalizeBackwards {
                requested: 2,
                finalized: 3,
            }),
        );
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let mut tree = tree_with_deposits(3);

        tree.finalize(FinalizedExecutionBlock {
            deposit_root: tree.root(),
            deposit_count: 3,
            block_hash: H256::zero(),
            block_height: 1,
        })
        .expect("all deposits can be finalized");

        let mut snapshot = tree.get_snapshot().expect("tree has been finalized");
        snapshot.finalized[0] = H256::repeat_byte(0xff);

        let error = DepositTree::from_snapshot(&snapshot).expect_err("snapshot was tampered with");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SnapshotRootMismatch { .. }),
        ));
    }

    #[test]
    fn snapshot_of_full_tree_without_hashes_is_rejected() {
        let snapshot = DepositTreeSnapshot {
            finalized: vec![],
            deposit_root: mix_in_length(MerkleTreeNode::default().root(), MAX_DEPOSITS),
            deposit_count: MAX_DEPOSITS,
            ..DepositTreeSnapshot::default()
        };

        // The root is consistent because only the low 32 bits of the count select hashes.
        assert_eq!(snapshot.calculate_root(), Ok(snapshot.deposit_root));

        let error = DepositTree::from_snapshot(&snapshot).expect_err("snapshot has no hashes");

        assert_eq!(
            error.downcast_ref::<Error>(),
            Some(&Error::SnapshotHashesMissing {
                deposit_count: MAX_DEPOSITS,
            }),
        );
    }

    #[test]
    fn snapshot_with_too_many_deposits_is_rejected() {
        let snapshot = DepositTreeSnapshot {
            finalized: vec![H256::zero()],
            deposit_count: MAX_DEPOSITS + 1,
            ..DepositTreeSnapshot::default()
        };

        let error = DepositTree::from_snapshot(&snapshot).expect_err("count exceeds capacity");

        assert_eq!(
            error.downcast_ref::<Error>(),
            Some(&Error::SnapshotCountTooLarge {
                deposit_count: MAX_DEPOSITS + 1,
                capacity: MAX_DEPOSITS,
            }),
        );
    }

    #[test]
    fn push_leaf_stops_at_capacity() {
        let mut tree = DepositTree {
            deposit_count: MAX_DEPOSITS,
            ..DepositTree::default()
        };

        let before = tree.clone();

        assert_eq!(tree.push_leaf(H256::repeat_byte(1)), Err(Error::MerkleTreeFull));
        assert_eq!(tree, before);
    }
}
