use core::slice::Iter;

use hashing::{hash_256_256, ZERO_HASHES};
use types::phase0::{
    consts::DEPOSIT_CONTRACT_TREE_DEPTH,
    primitives::{DepositIndex, H256},
};

use crate::Error;

/// Root of an empty subtree of the given depth.
///
/// The table stops one level short of the full tree.
/// The root of an empty deposit contract tree is derived from its last entry.
#[must_use]
pub fn zero_hash(depth: usize) -> H256 {
    if depth == DEPOSIT_CONTRACT_TREE_DEPTH {
        let below = ZERO_HASHES[DEPOSIT_CONTRACT_TREE_DEPTH - 1];
        return hash_256_256(below, below);
    }

    ZERO_HASHES[depth]
}

/// Right-sparse Merkle tree with a finalizable prefix.
///
/// Only the first N leaves are ever populated.
/// Everything to the right of them is represented by [`MerkleTreeNode::Empty`] nodes.
/// Subtrees to the left of the finalized boundary are collapsed into
/// [`MerkleTreeNode::Finalized`] nodes that only remember their leaf count and root.
///
/// Nodes do not know their own depth. Every operation that needs it takes it as a parameter.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum MerkleTreeNode {
    Empty(usize),
    Leaf(H256),
    Internal(Box<Self>, Box<Self>),
    Finalized(DepositIndex, H256),
}

impl Default for MerkleTreeNode {
    fn default() -> Self {
        Self::Empty(DEPOSIT_CONTRACT_TREE_DEPTH)
    }
}

impl MerkleTreeNode {
    /// Builds a balanced tree of the given depth out of `leaves`, filling it from the left.
    #[must_use]
    pub fn create(leaves: &[H256], depth: usize) -> Self {
        if leaves.is_empty() {
            return Self::Empty(depth);
        }

        if depth == 0 {
            debug_assert_eq!(leaves.len(), 1);
            return Self::Leaf(leaves[0]);
        }

        let subtree_capacity = 1_usize << (depth - 1);
        let (left_leaves, right_leaves) = leaves.split_at(subtree_capacity.min(leaves.len()));

        Self::Internal(
            Box::new(Self::create(left_leaves, depth - 1)),
            Box::new(Self::create(right_leaves, depth - 1)),
        )
    }

    #[must_use]
    pub fn root(&self) -> H256 {
        match self {
            Self::Empty(depth) => zero_hash(*depth),
            Self::Leaf(hash) | Self::Finalized(_, hash) => *hash,
            Self::Internal(left, right) => hash_256_256(left.root(), right.root()),
        }
    }

    // Leaves are always pushed into the left child until it is full,
    // so an internal node is full exactly when its right child is.
    #[must_use]
    pub fn is_full(&self) -> bool {
        match self {
            Self::Empty(_) => false,
            Self::Leaf(_) | Self::Finalized(_, _) => true,
            Self::Internal(_, right) => right.is_full(),
        }
    }

    /// Appends `leaf` after the rightmost populated leaf.
    ///
    /// Fails without modifying the tree if the path to the next free slot ends in a terminal node.
    /// Callers are expected to check [`MerkleTreeNode::is_full`] first.
    pub fn push_leaf(&mut self, leaf: H256, depth: usize) -> Result<(), Error> {
        match self {
            Self::Empty(_) => *self = Self::create(&[leaf], depth),
            Self::Internal(left, right) => {
                let child_depth = depth.checked_sub(1).ok_or(Error::InternalNodeAtBottom)?;

                if left.is_full() {
                    right.push_leaf(leaf, child_depth)?;
                } else {
                    left.push_leaf(leaf, child_depth)?;
                }
            }
            Self::Leaf(_) => return Err(Error::LeafReached),
            Self::Finalized(_, _) => return Err(Error::FinalizedNodePushed),
        }

        Ok(())
    }

    /// Finalizes the leftmost `to_finalize` leaves of this subtree.
    ///
    /// Subtrees that end up completely finalized are collapsed into a single node.
    /// Empty subtrees are left untouched. There is nothing in them to finalize.
    pub fn finalize(&mut self, to_finalize: DepositIndex, depth: usize) {
        if to_finalize == 0 {
            return;
        }

        let capacity: DepositIndex = 1 << depth;

        match self {
            Self::Empty(_) | Self::Finalized(_, _) => {}
            Self::Leaf(hash) => *self = Self::Finalized(1, *hash),
            Self::Internal(_, _) if to_finalize >= capacity => {
                *self = Self::Finalized(capacity, self.root());
            }
            Self::Internal(left, right) => {
                let half = capacity / 2;

                left.finalize(to_finalize.min(half), depth - 1);

                if to_finalize > half {
                    right.finalize(to_finalize - half, depth - 1);
                }
            }
        }
    }

    /// Returns the number of finalized leaves and the roots of the finalized subtrees,
    /// ordered from left to right.
    #[must_use]
    pub fn get_finalized(&self) -> (DepositIndex, Vec<H256>) {
        let mut hashes = vec![];
        let count = self.append_finalized(&mut hashes);
        (count, hashes)
    }

    fn append_finalized(&self, hashes: &mut Vec<H256>) -> DepositIndex {
        match self {
            Self::Empty(_) | Self::Leaf(_) => 0,
            Self::Finalized(count, hash) => {
                hashes.push(*hash);
                *count
            }
            Self::Internal(left, right) => {
                left.append_finalized(hashes) + right.append_finalized(hashes)
            }
        }
    }

    /// Rebuilds a tree out of the output of [`MerkleTreeNode::get_finalized`].
    ///
    /// Every finalized hash must be consumed.
    pub fn from_snapshot(
        finalized: &[H256],
        deposit_count: DepositIndex,
        depth: usize,
    ) -> Result<Self, Error> {
        let capacity: DepositIndex = 1 << depth;

        if deposit_count > capacity {
            return Err(Error::SnapshotCountTooLarge {
                deposit_count,
                capacity,
            });
        }

        if finalized.is_empty() && deposit_count > 0 {
            return Err(Error::SnapshotHashesMissing { deposit_count });
        }

        let mut hashes = finalized.iter();
        let tree = Self::from_snapshot_parts(&mut hashes, deposit_count, depth)?;

        match hashes.len() {
            0 => Ok(tree),
            unused => Err(Error::SnapshotHashesUnused { unused }),
        }
    }

    fn from_snapshot_parts(
        hashes: &mut Iter<H256>,
        deposit_count: DepositIndex,
        depth: usize,
    ) -> Result<Self, Error> {
        if hashes.len() == 0 || deposit_count == 0 {
            return Ok(Self::Empty(depth));
        }

        let capacity: DepositIndex = 1 << depth;

        if deposit_count == capacity {
            let hash = hashes.next().ok_or(Error::SnapshotHashesExhausted)?;
            return Ok(Self::Finalized(deposit_count, *hash));
        }

        // `deposit_count` is between 0 and `capacity` exclusive, so `depth` cannot be 0 here.
        let child_depth = depth - 1;
        let half = capacity / 2;

        let (left, right) = if deposit_count <= half {
            (
                Self::from_snapshot_parts(hashes, deposit_count, child_depth)?,
                Self::Empty(child_depth),
            )
        } else {
            let hash = hashes.next().ok_or(Error::SnapshotHashesExhausted)?;

            (
                Self::Finalized(half, *hash),
                Self::from_snapshot_parts(hashes, deposit_count - half, child_depth)?,
            )
        };

        Ok(Self::Internal(Box::new(left), Box::new(right)))
    }
}
