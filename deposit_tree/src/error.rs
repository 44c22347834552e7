use thiserror::Error;
use types::phase0::primitives::{DepositIndex, H256};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("attempted to add deposit with index {index} to full deposit tree")]
    Full { index: DepositIndex },
    #[error("expected deposit with index {expected}, received deposit with index {actual}")]
    UnexpectedIndex {
        expected: DepositIndex,
        actual: DepositIndex,
    },
    #[error("attempted to push leaf into a subtree that is already a leaf")]
    LeafReached,
    #[error("attempted to push leaf into a finalized subtree")]
    FinalizedNodePushed,
    #[error("deposit tree has no room for more leaves")]
    MerkleTreeFull,
    #[error("leaf found at depth {depth} instead of the bottom of the tree")]
    LeafAboveBottom { depth: usize },
    #[error("internal node found at the bottom of the tree")]
    InternalNodeAtBottom,
    #[error("cannot generate proof through a finalized subtree")]
    ProofEncounteredFinalizedNode,
    #[error("proof requested for deposit {index} but tree only has {deposit_count} deposits")]
    ProofIndexOutOfRange {
        index: DepositIndex,
        deposit_count: DepositIndex,
    },
    #[error("cannot finalize {requested} deposits when tree only has {deposit_count}")]
    FinalizePastEnd {
        requested: DepositIndex,
        deposit_count: DepositIndex,
    },
    #[error("cannot finalize {requested} deposits when {finalized} are already finalized")]
    FinalizeBackwards {
        requested: DepositIndex,
        finalized: DepositIndex,
    },
    #[error("snapshot deposit count {deposit_count} exceeds capacity {capacity}")]
    SnapshotCountTooLarge {
        deposit_count: DepositIndex,
        capacity: DepositIndex,
    },
    #[error("snapshot with {deposit_count} deposits has no finalized hashes")]
    SnapshotHashesMissing { deposit_count: DepositIndex },
    #[error("snapshot has fewer finalized hashes than its deposit count requires")]
    SnapshotHashesExhausted,
    #[error("snapshot has {unused} finalized hashes left over")]
    SnapshotHashesUnused { unused: usize },
    #[error("snapshot deposit root {expected:?} does not match computed root {computed:?}")]
    SnapshotRootMismatch { expected: H256, computed: H256 },
}
