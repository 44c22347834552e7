pub use crate::{
    deposit_tree::DepositTree,
    error::Error,
    merkle_tree::{zero_hash, MerkleTreeNode},
    proof::{merkle_root_from_branch, verify_merkle_proof},
    snapshot::{DepositTreeSnapshot, FinalizedExecutionBlock},
};

mod deposit_tree;
mod error;
mod merkle_tree;
mod proof;
mod snapshot;
