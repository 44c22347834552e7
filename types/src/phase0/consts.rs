use typenum::{Unsigned as _, U32};

pub type DepositContractTreeDepth = U32;

pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = DepositContractTreeDepth::USIZE;
