use serde::{Deserialize, Serialize};
use types::phase0::{
    containers::DepositData,
    primitives::{DepositIndex, ExecutionBlockNumber, H256, PublicKeyBytes},
};

/// A deposit as observed in the logs of the deposit contract.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DepositRecord {
    pub data: DepositData,
    #[serde(with = "serde_utils::string_or_native")]
    pub block_number: ExecutionBlockNumber,
    #[serde(with = "serde_utils::string_or_native")]
    pub index: DepositIndex,
    // Root of the deposit contract right after this deposit was added.
    // Not updated when later deposits arrive.
    pub deposit_root: H256,
}

impl DepositRecord {
    #[must_use]
    pub const fn pubkey(&self) -> PublicKeyBytes {
        self.data.pubkey
    }
}
