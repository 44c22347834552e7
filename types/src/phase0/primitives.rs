use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

pub use ethereum_types::H256;

pub type DepositIndex = u64;
pub type ExecutionBlockHash = H256;
pub type ExecutionBlockNumber = u64;
pub type Gwei = u64;

pub const PUBLIC_KEY_SIZE: usize = 48;
pub const SIGNATURE_SIZE: usize = 96;

// Keys and signatures are kept compressed. Nothing in the deposit cache needs them decompressed.

construct_fixed_hash! {
    pub struct PublicKeyBytes(PUBLIC_KEY_SIZE);
}

construct_fixed_hash! {
    pub struct SignatureBytes(SIGNATURE_SIZE);
}

impl_fixed_hash_serde!(PublicKeyBytes, PUBLIC_KEY_SIZE);
impl_fixed_hash_serde!(SignatureBytes, SIGNATURE_SIZE);
