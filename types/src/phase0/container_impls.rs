use hashing::{hash_256_256, u64_chunk};

use crate::phase0::{
    containers::DepositData,
    primitives::{PublicKeyBytes, SignatureBytes, H256},
};

impl DepositData {
    /// SSZ `hash_tree_root`. This is the leaf that goes into the deposit contract tree.
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        let left = hash_256_256(
            public_key_root(&self.pubkey),
            self.withdrawal_credentials,
        );

        let right = hash_256_256(u64_chunk(self.amount), signature_root(&self.signature));

        hash_256_256(left, right)
    }
}

// A `Vector[byte, N]` is packed into 32-byte chunks, zero-padded to a power of 2 chunk count.

fn public_key_root(pubkey: &PublicKeyBytes) -> H256 {
    let [first, second] = chunks(pubkey.as_bytes());
    hash_256_256(first, second)
}

fn signature_root(signature: &SignatureBytes) -> H256 {
    let [first, second, third, fourth] = chunks(signature.as_bytes());
    hash_256_256(hash_256_256(first, second), hash_256_256(third, fourth))
}

fn chunks<const N: usize>(bytes: &[u8]) -> [H256; N] {
    let mut chunks = [H256::zero(); N];

    for (chunk, source) in chunks.iter_mut().zip(bytes.chunks(H256::len_bytes())) {
        chunk[..source.len()].copy_from_slice(source);
    }

    chunks
}
