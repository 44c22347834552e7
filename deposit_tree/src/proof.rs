use hashing::hash_256_256;
use types::phase0::primitives::{DepositIndex, H256};

use crate::{merkle_tree::zero_hash, Error, MerkleTreeNode};

impl MerkleTreeNode {
    /// Return the leaf at `index` and a Merkle proof of its inclusion.
    ///
    /// The Merkle proof is in "bottom-up" order, starting with the sibling of the leaf
    /// and moving up the tree. Its length will be exactly equal to `depth`.
    ///
    /// Indices that fall into an empty subtree produce a proof for a zero leaf.
    pub fn generate_proof(
        &self,
        index: DepositIndex,
        depth: usize,
    ) -> Result<(H256, Vec<H256>), Error> {
        let mut proof = Vec::with_capacity(depth);

        // `None` once the path has entered an empty subtree.
        let mut current_node = Some(self);

        for level in (0..depth).rev() {
            let go_right = (index >> level) & 1 == 1;

            current_node = match current_node {
                Some(Self::Internal(left, right)) => {
                    let (next, sibling) = if go_right {
                        (right, left)
                    } else {
                        (left, right)
                    };

                    proof.push(sibling.root());
                    Some(next.as_ref())
                }
                Some(Self::Empty(_)) | None => {
                    proof.push(zero_hash(level));
                    None
                }
                Some(Self::Finalized(_, _)) => return Err(Error::ProofEncounteredFinalizedNode),
                Some(Self::Leaf(_)) => return Err(Error::LeafAboveBottom { depth: level + 1 }),
            };
        }

        let leaf = match current_node {
            Some(Self::Leaf(hash)) => *hash,
            Some(Self::Empty(_)) | None => zero_hash(0),
            Some(Self::Finalized(_, _)) => return Err(Error::ProofEncounteredFinalizedNode),
            Some(Self::Internal(_, _)) => return Err(Error::InternalNodeAtBottom),
        };

        debug_assert_eq!(proof.len(), depth);

        proof.reverse();

        Ok((leaf, proof))
    }
}

/// Verify a proof that `leaf` exists at `index` in a Merkle tree rooted at `root`.
///
/// The `branch` argument is the main component of the proof: it should be a list of internal
/// node hashes such that the root can be reconstructed (in bottom-up order).
#[must_use]
pub fn verify_merkle_proof(
    leaf: H256,
    branch: &[H256],
    depth: usize,
    index: DepositIndex,
    root: H256,
) -> bool {
    branch.len() == depth && merkle_root_from_branch(leaf, branch, depth, index) == root
}

/// Compute a root hash from a leaf and a Merkle proof.
///
/// Only the first `depth` elements of `branch` are used.
#[must_use]
pub fn merkle_root_from_branch(
    leaf: H256,
    branch: &[H256],
    depth: usize,
    index: DepositIndex,
) -> H256 {
    branch
        .iter()
        .take(depth)
        .enumerate()
        .fold(leaf, |current, (level, sibling)| {
            if (index >> level) & 1 == 1 {
                hash_256_256(*sibling, current)
            } else {
                hash_256_256(current, *sibling)
            }
        })
}
