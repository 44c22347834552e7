use ethereum_types::H256;
use generic_array::GenericArray;
use hex_literal::hex;
use sha2::{
    digest::{core_api::BlockSizeUser, generic_array::typenum::Unsigned as _},
    Sha256,
};

/// Roots of empty subtrees of depth 0 through 31.
///
/// The root of an empty tree of the full deposit contract depth (32) is not in the table.
/// Callers derive it from the last entry.
#[rustfmt::skip]
pub const ZERO_HASHES: [H256; 32] = [
    H256(hex!("0000000000000000000000000000000000000000000000000000000000000000")),
    H256(hex!("f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b")),
    H256(hex!("db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71")),
    H256(hex!("c78009fdf07fc56a11f122370658a353aaa542ed63e44c4bc15ff4cd105ab33c")),
    H256(hex!("536d98837f2dd165a55d5eeae91485954472d56f246df256bf3cae19352a123c")),
    H256(hex!("9efde052aa15429fae05bad4d0b1d7c64da64d03d7a1854a588c2cb8430c0d30")),
    H256(hex!("d88ddfeed400a8755596b21942c1497e114c302e6118290f91e6772976041fa1")),
    H256(hex!("87eb0ddba57e35f6d286673802a4af5975e22506c7cf4c64bb6be5ee11527f2c")),
    H256(hex!("26846476fd5fc54a5d43385167c95144f2643f533cc85bb9d16b782f8d7db193")),
    H256(hex!("506d86582d252405b840018792cad2bf1259f1ef5aa5f887e13cb2f0094f51e1")),
    H256(hex!("ffff0ad7e659772f9534c195c815efc4014ef1e1daed4404c06385d11192e92b")),
    H256(hex!("6cf04127db05441cd833107a52be852868890e4317e6a02ab47683aa75964220")),
    H256(hex!("b7d05f875f140027ef5118a2247bbb84ce8f2f0f1123623085daf7960c329f5f")),
    H256(hex!("df6af5f5bbdb6be9ef8aa618e4bf8073960867171e29676f8b284dea6a08a85e")),
    H256(hex!("b58d900f5e182e3c50ef74969ea16c7726c549757cc23523c369587da7293784")),
    H256(hex!("d49a7502ffcfb0340b1d7885688500ca308161a7f96b62df9d083b71fcc8f2bb")),
    H256(hex!("8fe6b1689256c0d385f42f5bbe2027a22c1996e110ba97c171d3e5948de92beb")),
    H256(hex!("8d0d63c39ebade8509e0ae3c9c3876fb5fa112be18f905ecacfecb92057603ab")),
    H256(hex!("95eec8b2e541cad4e91de38385f2e046619f54496c2382cb6cacd5b98c26f5a4")),
    H256(hex!("f893e908917775b62bff23294dbbe3a1cd8e6cc1c35b4801887b646a6f81f17f")),
    H256(hex!("cddba7b592e3133393c16194fac7431abf2f5485ed711db282183c819e08ebaa")),
    H256(hex!("8a8d7fe3af8caa085a7639a832001457dfb9128a8061142ad0335629ff23ff9c")),
    H256(hex!("feb3c337d7a51a6fbf00b9e34c52e1c9195c969bd4e7a0bfd51d5c5bed9c1167")),
    H256(hex!("e71f0aa83cc32edfbefa9f4d3e0174ca85182eec9f3a09f6a6c0df6377a510d7")),
    H256(hex!("31206fa80a50bb6abe29085058f16212212a60eec8f049fecb92d8c8e0a84bc0")),
    H256(hex!("21352bfecbeddde993839f614c3dac0a3ee37543f9b412b16199dc158e23b544")),
    H256(hex!("619e312724bb6d7c3153ed9de791d764a366b389af13c58bf8a8d90481a46765")),
    H256(hex!("7cdd2986268250628d0c10e385c58c6191e6fbe05191bcc04f133f2cea72c1c4")),
    H256(hex!("848930bd7ba8cac54661072113fb278869e07bb8587f91392933374d017bcbe1")),
    H256(hex!("8869ff2c22b28cc10510d9853292803328be4fb0e80495e8bb8d271f5b889636")),
    H256(hex!("b5fe28e79f1b850f8658246ce9b6a1e7b49fc06db7143e8fe0b4f2b0c5523a5c")),
    H256(hex!("985e929f70af28d0bdd1a90a808f977f597c7c778c489e98d3bd8910d31ac0f7")),
];

// Two 32-byte words fill a whole SHA-256 block, so the padding goes into a block of its own.
#[rustfmt::skip]
const PADDING_BLOCK_FOR_512_BITS: Sha256Block = hex!("
    80000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000000
    00000000 00000000 00000000 00000200
");

type Sha256BlockSize = <Sha256 as BlockSizeUser>::BlockSize;
type Sha256Block = [u8; Sha256BlockSize::USIZE];

struct Sha256State([u32; 8]);

impl Default for Sha256State {
    #[rustfmt::skip]
    fn default() -> Self {
        Self([
            0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a,
            0x510e_527f, 0x9b05_688c, 0x1f83_d9ab, 0x5be0_cd19,
        ])
    }
}

impl Sha256State {
    fn compress_multiple(mut self, blocks: &[GenericArray<u8, Sha256BlockSize>]) -> Self {
        sha2::compress256(&mut self.0, blocks);
        self
    }

    fn output(self) -> H256 {
        let mut output = H256::default();

        for (o, s) in output.as_bytes_mut().chunks_exact_mut(4).zip(self.0) {
            o.copy_from_slice(&s.to_be_bytes());
        }

        output
    }
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut block = GenericArray::default();
    block[..32].copy_from_slice(left.as_bytes());
    block[32..].copy_from_slice(right.as_bytes());

    let padding_block = *GenericArray::from_slice(&PADDING_BLOCK_FOR_512_BITS);

    Sha256State::default()
        .compress_multiple(&[block, padding_block])
        .output()
}

/// Encodes `value` the way SSZ encodes a `uint64` chunk: little-endian, zero-padded to 32 bytes.
#[inline]
#[must_use]
pub fn u64_chunk(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// [`mix_in_length`](https://github.com/ethereum/consensus-specs/blob/v1.4.0/ssz/simple-serialize.md#merkleization)
#[inline]
#[must_use]
pub fn mix_in_length(root: H256, length: u64) -> H256 {
    hash_256_256(root, u64_chunk(length))
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use sha2::Digest as _;

    use super::*;

    #[test]
    fn higher_zero_hashes_are_calculated_from_lower_ones() {
        for (lower, higher) in ZERO_HASHES.into_iter().tuple_windows() {
            assert_eq!(hash_256_256(lower, lower), higher);
        }
    }

    #[test]
    fn hash_256_256_matches_sha2_digest() {
        let left = H256::repeat_byte(0xaa);
        let right = H256::repeat_byte(0xbb);

        let expected = Sha256::new()
            .chain_update(left.as_bytes())
            .chain_update(right.as_bytes())
            .finalize();

        assert_eq!(hash_256_256(left, right).as_bytes(), expected.as_slice());
    }

    #[test]
    fn u64_chunk_is_little_endian() {
        let chunk = u64_chunk(0x0102);

        assert_eq!(chunk[0], 0x02);
        assert_eq!(chunk[1], 0x01);
        assert!(chunk[2..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn empty_deposit_contract_root() {
        let empty_tree_root = hash_256_256(ZERO_HASHES[31], ZERO_HASHES[31]);

        assert_eq!(
            mix_in_length(empty_tree_root, 0),
            H256(hex!(
                "d70a234731285c6804c2a4f56711ddb8c82c99740f207854891028af34e27e5e"
            )),
        );
    }
}
