//! Property-based tests for Galois field arithmetic across all four field sizes.

use proptest::prelude::*;
use sliding_fec::GaloisField;

fn field_strategy() -> impl Strategy<Value = GaloisField> {
    prop_oneof![
        Just(GaloisField::Gf16),
        Just(GaloisField::Gf256),
        Just(GaloisField::Gf64K),
    ]
}

proptest! {
    /// `mul(a, inv(a)) == 1` for every nonzero element in GF16/GF256/GF64K.
    /// GF4G is excluded here (2^32 elements; covered by a narrower test below).
    #[test]
    fn mul_by_inverse_is_one(gf in field_strategy(), a in 1u32..=0xFFFFu32) {
        let a = a.min(gf.max_value());
        prop_assume!(a != 0);
        let inv_a = gf.inv(a);
        prop_assert_eq!(gf.mul(a, inv_a), 1);
    }

    /// `div(a, b) == mul(a, inv(b))` for nonzero a, b.
    #[test]
    fn div_matches_mul_by_inverse(gf in field_strategy(), a in 1u32..=0xFFFFu32, b in 1u32..=0xFFFFu32) {
        let a = a.min(gf.max_value()).max(1);
        let b = b.min(gf.max_value()).max(1);
        prop_assert_eq!(gf.div(a, b), gf.mul(a, gf.inv(b)));
    }

    /// `multiply_add` applied twice with the same coefficient cancels out,
    /// since xor is its own inverse and the field multiply is deterministic.
    #[test]
    fn multiply_add_is_self_inverse(
        gf in field_strategy(),
        coef in 1u32..=0xFFFFu32,
        bytes in prop::collection::vec(any::<u8>(), 16..=64),
    ) {
        let coef = coef.min(gf.max_value()).max(1);
        let aligned_len = bytes.len() - (bytes.len() % 16);
        prop_assume!(aligned_len > 0);
        let src = &bytes[..aligned_len];
        let mut dst = vec![0u8; aligned_len];
        let original = dst.clone();
        gf.multiply_add(&mut dst, coef, src).unwrap();
        gf.multiply_add(&mut dst, coef, src).unwrap();
        prop_assert_eq!(dst, original);
    }

    /// `scale` by a coefficient's inverse undoes a `multiply_add` against a
    /// zero destination, recovering the original source exactly.
    #[test]
    fn scale_by_inverse_undoes_multiply_add(
        coef in 1u32..=255u32,
        bytes in prop::collection::vec(any::<u8>(), 1..=64),
    ) {
        let gf = GaloisField::Gf256;
        let aligned_len = bytes.len().max(16);
        let mut src = bytes;
        src.resize(aligned_len, 0);
        let mut dst = vec![0u8; aligned_len];
        gf.multiply_add(&mut dst, coef, &src).unwrap();
        gf.scale(&mut dst, gf.inv(coef)).unwrap();
        prop_assert_eq!(dst, src);
    }

    /// `multiply_add` rejects any destination length not a multiple of the
    /// field's lane width, for GF64K (2 bytes) and GF4G (4 bytes).
    #[test]
    fn multiply_add_rejects_misaligned_lengths(len in 1usize..64) {
        let gf16k = GaloisField::Gf64K;
        if len % 2 != 0 {
            let mut dst = vec![0u8; len];
            prop_assert!(gf16k.multiply_add(&mut dst, 1, &vec![0u8; len]).is_err());
        }
        let gf4g = GaloisField::Gf4G;
        if len % 4 != 0 {
            let mut dst = vec![0u8; len];
            prop_assert!(gf4g.multiply_add(&mut dst, 1, &vec![0u8; len]).is_err());
        }
    }
}

proptest! {
    /// GF4G: same inverse/mul laws, sampled over a smaller exponent range
    /// since the full field has 2^32 elements.
    #[test]
    fn gf4g_mul_by_inverse_is_one(a in 1u32..=100_000u32) {
        let gf = GaloisField::Gf4G;
        let inv_a = gf.inv(a);
        prop_assert_eq!(gf.mul(a, inv_a), 1);
    }
}
