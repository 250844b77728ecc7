//! 16-byte-aligned symbol storage, for SIMD-friendly `multiply_add`.

use bytes::{Bytes, BytesMut};

/// Round `len` up to the next multiple of `align` (align must be a power of two).
pub fn align_up(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

/// A byte buffer whose length is always a multiple of 16 bytes.
///
/// Resizing upward zero-extends the newly exposed bytes; this is a
/// precondition for correct repair encoding, since `multiply_add` reads the
/// full (padded) length of every symbol it touches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolBuffer {
    data: BytesMut,
}

impl SymbolBuffer {
    /// Allocate a zeroed buffer whose length is `align_up(len, 16)`.
    pub fn zeroed(len: usize) -> Self {
        let aligned = align_up(len, 16);
        let mut data = BytesMut::with_capacity(aligned);
        data.resize(aligned, 0);
        SymbolBuffer { data }
    }

    /// Copy `src` into a newly allocated, 16-byte-aligned buffer, zero-padding the tail.
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = SymbolBuffer::zeroed(src.len());
        buf.data[..src.len()].copy_from_slice(src);
        buf
    }

    /// Resize to `align_up(new_len, 16)`, zeroing any newly exposed bytes.
    pub fn resize(&mut self, new_len: usize) {
        let aligned = align_up(new_len, 16);
        self.data.resize(aligned, 0);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Freeze into an immutable, cheaply-cloneable `Bytes`, truncated to
    /// `user_size` meaningful bytes for delivery to the application.
    pub fn to_bytes_truncated(&self, user_size: u16) -> Bytes {
        Bytes::copy_from_slice(&self.data[..(user_size as usize).min(self.data.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_16() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 16), 32);
    }

    #[test]
    fn zeroed_is_aligned_and_zero() {
        let buf = SymbolBuffer::zeroed(5);
        assert_eq!(buf.len(), 16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_slice_preserves_prefix_and_pads() {
        let buf = SymbolBuffer::from_slice(b"abcd");
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf.as_slice()[..4], b"abcd");
        assert!(buf.as_slice()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn resize_up_then_down_then_up_zeroes_newly_exposed_bytes() {
        let mut buf = SymbolBuffer::from_slice(b"abcd");
        buf.resize(32);
        assert_eq!(buf.len(), 32);
        buf.as_mut_slice()[20] = 0xFF;
        buf.resize(4); // shrink back down to one block
        assert_eq!(buf.len(), 16);
        buf.resize(32); // grow again: byte 20 must be zero again, not 0xFF
        assert_eq!(buf.as_slice()[20], 0);
    }

    #[test]
    fn equality_is_bytewise() {
        let a = SymbolBuffer::from_slice(b"abcd");
        let b = SymbolBuffer::from_slice(b"abcd");
        assert_eq!(a, b);
    }

    #[test]
    fn to_bytes_truncated_respects_user_size() {
        let buf = SymbolBuffer::from_slice(b"abcdXXXXXXXXXXXX");
        let out = buf.to_bytes_truncated(4);
        assert_eq!(&out[..], b"abcd");
    }
}
