//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with the 4-byte key repeated over the payload, so the
//! same operation masks and unmasks.

/// Byte-by-byte XOR masking.
///
/// # Example
///
/// ```
/// use wsrv::protocol::mask::apply_mask;
///
/// let mask = [0x37, 0xfa, 0x21, 0x3d];
/// let mut data = b"Hello".to_vec();
/// apply_mask(&mut data, mask);
/// assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
/// ```
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking, processing 8 bytes per step.
///
/// Produces exactly the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u64 = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ mask_u64;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    // Each chunk is a multiple of 4 long, so the tail starts at key index 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);
        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_rfc_example() {
        // RFC 6455 Section 5.7: masked "Hello"
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = vec![0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, mask);
        assert_eq!(data, b"Hello");
    }

    #[test]
    fn test_masking_empty() {
        let mut data: Vec<u8> = Vec::new();
        apply_mask(&mut data, [1, 2, 3, 4]);
        apply_mask_fast(&mut data, [1, 2, 3, 4]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_fast_equivalent() {
        let mask = [0xab, 0xcd, 0xef, 0x12];

        for size in [0, 1, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 63, 64, 65, 125, 1000] {
            let original: Vec<u8> = (0..size).map(|i| (i * 7 + 3) as u8).collect();

            let mut data_scalar = original.clone();
            apply_mask(&mut data_scalar, mask);

            let mut data_fast = original.clone();
            apply_mask_fast(&mut data_fast, mask);

            assert_eq!(data_scalar, data_fast, "mismatch at size {}", size);
        }
    }

    #[test]
    fn test_zero_mask_is_identity() {
        let original = b"unchanged".to_vec();
        let mut data = original.clone();
        apply_mask_fast(&mut data, [0, 0, 0, 0]);
        assert_eq!(data, original);
    }
}
