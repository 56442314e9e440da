//! Alignment arithmetic.
//!
//! The writer fills the buffer from the back, so padding is computed against
//! the number of bytes already written rather than an absolute position.

/// Bytes of padding needed so that `len` becomes a multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub const fn padding_for(len: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    len.wrapping_neg() & (alignment - 1)
}

/// Check whether `position` is a multiple of `alignment`.
#[inline]
pub const fn is_aligned(position: usize, alignment: usize) -> bool {
    position & (alignment - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0, 4), 0);
        assert_eq!(padding_for(1, 4), 3);
        assert_eq!(padding_for(4, 4), 0);
        assert_eq!(padding_for(7, 8), 1);
        assert_eq!(padding_for(5, 1), 0);
    }

    #[test]
    fn test_is_aligned() {
        assert!(is_aligned(8, 4));
        assert!(!is_aligned(6, 4));
        assert!(is_aligned(6, 2));
    }
}
