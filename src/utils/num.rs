//! Numeric utilities: safe and centralized integer conversions.
//!
//! The binary format stores lengths and counts as `i32`/`i64` while Rust
//! slices speak `usize`; every crossing goes through these helpers so a
//! negative or oversized on-disk value is rejected instead of truncated.

#[inline]
#[must_use]
pub fn i32_to_usize(v: i32) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn i64_to_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn i64_to_u64(v: i64) -> Option<u64> {
    u64::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn usize_to_i32(v: usize) -> Option<i32> {
    i32::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    v as u64
}

#[inline]
#[must_use]
pub fn u64_to_usize(v: u64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_to_usize_rejects_negative() {
        assert_eq!(i32_to_usize(42), Some(42));
        assert_eq!(i32_to_usize(0), Some(0));
        assert_eq!(i32_to_usize(-1), None);
    }

    #[test]
    fn i64_conversions_reject_negative() {
        assert_eq!(i64_to_usize(10), Some(10));
        assert_eq!(i64_to_usize(-5), None);
        assert_eq!(i64_to_u64(7), Some(7));
        assert_eq!(i64_to_u64(-7), None);
    }

    #[test]
    fn usize_to_i32_rejects_overflow() {
        assert_eq!(usize_to_i32(123), Some(123));
        assert_eq!(usize_to_i32(usize::try_from(i32::MAX).unwrap() + 1), None);
    }

    #[test]
    fn usize_to_u64_is_lossless() {
        for &v in &[0usize, 1, 42, 10_000] {
            assert_eq!(usize_to_u64(v) as usize, v);
        }
    }
}
