//! Nonce arithmetic over 8-byte big-endian values
//!
//! Nonces are handed out sequentially from a `[next, max)` range owned by an
//! external sequencer. Ranges can be split to delegate half of the remaining
//! nonces to another authorized device.

use crate::generator::{fill_secure_random, NONCE_LENGTH};
use salmon_core::{SalmonError, SalmonResult};

pub type Nonce = [u8; NONCE_LENGTH];

/// Nonces that must remain in a range before it may be split.
pub const MIN_SPLIT_RANGE: i64 = 256;

/// A random nonce, for callers without a sequencer.
pub fn generate_nonce() -> Nonce {
    let mut nonce = [0u8; NONCE_LENGTH];
    fill_secure_random(&mut nonce);
    nonce
}

/// Return `start + 1`, failing if the increment overflows or reaches `end`.
pub fn increase_nonce(start: &Nonce, end: &Nonce) -> SalmonResult<Nonce> {
    let nonce = i64::from_be_bytes(*start);
    let max = i64::from_be_bytes(*end);
    let next = nonce
        .checked_add(1)
        .ok_or_else(|| SalmonError::RangeExceeded("nonce overflowed".into()))?;
    if next >= max {
        return Err(SalmonError::RangeExceeded(
            "nonce range exhausted, a new range is required".into(),
        ));
    }
    Ok(next.to_be_bytes())
}

/// Return the midpoint of `[start, end)`.
///
/// Fails if fewer than [`MIN_SPLIT_RANGE`] nonces remain, so a range that is
/// split repeatedly never leaves either side starved.
pub fn split_nonce_range(start: &Nonce, end: &Nonce) -> SalmonResult<Nonce> {
    let next = i64::from_be_bytes(*start) as i128;
    let max = i64::from_be_bytes(*end) as i128;
    if max - next < MIN_SPLIT_RANGE as i128 {
        return Err(SalmonError::Security(
            "not enough nonces left to split the range".into(),
        ));
    }
    let mid = next + (max - next) / 2;
    Ok((mid as i64).to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(v: i64) -> Nonce {
        v.to_be_bytes()
    }

    #[test]
    fn generated_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn increase_fails_at_end_of_range() {
        let end = n(1000);
        assert!(matches!(
            increase_nonce(&n(999), &end),
            Err(SalmonError::RangeExceeded(_))
        ));
        assert_eq!(increase_nonce(&n(998), &end).unwrap(), n(999));
    }

    #[test]
    fn increase_fails_on_signed_overflow() {
        assert!(matches!(
            increase_nonce(&n(i64::MAX), &n(i64::MAX)),
            Err(SalmonError::RangeExceeded(_))
        ));
    }

    #[test]
    fn increase_is_big_endian() {
        let next = increase_nonce(&[0, 0, 0, 0, 0, 0, 0, 0xFF], &n(i64::MAX)).unwrap();
        assert_eq!(next, [0, 0, 0, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn split_returns_midpoint() {
        assert_eq!(split_nonce_range(&n(0), &n(1024)).unwrap(), n(512));
        assert_eq!(split_nonce_range(&n(100), &n(357)).unwrap(), n(228));
    }

    #[test]
    fn split_rejects_small_ranges() {
        assert!(matches!(
            split_nonce_range(&n(0), &n(255)),
            Err(SalmonError::Security(_))
        ));
        assert!(split_nonce_range(&n(0), &n(256)).is_ok());
    }

    #[test]
    fn split_handles_full_signed_range() {
        let mid = split_nonce_range(&n(i64::MIN), &n(i64::MAX)).unwrap();
        assert_eq!(i64::from_be_bytes(mid), -1);
    }

    proptest! {
        #[test]
        fn split_point_lies_inside_range(start in -1_000_000_000i64..1_000_000_000, width in 256i64..1_000_000) {
            let mid = i64::from_be_bytes(split_nonce_range(&n(start), &n(start + width)).unwrap());
            prop_assert!(mid > start && mid < start + width);
        }
    }
}
