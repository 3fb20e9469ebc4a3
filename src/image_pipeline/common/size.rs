//! Overflow-checked size arithmetic
//!
//! Every buffer length and stream offset goes through these helpers so that an
//! absurd header or host layout surfaces as [`TranscodeError::Overflow`]
//! instead of a wrapped value.

use crate::image_pipeline::common::error::{Result, TranscodeError};

pub fn checked_mul(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| TranscodeError::Overflow(format!("{what}: {a} * {b}")))
}

pub fn checked_add(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_add(b)
        .ok_or_else(|| TranscodeError::Overflow(format!("{what}: {a} + {b}")))
}

pub fn checked_mul_u64(a: u64, b: u64, what: &str) -> Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| TranscodeError::Overflow(format!("{what}: {a} * {b}")))
}

pub fn checked_add_u64(a: u64, b: u64, what: &str) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| TranscodeError::Overflow(format!("{what}: {a} + {b}")))
}

/// Bytes in one row of `columns` samples.
pub fn row_bytes(columns: u32, bytes_per_sample: usize) -> Result<usize> {
    checked_mul(to_usize(columns)?, bytes_per_sample, "row byte count")
}

/// Bytes in a `columns` x `rows` single-plane tile.
pub fn tile_bytes(columns: u32, rows: u32, bytes_per_sample: usize) -> Result<usize> {
    checked_mul(row_bytes(columns, bytes_per_sample)?, to_usize(rows)?, "tile byte count")
}

/// Bytes in one complete planar channel block.
pub fn plane_bytes(width: u32, height: u32, bytes_per_sample: usize) -> Result<u64> {
    let samples = checked_mul_u64(u64::from(width), u64::from(height), "plane sample count")?;
    checked_mul_u64(samples, bytes_per_sample as u64, "plane byte count")
}

/// Header plus `channels` planar blocks, or `None` when it cannot be represented.
pub fn stream_length(
    header_len: usize,
    width: u32,
    height: u32,
    channels: u32,
    bytes_per_sample: usize,
) -> Option<u64> {
    plane_bytes(width, height, bytes_per_sample)
        .and_then(|plane| checked_mul_u64(plane, u64::from(channels), "payload byte count"))
        .and_then(|payload| checked_add_u64(payload, header_len as u64, "stream byte count"))
        .ok()
}

pub fn to_usize(value: u32) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| TranscodeError::Overflow(format!("{value} exceeds platform usize")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_bytes_multiplies_all_terms() {
        assert_eq!(tile_bytes(4, 3, 2).unwrap(), 24);
        assert_eq!(row_bytes(10, 4).unwrap(), 40);
    }

    #[test]
    fn overflow_is_reported() {
        let err = checked_mul(usize::MAX, 2, "test").unwrap_err();
        assert!(matches!(err, TranscodeError::Overflow(_)));
        let err = checked_add(usize::MAX, 1, "test").unwrap_err();
        assert!(matches!(err, TranscodeError::Overflow(_)));
    }

    #[test]
    fn stream_length_is_none_when_unrepresentable() {
        assert_eq!(stream_length(40, 10, 10, 4, 1), Some(440));
        assert_eq!(stream_length(40, u32::MAX, u32::MAX, 4, 4), None);
    }
}
