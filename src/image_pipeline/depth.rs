//! Bit depths, per-depth sample semantics and the 16-bit range converter.
//!
//! The host stores 16-bit samples in `0..=32768`, the stream uses the full
//! `0..=65535`. The two mappings below are not exact inverses: host to stream
//! to host is lossless, stream to host to stream drifts by at most one.

use std::sync::LazyLock;

use crate::image_pipeline::common::error::{Result, TranscodeError};

/// Largest 16-bit sample value in host convention.
pub const HOST_16BIT_MAX: u16 = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    pub fn from_bits(bits: i32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            32 => Ok(Self::ThirtyTwo),
            _ => Err(TranscodeError::UnsupportedDepth(format!(
                "{bits} bits per channel"
            ))),
        }
    }

    pub fn bits(self) -> i32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Eight => 1,
            Self::Sixteen => 2,
            Self::ThirtyTwo => 4,
        }
    }
}

/// Per-depth numeric semantics for host samples.
///
/// Tile walks are written once against this trait; the depth-specific
/// maximum and rounding rule live in the impls.
pub trait Sample: Copy {
    const BYTES: usize;
    /// Fully opaque / full intensity in host convention.
    const FULL: f64;

    fn read(bytes: &[u8]) -> Self;
    fn write(self, out: &mut [u8]);
    fn to_f64(self) -> f64;
    /// Converts a scaled value back, applying this depth's rounding and clamp.
    fn from_scaled(value: f64) -> Self;
}

impl Sample for u8 {
    const BYTES: usize = 1;
    const FULL: f64 = 255.0;

    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write(self, out: &mut [u8]) {
        out[0] = self;
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_scaled(value: f64) -> Self {
        value.round().clamp(0.0, Self::FULL) as u8
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;
    const FULL: f64 = HOST_16BIT_MAX as f64;

    fn read(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }

    fn write(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_ne_bytes());
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_scaled(value: f64) -> Self {
        value.round().clamp(0.0, Self::FULL) as u16
    }
}

impl Sample for f32 {
    const BYTES: usize = 4;
    const FULL: f64 = 1.0;

    fn read(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    // Floats are not quantised, only clamped.
    fn from_scaled(value: f64) -> Self {
        value.min(Self::FULL) as f32
    }
}

static HOST_TO_STREAM: LazyLock<Box<[u16]>> =
    LazyLock::new(|| (0..=u16::MAX).map(normalize_16bit_value).collect());

static STREAM_TO_HOST: LazyLock<Box<[u16]>> =
    LazyLock::new(|| (0..=u16::MAX).map(host_16bit_value).collect());

fn normalize_16bit_value(value: u16) -> u16 {
    if value > 32767 { u16::MAX } else { value * 2 }
}

fn host_16bit_value(value: u16) -> u16 {
    ((u32::from(value) * 32768 + 32767) / 65535) as u16
}

/// Host to stream mapping for one 16-bit sample.
pub fn normalize_16bit_range(value: u16) -> u16 {
    HOST_TO_STREAM[usize::from(value)]
}

/// Stream to host mapping for one 16-bit sample.
pub fn host_16bit_range(value: u16) -> u16 {
    STREAM_TO_HOST[usize::from(value)]
}

/// Rewrites a buffer of native-endian 16-bit host samples into stream range.
pub fn normalize_16bit_in_place(bytes: &mut [u8]) {
    apply_table(&HOST_TO_STREAM, bytes);
}

/// Rewrites a buffer of native-endian 16-bit stream samples into host range.
pub fn host_16bit_in_place(bytes: &mut [u8]) {
    apply_table(&STREAM_TO_HOST, bytes);
}

fn apply_table(table: &[u16], bytes: &mut [u8]) {
    for chunk in bytes.chunks_exact_mut(2) {
        let mapped = table[usize::from(u16::read(chunk))];
        mapped.write(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_saturates_above_half_range() {
        assert_eq!(normalize_16bit_range(0), 0);
        assert_eq!(normalize_16bit_range(32767), 65534);
        assert_eq!(normalize_16bit_range(32768), 65535);
        assert_eq!(normalize_16bit_range(u16::MAX), 65535);
    }

    #[test]
    fn host_range_endpoints() {
        assert_eq!(host_16bit_range(0), 0);
        assert_eq!(host_16bit_range(65535), HOST_16BIT_MAX);
        assert_eq!(host_16bit_range(1), 1);
    }

    #[test]
    fn host_values_survive_the_stream() {
        for value in 0..=HOST_16BIT_MAX {
            assert_eq!(host_16bit_range(normalize_16bit_range(value)), value);
        }
    }

    #[test]
    fn in_place_rewrites_every_sample() {
        let mut bytes = Vec::new();
        for value in [0_u16, 100, 32768] {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        normalize_16bit_in_place(&mut bytes);
        let values: Vec<u16> = bytes.chunks_exact(2).map(u16::read).collect();
        assert_eq!(values, vec![0, 200, 65535]);
    }

    #[test]
    fn depth_codes() {
        assert_eq!(BitDepth::from_bits(16).unwrap(), BitDepth::Sixteen);
        assert_eq!(BitDepth::ThirtyTwo.bytes_per_sample(), 4);
        assert!(matches!(
            BitDepth::from_bits(12),
            Err(TranscodeError::UnsupportedDepth(_))
        ));
    }

    #[test]
    fn float_samples_clamp_without_rounding() {
        assert_eq!(f32::from_scaled(0.25), 0.25);
        assert_eq!(f32::from_scaled(1.5), 1.0);
        assert_eq!(u8::from_scaled(127.5), 128);
    }

    #[test]
    fn scaled_values_clamp_to_full_intensity() {
        assert_eq!(u8::from_scaled(300.0), 255);
        assert_eq!(u16::from_scaled(40000.0), HOST_16BIT_MAX);
        assert_eq!(u16::from_scaled(32767.6), HOST_16BIT_MAX);
        assert_eq!(u16::from_scaled(-3.0), 0);
        assert_eq!(f32::from_scaled(7.0), 1.0);
        assert_eq!(<u16 as Sample>::FULL, f64::from(HOST_16BIT_MAX));
    }
}
