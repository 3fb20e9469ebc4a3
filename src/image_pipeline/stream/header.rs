//! Fixed stream header
//!
//! ```text
//! offset 0  [u8; 4] signature
//! offset 4  [u8; 4] endianness tag, "LEDN" or "BEDN"
//! offset 8  i32     version
//! offset 12 i32     width
//! offset 16 i32     height
//! offset 20 i32     number of channels, 1..=4
//! offset 24 i32     bits per channel, 8 | 16 | 32
//! offset 28 i32     flags, bit 0 = planar
//! offset 32 i32     tile width
//! offset 36 i32     tile height
//! ```
//!
//! Integers use the byte order named by the tag. A stream tagged with the
//! other byte order is rejected, never swapped.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::common::size;
use crate::image_pipeline::depth::BitDepth;
use crate::image_pipeline::stream::types::{ChannelRole, channel_roles};
use crate::image_pipeline::tiling::TileRect;

pub const HEADER_LENGTH: usize = 40;
pub const FORMAT_VERSION: i32 = 1;
pub const DEFAULT_SIGNATURE: [u8; 4] = *b"G8IX";

const LITTLE_ENDIAN_TAG: [u8; 4] = *b"LEDN";
const BIG_ENDIAN_TAG: [u8; 4] = *b"BEDN";
const FLAG_PLANAR: i32 = 1;

const OFFSET_ENDIAN_TAG: usize = 4;
const OFFSET_VERSION: usize = 8;
const OFFSET_WIDTH: usize = 12;
const OFFSET_HEIGHT: usize = 16;
const OFFSET_CHANNELS: usize = 20;
const OFFSET_BITS: usize = 24;
const OFFSET_FLAGS: usize = 28;
const OFFSET_TILE_WIDTH: usize = 32;
const OFFSET_TILE_HEIGHT: usize = 36;

/// Tag matching the byte order of the running platform.
pub fn native_endian_tag() -> [u8; 4] {
    if cfg!(target_endian = "little") {
        LITTLE_ENDIAN_TAG
    } else {
        BIG_ENDIAN_TAG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub signature: [u8; 4],
    pub version: i32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub depth: BitDepth,
    pub planar: bool,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl StreamHeader {
    /// Builds the header for a stream about to be written.
    pub fn new(
        signature: [u8; 4],
        width: u32,
        height: u32,
        channels: u32,
        depth: BitDepth,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self> {
        let header = Self {
            signature,
            version: FORMAT_VERSION,
            width,
            height,
            channels,
            depth,
            planar: true,
            tile_width,
            tile_height,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.channels) {
            return Err(TranscodeError::UnsupportedMode(format!(
                "{} channels",
                self.channels
            )));
        }
        for (value, name) in [
            (self.width, "width"),
            (self.height, "height"),
            (self.tile_width, "tile width"),
            (self.tile_height, "tile height"),
        ] {
            if value == 0 || i32::try_from(value).is_err() {
                return Err(TranscodeError::Format(format!("{name} {value} out of range")));
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut bytes = [0_u8; HEADER_LENGTH];
        bytes[0..4].copy_from_slice(&self.signature);
        bytes[OFFSET_ENDIAN_TAG..OFFSET_ENDIAN_TAG + 4].copy_from_slice(&native_endian_tag());
        let flags = if self.planar { FLAG_PLANAR } else { 0 };
        for (offset, value) in [
            (OFFSET_VERSION, self.version),
            (OFFSET_WIDTH, self.width as i32),
            (OFFSET_HEIGHT, self.height as i32),
            (OFFSET_CHANNELS, self.channels as i32),
            (OFFSET_BITS, self.depth.bits()),
            (OFFSET_FLAGS, flags),
            (OFFSET_TILE_WIDTH, self.tile_width as i32),
            (OFFSET_TILE_HEIGHT, self.tile_height as i32),
        ] {
            bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        }
        bytes
    }

    /// Parses and validates a header against the expected signature and the
    /// platform byte order.
    pub fn from_bytes(bytes: &[u8], expected_signature: [u8; 4]) -> Result<Self> {
        if bytes.len() < HEADER_LENGTH {
            return Err(TranscodeError::Format(format!(
                "header needs {HEADER_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        if bytes[0..4] != expected_signature {
            return Err(TranscodeError::Format(format!(
                "signature {:?} does not match {:?}",
                String::from_utf8_lossy(&bytes[0..4]),
                String::from_utf8_lossy(&expected_signature)
            )));
        }

        let tag = &bytes[OFFSET_ENDIAN_TAG..OFFSET_ENDIAN_TAG + 4];
        if tag != native_endian_tag() {
            return Err(TranscodeError::Format(format!(
                "endianness tag {:?} does not match this platform",
                String::from_utf8_lossy(tag)
            )));
        }

        let version = read_i32(bytes, OFFSET_VERSION);
        if version != FORMAT_VERSION {
            return Err(TranscodeError::Format(format!("unsupported version {version}")));
        }

        let channels = read_i32(bytes, OFFSET_CHANNELS);
        let channels = u32::try_from(channels)
            .map_err(|_| TranscodeError::UnsupportedMode(format!("{channels} channels")))?;
        let depth = BitDepth::from_bits(read_i32(bytes, OFFSET_BITS))?;
        let flags = read_i32(bytes, OFFSET_FLAGS);

        let header = Self {
            signature: expected_signature,
            version,
            width: read_dimension(bytes, OFFSET_WIDTH, "width")?,
            height: read_dimension(bytes, OFFSET_HEIGHT, "height")?,
            channels,
            depth,
            planar: flags & FLAG_PLANAR != 0,
            tile_width: read_dimension(bytes, OFFSET_TILE_WIDTH, "tile width")?,
            tile_height: read_dimension(bytes, OFFSET_TILE_HEIGHT, "tile height")?,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn read_from<R: Read + ?Sized>(
        reader: &mut R,
        expected_signature: [u8; 4],
    ) -> Result<Self> {
        let mut bytes = [0_u8; HEADER_LENGTH];
        reader.read_exact(&mut bytes).map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                TranscodeError::Format("stream shorter than its header".to_string())
            }
            _ => TranscodeError::IoError(err),
        })?;
        Self::from_bytes(&bytes, expected_signature)
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Reads only the header of a stream file.
    pub fn inspect<P: AsRef<Path>>(path: P, expected_signature: [u8; 4]) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file, expected_signature)
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.depth.bytes_per_sample()
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 2 || self.channels == 4
    }

    pub fn is_grayscale(&self) -> bool {
        self.channels <= 2
    }

    pub fn color_channels(&self) -> usize {
        self.channels as usize - usize::from(self.has_alpha())
    }

    pub fn roles(&self) -> Vec<ChannelRole> {
        channel_roles(self.channels as usize, self.is_grayscale())
    }

    /// Bytes in one planar channel block.
    pub fn channel_bytes(&self) -> Result<u64> {
        size::plane_bytes(self.width, self.height, self.bytes_per_sample())
    }

    /// Total length of header and payload, or `None` if it does not fit in u64.
    pub fn stream_len(&self) -> Option<u64> {
        size::stream_length(
            HEADER_LENGTH,
            self.width,
            self.height,
            self.channels,
            self.bytes_per_sample(),
        )
    }

    /// Offset of channel block `channel` from the start of the stream.
    pub fn channel_offset(&self, channel: usize) -> Result<u64> {
        let skipped =
            size::checked_mul_u64(self.channel_bytes()?, channel as u64, "channel offset")?;
        size::checked_add_u64(skipped, HEADER_LENGTH as u64, "channel offset")
    }

    /// Offset of the tile `rect` within channel `channel`. Tiles follow
    /// [`TileIterator`](crate::image_pipeline::tiling::TileIterator) order, so
    /// every full band of tiles above `rect` precedes it, then the tiles to
    /// its left in the same band.
    pub fn tile_offset(&self, channel: usize, rect: TileRect) -> Result<u64> {
        let bps = self.bytes_per_sample() as u64;
        let above = u64::from(rect.top);
        let above = size::checked_mul_u64(above, u64::from(self.width), "tile offset")?;
        let left = u64::from(rect.rows());
        let left = size::checked_mul_u64(left, u64::from(rect.left), "tile offset")?;
        let samples = size::checked_add_u64(above, left, "tile offset")?;
        let within = size::checked_mul_u64(samples, bps, "tile offset")?;
        size::checked_add_u64(self.channel_offset(channel)?, within, "tile offset")
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut field = [0_u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_ne_bytes(field)
}

fn read_dimension(bytes: &[u8], offset: usize, name: &str) -> Result<u32> {
    let value = read_i32(bytes, offset);
    u32::try_from(value).map_err(|_| TranscodeError::Format(format!("{name} {value} out of range")))
}
