//! Exchange configuration and shared stream types

use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::stream::header::{DEFAULT_SIGNATURE, StreamHeader};

/// What a stream channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Gray,
    Red,
    Green,
    Blue,
    Alpha,
}

/// Roles for `channels` channels; when present, alpha is always last.
pub fn channel_roles(channels: usize, grayscale: bool) -> Vec<ChannelRole> {
    let color: &[ChannelRole] = if grayscale {
        &[ChannelRole::Gray]
    } else {
        &[ChannelRole::Red, ChannelRole::Green, ChannelRole::Blue]
    };
    let mut roles: Vec<ChannelRole> = color.iter().copied().take(channels).collect();
    if channels > color.len() {
        roles.push(ChannelRole::Alpha);
    }
    roles
}

/// Configuration for stream import and export
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Tile size to use instead of the host's suggestion
    pub tile_size: Option<(u32, u32)>,
    /// Signature written to, and expected from, the stream
    pub signature: [u8; 4],
    /// Whether to hint the output of its final size before writing
    pub preallocate: bool,
    /// Whether to reject empty or oversized images before any I/O
    pub validate_dimensions: bool,
    /// Largest accepted width or height when validating
    pub max_dimension: Option<u32>,
    /// Whether to check the stream holds its full payload before reading
    pub verify_stream_length: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            tile_size: None,
            signature: DEFAULT_SIGNATURE,
            preallocate: true,
            validate_dimensions: true,
            max_dimension: None,
            verify_stream_length: true,
        }
    }
}

impl ExchangeConfig {
    pub fn builder() -> ExchangeConfigBuilder {
        ExchangeConfigBuilder::default()
    }

    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if !self.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(TranscodeError::InvalidDimensions(width, height));
        }

        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                return Err(TranscodeError::InvalidDimensions(width, height));
            }
        }

        Ok(())
    }
}

/// Builder for ExchangeConfig
#[derive(Default)]
pub struct ExchangeConfigBuilder {
    tile_size: Option<Option<(u32, u32)>>,
    signature: Option<[u8; 4]>,
    preallocate: Option<bool>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<u32>>,
    verify_stream_length: Option<bool>,
}

impl ExchangeConfigBuilder {
    pub fn tile_size(mut self, tile_size: Option<(u32, u32)>) -> Self {
        self.tile_size = Some(tile_size);
        self
    }

    pub fn signature(mut self, signature: [u8; 4]) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn preallocate(mut self, enable: bool) -> Self {
        self.preallocate = Some(enable);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<u32>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn verify_stream_length(mut self, verify: bool) -> Self {
        self.verify_stream_length = Some(verify);
        self
    }

    pub fn build(self) -> ExchangeConfig {
        let default = ExchangeConfig::default();
        ExchangeConfig {
            tile_size: self.tile_size.unwrap_or(default.tile_size),
            signature: self.signature.unwrap_or(default.signature),
            preallocate: self.preallocate.unwrap_or(default.preallocate),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
            verify_stream_length: self
                .verify_stream_length
                .unwrap_or(default.verify_stream_length),
        }
    }
}

/// What an import did to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSummary {
    pub header: StreamHeader,
    pub tiles_deposited: u64,
    pub expanded_gray: bool,
    pub premultiplied: bool,
    pub forced_opaque: bool,
}
