//! Tiled pixel exchange pipeline
//!
//! This module moves raster data between a tile-oriented host buffer and the
//! planar stream format, with separate modules for tiling, depth conversion,
//! alpha compositing, the stream codec and the orchestration on top.

pub mod alpha;
pub mod common;
pub mod conversions;
pub mod depth;
pub mod host;
pub mod stream;
pub mod tiling;

pub use common::{
    HostStatus,
    Result,
    TranscodeError,
};

pub use depth::BitDepth;

pub use host::{
    ColorMode,
    HostLayout,
    HostTileBuffer,
    MemoryHost,
};

pub use stream::{
    ExchangeConfig,
    ExchangeConfigBuilder,
    PlanarStreamReader,
    PlanarStreamWriter,
    ReadSummary,
    StreamHeader,
    TileStreamReader,
    TileStreamWriter,
};

pub use tiling::{TileIterator, TileRect};

pub use conversions::ExchangePipeline;
