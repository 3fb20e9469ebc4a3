//! Planar tile stream module
//!
//! This module provides the self-describing stream format exchanged with the
//! filter process: the fixed header, the planar reader and writer, and the
//! endpoints they operate on.

pub mod header;
pub mod io;
mod reader;
pub mod types;
mod writer;

pub use header::{DEFAULT_SIGNATURE, FORMAT_VERSION, HEADER_LENGTH, StreamHeader};
pub use io::{StreamSink, StreamSource};
pub use reader::{PlanarStreamReader, TileStreamReader};
pub use types::{ChannelRole, ExchangeConfig, ExchangeConfigBuilder, ReadSummary};
pub use writer::{PlanarStreamWriter, TileStreamWriter};
