use tracing::{debug, info, instrument};

use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::common::size;
use crate::image_pipeline::depth::{BitDepth, normalize_16bit_in_place};
use crate::image_pipeline::host::{HostTileBuffer, PROTOCOL_VIOLATION, TileView};
use crate::image_pipeline::stream::header::StreamHeader;
use crate::image_pipeline::stream::io::StreamSink;
use crate::image_pipeline::stream::types::ExchangeConfig;
use crate::image_pipeline::tiling::{TileIterator, TileRect, resolve_tile_size};

pub trait TileStreamWriter {
    fn write_stream(
        &self,
        host: &mut dyn HostTileBuffer,
        output: &mut dyn StreamSink,
        config: &ExchangeConfig,
    ) -> Result<StreamHeader>;
}

/// Writes the host layer as a planar stream: every color plane, then the
/// transparency plane, each tile by tile.
pub struct PlanarStreamWriter;

impl TileStreamWriter for PlanarStreamWriter {
    #[instrument(skip_all)]
    fn write_stream(
        &self,
        host: &mut dyn HostTileBuffer,
        output: &mut dyn StreamSink,
        config: &ExchangeConfig,
    ) -> Result<StreamHeader> {
        let layout = host.layout().clone();
        config.check_dimensions(layout.width, layout.height)?;

        let (tile_width, tile_height) = match config.tile_size {
            Some((width, height)) => (width.max(1), height.max(1)),
            None => resolve_tile_size(layout.suggested_tile.0, layout.suggested_tile.1),
        };
        let channels = u32::try_from(layout.plane_count())
            .map_err(|_| TranscodeError::UnsupportedMode("too many host planes".to_string()))?;
        let header = StreamHeader::new(
            config.signature,
            layout.width,
            layout.height,
            channels,
            layout.depth,
            tile_width,
            tile_height,
        )?;

        if config.preallocate {
            preallocate(output, &header);
        }
        header.write_to(output)?;

        let mut tile_writer = TileWriter {
            depth: header.depth,
            scratch: Vec::new(),
            bulk_tiles: 0,
            row_tiles: 0,
        };
        let tiles = TileIterator::new(header.width, header.height, tile_width, tile_height);
        for plane in 0..layout.plane_count() {
            let _span = tracing::debug_span!("write_plane", plane).entered();
            for rect in tiles.clone() {
                if host.is_cancelled() {
                    return Err(TranscodeError::UserCancelled);
                }
                host.request_input(rect, plane..plane + 1)?;
                tile_writer.write_tile(&host.input_tile(), rect, output)?;
                host.commit()?;
            }
        }
        output.flush()?;

        info!(
            width = header.width,
            height = header.height,
            channels = header.channels,
            bits = header.depth.bits(),
            bulk_tiles = tile_writer.bulk_tiles,
            row_tiles = tile_writer.row_tiles,
            "stream written"
        );
        Ok(header)
    }
}

fn preallocate(output: &mut dyn StreamSink, header: &StreamHeader) {
    match header.stream_len() {
        Some(len) => {
            if let Err(err) = output.preallocate(len) {
                debug!(len, %err, "preallocation hint failed");
            }
        }
        None => debug!("stream length not representable, skipping preallocation"),
    }
}

struct TileWriter {
    depth: BitDepth,
    scratch: Vec<u8>,
    bulk_tiles: u64,
    row_tiles: u64,
}

impl TileWriter {
    /// Writes one single-plane host tile. A tile whose row stride equals the
    /// packed row length goes out in one write, otherwise row by row; both
    /// produce the same bytes.
    fn write_tile(
        &mut self,
        tile: &TileView<'_>,
        rect: TileRect,
        output: &mut dyn StreamSink,
    ) -> Result<()> {
        let bps = self.depth.bytes_per_sample();
        let columns = size::to_usize(rect.columns())?;
        let rows = size::to_usize(rect.rows())?;
        let row_len = size::row_bytes(rect.columns(), bps)?;
        if !tile.covers(columns, rows, bps) {
            return Err(TranscodeError::HostProtocol(PROTOCOL_VIOLATION));
        }

        if tile.row_stride == row_len && tile.pixel_stride == bps {
            let tile_len = size::checked_mul(row_len, rows, "tile byte count")?;
            let data = &tile.data[..tile_len];
            if self.depth == BitDepth::Sixteen {
                self.scratch.clear();
                self.scratch.extend_from_slice(data);
                normalize_16bit_in_place(&mut self.scratch);
                output.write_all(&self.scratch)?;
            } else {
                output.write_all(data)?;
            }
            self.bulk_tiles += 1;
            return Ok(());
        }

        self.scratch.resize(row_len, 0);
        for row in 0..rows {
            let start = row * tile.row_stride;
            if tile.pixel_stride == bps {
                self.scratch.copy_from_slice(&tile.data[start..start + row_len]);
            } else {
                for (column, sample) in self.scratch.chunks_exact_mut(bps).enumerate() {
                    let src = start + column * tile.pixel_stride;
                    sample.copy_from_slice(&tile.data[src..src + bps]);
                }
            }
            if self.depth == BitDepth::Sixteen {
                normalize_16bit_in_place(&mut self.scratch);
            }
            output.write_all(&self.scratch)?;
        }
        self.row_tiles += 1;
        Ok(())
    }
}
