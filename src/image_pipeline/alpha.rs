//! Alpha compositing on tiles: premultiplication and forced opacity.
//!
//! Both operations skip pixels whose mask byte is zero. They are written
//! once against [`Sample`] and dispatched per [`BitDepth`].

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::common::size;
use crate::image_pipeline::depth::{BitDepth, Sample};
use crate::image_pipeline::host::{HostTileBuffer, MaskTile, TileView, TileViewMut};
use crate::image_pipeline::tiling::TileIterator;

fn for_each_included(
    columns: usize,
    rows: usize,
    mask: Option<&MaskTile<'_>>,
    mut visit: impl FnMut(usize, usize),
) {
    for row in 0..rows {
        for column in 0..columns {
            if mask.is_none_or(|mask| mask.includes(row, column)) {
                visit(row, column);
            }
        }
    }
}

/// `color = round(color * alpha / FULL)`, clamped to `FULL`.
pub fn premultiply_tile<S: Sample>(
    color: &mut TileViewMut<'_>,
    alpha: &TileView<'_>,
    columns: usize,
    rows: usize,
    mask: Option<&MaskTile<'_>>,
) {
    for_each_included(columns, rows, mask, |row, column| {
        let a = row * alpha.row_stride + column * alpha.pixel_stride;
        let c = row * color.row_stride + column * color.pixel_stride;
        let alpha_value = S::read(&alpha.data[a..]).to_f64();
        let color_value = S::read(&color.data[c..]).to_f64();
        S::from_scaled(color_value * alpha_value / S::FULL).write(&mut color.data[c..]);
    });
}

/// Writes the depth's maximum into every included sample of `alpha`.
pub fn force_opaque_tile<S: Sample>(
    alpha: &mut TileViewMut<'_>,
    columns: usize,
    rows: usize,
    mask: Option<&MaskTile<'_>>,
) {
    let opaque = S::from_scaled(S::FULL);
    for_each_included(columns, rows, mask, |row, column| {
        let offset = row * alpha.row_stride + column * alpha.pixel_stride;
        opaque.write(&mut alpha.data[offset..]);
    });
}

pub fn premultiply(
    depth: BitDepth,
    color: &mut TileViewMut<'_>,
    alpha: &TileView<'_>,
    columns: usize,
    rows: usize,
    mask: Option<&MaskTile<'_>>,
) {
    match depth {
        BitDepth::Eight => premultiply_tile::<u8>(color, alpha, columns, rows, mask),
        BitDepth::Sixteen => premultiply_tile::<u16>(color, alpha, columns, rows, mask),
        BitDepth::ThirtyTwo => premultiply_tile::<f32>(color, alpha, columns, rows, mask),
    }
}

pub fn force_opaque(
    depth: BitDepth,
    alpha: &mut TileViewMut<'_>,
    columns: usize,
    rows: usize,
    mask: Option<&MaskTile<'_>>,
) {
    match depth {
        BitDepth::Eight => force_opaque_tile::<u8>(alpha, columns, rows, mask),
        BitDepth::Sixteen => force_opaque_tile::<u16>(alpha, columns, rows, mask),
        BitDepth::ThirtyTwo => force_opaque_tile::<f32>(alpha, columns, rows, mask),
    }
}

/// Copies the host's mask for the current tile into `buffer`, returning its
/// row stride. The host view cannot be held while the output tile is borrowed.
pub(crate) fn snapshot_mask(host: &dyn HostTileBuffer, buffer: &mut Vec<u8>) -> Option<usize> {
    let mask = host.mask()?;
    buffer.clear();
    buffer.extend_from_slice(mask.data);
    Some(mask.row_stride)
}

/// Applies alpha operations to whole host layers, tile by tile.
#[derive(Debug, Clone, Copy)]
pub struct AlphaCompositor {
    tile_width: u32,
    tile_height: u32,
}

impl AlphaCompositor {
    pub fn new(tile_width: u32, tile_height: u32) -> Self {
        Self {
            tile_width,
            tile_height,
        }
    }

    /// Makes every mask-included pixel of the host's transparency plane fully
    /// opaque. Returns the number of tiles committed.
    #[instrument(skip(self, host))]
    pub fn force_opaque_host(&self, host: &mut dyn HostTileBuffer) -> Result<u64> {
        let layout = host.layout().clone();
        let alpha_plane = layout.editable_alpha_plane().ok_or_else(|| {
            TranscodeError::UnsupportedMode("host layer has no editable transparency".to_string())
        })?;

        let mut mask_buffer = Vec::new();
        let mut tiles = 0_u64;
        let walk =
            TileIterator::new(layout.width, layout.height, self.tile_width, self.tile_height);
        for rect in walk {
            if host.is_cancelled() {
                return Err(TranscodeError::UserCancelled);
            }
            host.request_output(rect, alpha_plane..alpha_plane + 1)?;

            let mask_stride = snapshot_mask(host, &mut mask_buffer);
            let mask = mask_stride.map(|row_stride| MaskTile {
                data: &mask_buffer,
                row_stride,
            });
            let columns = size::to_usize(rect.columns())?;
            let rows = size::to_usize(rect.rows())?;
            force_opaque(layout.depth, &mut host.output_tile(), columns, rows, mask.as_ref());

            host.commit()?;
            tiles += 1;
        }

        debug!(tiles, "transparency forced opaque");
        Ok(tiles)
    }
}
