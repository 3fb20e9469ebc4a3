//! Host tile buffer protocol
//!
//! The host hands out pixel data one rectangle at a time: the caller asks for
//! a rectangle over a range of planes, the host makes that tile current, and
//! output tiles must be committed before the next request. Within one request
//! the planes are interleaved per pixel.

mod memory;

use std::ops::Range;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::depth::BitDepth;
use crate::image_pipeline::tiling::TileRect;

pub use memory::MemoryHost;

/// Status used when a host tile request or tile view breaks the protocol:
/// a request while the current tile awaits its commit, a plane range outside
/// the layer, or a tile buffer too small for its rectangle.
pub const PROTOCOL_VIOLATION: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Gray,
    Rgb,
}

impl ColorMode {
    pub fn color_planes(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// Shape of the host image the engine is reading from or writing into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    pub width: u32,
    pub height: u32,
    pub depth: BitDepth,
    pub mode: ColorMode,
    /// The layer carries a transparency plane after its color planes.
    pub has_transparency: bool,
    /// The transparency plane may be written.
    pub can_edit_transparency: bool,
    /// Host tile suggestion; non-positive values mean "no preference".
    pub suggested_tile: (i32, i32),
}

impl HostLayout {
    pub fn color_planes(&self) -> usize {
        self.mode.color_planes()
    }

    pub fn plane_count(&self) -> usize {
        self.color_planes() + usize::from(self.has_transparency)
    }

    pub fn alpha_plane(&self) -> Option<usize> {
        self.has_transparency.then(|| self.color_planes())
    }

    /// Alpha plane index when it exists and may be written.
    pub fn editable_alpha_plane(&self) -> Option<usize> {
        self.alpha_plane().filter(|_| self.can_edit_transparency)
    }
}

/// Read-only strided view of one tile; planes interleave within a pixel.
#[derive(Debug, Clone, Copy)]
pub struct TileView<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl TileView<'_> {
    /// Whether the view holds `columns` x `rows` pixels of `sample_bytes`.
    pub fn covers(&self, columns: usize, rows: usize, sample_bytes: usize) -> bool {
        tile_extent(self.row_stride, self.pixel_stride, columns, rows, sample_bytes)
            .is_some_and(|needed| needed <= self.data.len())
    }
}

/// Writable strided view of one tile.
#[derive(Debug)]
pub struct TileViewMut<'a> {
    pub data: &'a mut [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl TileViewMut<'_> {
    pub fn covers(&self, columns: usize, rows: usize, sample_bytes: usize) -> bool {
        tile_extent(self.row_stride, self.pixel_stride, columns, rows, sample_bytes)
            .is_some_and(|needed| needed <= self.data.len())
    }
}

fn tile_extent(
    row_stride: usize,
    pixel_stride: usize,
    columns: usize,
    rows: usize,
    sample_bytes: usize,
) -> Option<usize> {
    if columns == 0 || rows == 0 {
        return Some(0);
    }
    let last_row = row_stride.checked_mul(rows - 1)?;
    let last_pixel = pixel_stride.checked_mul(columns - 1)?;
    last_row.checked_add(last_pixel)?.checked_add(sample_bytes.max(pixel_stride))
}

/// Selection mask for the current output tile; non-zero includes a pixel.
#[derive(Debug, Clone, Copy)]
pub struct MaskTile<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
}

impl MaskTile<'_> {
    pub fn includes(&self, row: usize, column: usize) -> bool {
        self.data[row * self.row_stride + column] != 0
    }
}

pub trait HostTileBuffer {
    fn layout(&self) -> &HostLayout;

    /// Makes `rect` over `planes` the current input tile.
    fn request_input(&mut self, rect: TileRect, planes: Range<usize>) -> Result<()>;
    fn input_tile(&self) -> TileView<'_>;

    /// Makes `rect` over `planes` the current output tile.
    fn request_output(&mut self, rect: TileRect, planes: Range<usize>) -> Result<()>;
    fn output_tile(&mut self) -> TileViewMut<'_>;

    /// Mask aligned with the current output tile, if the host has a selection.
    fn mask(&self) -> Option<MaskTile<'_>>;

    /// Advances past the current tile, writing an output tile back to the
    /// host. Every requested tile is committed before the next request. A
    /// failure carries the host's own status code.
    fn commit(&mut self) -> Result<()>;

    fn is_cancelled(&self) -> bool {
        false
    }
}
