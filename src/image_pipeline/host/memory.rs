use std::ops::Range;

use tracing::trace;

use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::common::size;
use crate::image_pipeline::depth::Sample;
use crate::image_pipeline::host::{
    HostLayout, HostTileBuffer, MaskTile, PROTOCOL_VIOLATION, TileView, TileViewMut,
};
use crate::image_pipeline::tiling::TileRect;

/// Host image held in memory as one planar buffer per plane.
///
/// Tiles are copied out into an interleaved scratch buffer on request and
/// copied back on commit, the way a real host hands out tiles.
#[derive(Debug)]
pub struct MemoryHost {
    layout: HostLayout,
    planes: Vec<Vec<u8>>,
    mask: Option<Vec<u8>>,
    row_padding: usize,
    commit_failure: Option<i32>,
    cancel_after: Option<usize>,
    requests: usize,
    commits: usize,
    current: Option<CurrentTile>,
    scratch: Vec<u8>,
    mask_scratch: Vec<u8>,
}

#[derive(Debug, Clone)]
struct CurrentTile {
    rect: TileRect,
    planes: Range<usize>,
    output: bool,
    row_stride: usize,
    pixel_stride: usize,
    mask_stride: usize,
}

impl MemoryHost {
    /// Creates a host whose planes are all zero.
    pub fn new(layout: HostLayout) -> Result<Self> {
        let plane_len = host_plane_len(&layout)?;
        let planes = vec![vec![0_u8; plane_len]; layout.plane_count()];
        Ok(Self::with_planes(layout, planes))
    }

    /// Creates a host from planar data; plane `i` holds native-endian samples
    /// in row-major order.
    pub fn from_planes(layout: HostLayout, planes: Vec<Vec<u8>>) -> Result<Self> {
        let plane_len = host_plane_len(&layout)?;
        if planes.len() != layout.plane_count() || planes.iter().any(|p| p.len() != plane_len) {
            return Err(TranscodeError::UnsupportedMode(format!(
                "expected {} planes of {plane_len} bytes",
                layout.plane_count()
            )));
        }
        Ok(Self::with_planes(layout, planes))
    }

    fn with_planes(layout: HostLayout, planes: Vec<Vec<u8>>) -> Self {
        Self {
            layout,
            planes,
            mask: None,
            row_padding: 0,
            commit_failure: None,
            cancel_after: None,
            requests: 0,
            commits: 0,
            current: None,
            scratch: Vec::new(),
            mask_scratch: Vec::new(),
        }
    }

    /// Installs a selection mask, one byte per pixel, row-major.
    pub fn with_mask(mut self, mask: Vec<u8>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Pads every tile row by `bytes`, so tile strides never match the
    /// packed row length.
    pub fn with_row_padding(mut self, bytes: usize) -> Self {
        self.row_padding = bytes;
        self
    }

    /// Makes every commit fail with the given host status.
    pub fn with_commit_failure(mut self, code: i32) -> Self {
        self.commit_failure = Some(code);
        self
    }

    /// Reports cancellation once `requests` tiles have been handed out.
    pub fn cancel_after(mut self, requests: usize) -> Self {
        self.cancel_after = Some(requests);
        self
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    pub fn samples<S: Sample>(&self, index: usize) -> Vec<S> {
        self.planes[index].chunks_exact(S::BYTES).map(S::read).collect()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    fn begin(&mut self, rect: TileRect, planes: Range<usize>, output: bool) -> Result<()> {
        if self.current.is_some() {
            return Err(TranscodeError::HostProtocol(PROTOCOL_VIOLATION));
        }
        if planes.is_empty()
            || planes.end > self.planes.len()
            || rect.right > self.layout.width
            || rect.bottom > self.layout.height
        {
            return Err(TranscodeError::HostProtocol(PROTOCOL_VIOLATION));
        }
        self.requests += 1;

        let bps = self.layout.depth.bytes_per_sample();
        let pixel_stride = size::checked_mul(planes.len(), bps, "host pixel stride")?;
        let packed = size::row_bytes(rect.columns(), pixel_stride)?;
        let row_stride = size::checked_add(packed, self.row_padding, "host row stride")?;
        let rows = size::to_usize(rect.rows())?;
        self.scratch.clear();
        self.scratch
            .resize(size::checked_mul(row_stride, rows, "host tile")?, 0);

        let width = size::to_usize(self.layout.width)?;
        let left = size::to_usize(rect.left)?;
        let top = size::to_usize(rect.top)?;
        let columns = size::to_usize(rect.columns())?;
        for row in 0..rows {
            for column in 0..columns {
                let src = ((top + row) * width + left + column) * bps;
                let dst_pixel = row * row_stride + column * pixel_stride;
                for (slot, plane) in planes.clone().enumerate() {
                    let dst = dst_pixel + slot * bps;
                    self.scratch[dst..dst + bps]
                        .copy_from_slice(&self.planes[plane][src..src + bps]);
                }
            }
        }

        let mask_stride = columns + self.row_padding;
        self.mask_scratch.clear();
        if let Some(mask) = &self.mask {
            self.mask_scratch.resize(mask_stride * rows, 0);
            for row in 0..rows {
                let src = (top + row) * width + left;
                let dst = row * mask_stride;
                self.mask_scratch[dst..dst + columns].copy_from_slice(&mask[src..src + columns]);
            }
        }

        trace!(?rect, ?planes, output, "host tile requested");
        self.current = Some(CurrentTile {
            rect,
            planes,
            output,
            row_stride,
            pixel_stride,
            mask_stride,
        });
        Ok(())
    }

    fn current(&self) -> Option<&CurrentTile> {
        self.current.as_ref()
    }
}

impl HostTileBuffer for MemoryHost {
    fn layout(&self) -> &HostLayout {
        &self.layout
    }

    fn request_input(&mut self, rect: TileRect, planes: Range<usize>) -> Result<()> {
        self.begin(rect, planes, false)
    }

    fn input_tile(&self) -> TileView<'_> {
        let (row_stride, pixel_stride) = self
            .current()
            .map_or((0, 0), |tile| (tile.row_stride, tile.pixel_stride));
        TileView {
            data: &self.scratch,
            row_stride,
            pixel_stride,
        }
    }

    fn request_output(&mut self, rect: TileRect, planes: Range<usize>) -> Result<()> {
        self.begin(rect, planes, true)
    }

    fn output_tile(&mut self) -> TileViewMut<'_> {
        let (row_stride, pixel_stride) = self
            .current()
            .map_or((0, 0), |tile| (tile.row_stride, tile.pixel_stride));
        TileViewMut {
            data: &mut self.scratch,
            row_stride,
            pixel_stride,
        }
    }

    fn mask(&self) -> Option<MaskTile<'_>> {
        let tile = self.current()?;
        self.mask.as_ref()?;
        Some(MaskTile {
            data: &self.mask_scratch,
            row_stride: tile.mask_stride,
        })
    }

    fn commit(&mut self) -> Result<()> {
        let Some(tile) = self.current.take() else {
            return Err(TranscodeError::HostProtocol(PROTOCOL_VIOLATION));
        };
        if let Some(code) = self.commit_failure {
            return Err(TranscodeError::HostProtocol(code));
        }
        if !tile.output {
            return Ok(());
        }

        let bps = self.layout.depth.bytes_per_sample();
        let width = size::to_usize(self.layout.width)?;
        let left = size::to_usize(tile.rect.left)?;
        let top = size::to_usize(tile.rect.top)?;
        let columns = size::to_usize(tile.rect.columns())?;
        let rows = size::to_usize(tile.rect.rows())?;
        for row in 0..rows {
            for column in 0..columns {
                let dst = ((top + row) * width + left + column) * bps;
                let src_pixel = row * tile.row_stride + column * tile.pixel_stride;
                for (slot, plane) in tile.planes.clone().enumerate() {
                    let src = src_pixel + slot * bps;
                    self.planes[plane][dst..dst + bps]
                        .copy_from_slice(&self.scratch[src..src + bps]);
                }
            }
        }

        self.commits += 1;
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_after.is_some_and(|limit| self.requests >= limit)
    }
}

fn host_plane_len(layout: &HostLayout) -> Result<usize> {
    let bytes = size::plane_bytes(layout.width, layout.height, layout.depth.bytes_per_sample())?;
    usize::try_from(bytes)
        .map_err(|_| TranscodeError::Overflow(format!("host plane of {bytes} bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::depth::BitDepth;
    use crate::image_pipeline::host::ColorMode;

    fn gray_layout(width: u32, height: u32) -> HostLayout {
        HostLayout {
            width,
            height,
            depth: BitDepth::Eight,
            mode: ColorMode::Gray,
            has_transparency: false,
            can_edit_transparency: false,
            suggested_tile: (0, 0),
        }
    }

    #[test]
    fn input_tile_is_a_copy_of_the_rectangle() {
        let plane: Vec<u8> = (0..12).collect();
        let mut host = MemoryHost::from_planes(gray_layout(4, 3), vec![plane])
            .unwrap()
            .with_row_padding(3);
        let rect = TileRect { top: 1, left: 1, bottom: 3, right: 3 };
        host.request_input(rect, 0..1).unwrap();

        let tile = host.input_tile();
        assert_eq!(tile.row_stride, 5);
        assert_eq!(&tile.data[0..2], &[5, 6]);
        assert_eq!(&tile.data[5..7], &[9, 10]);
    }

    #[test]
    fn output_requires_commit_before_next_request() {
        let mut host = MemoryHost::new(gray_layout(2, 2)).unwrap();
        let rect = TileRect { top: 0, left: 0, bottom: 2, right: 2 };
        host.request_output(rect, 0..1).unwrap();
        host.output_tile().data.fill(9);

        let err = host.request_output(rect, 0..1).unwrap_err();
        assert!(matches!(err, TranscodeError::HostProtocol(PROTOCOL_VIOLATION)));

        host.commit().unwrap();
        assert_eq!(host.plane(0), &[9, 9, 9, 9]);
        assert_eq!(host.commits(), 1);
    }

    #[test]
    fn input_tiles_must_be_advanced_too() {
        let mut host = MemoryHost::new(gray_layout(2, 2)).unwrap();
        let rect = TileRect { top: 0, left: 0, bottom: 1, right: 2 };
        host.request_input(rect, 0..1).unwrap();
        let err = host.request_input(rect, 0..1).unwrap_err();
        assert!(matches!(err, TranscodeError::HostProtocol(PROTOCOL_VIOLATION)));

        host.commit().unwrap();
        host.request_input(rect, 0..1).unwrap();
        assert_eq!(host.commits(), 0);
    }

    #[test]
    fn commit_failure_carries_host_code() {
        let mut host = MemoryHost::new(gray_layout(2, 2)).unwrap().with_commit_failure(-108);
        let rect = TileRect { top: 0, left: 0, bottom: 2, right: 2 };
        host.request_output(rect, 0..1).unwrap();
        let err = host.commit().unwrap_err();
        assert!(matches!(err, TranscodeError::HostProtocol(-108)));
    }

    #[test]
    fn wrong_plane_shape_is_rejected() {
        let err = MemoryHost::from_planes(gray_layout(2, 2), vec![vec![0; 3]]).unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedMode(_)));
    }
}
