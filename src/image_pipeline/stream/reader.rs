use std::io::SeekFrom;
use std::ops::Range;

use tracing::{debug, info, instrument};

use crate::image_pipeline::alpha::{self, AlphaCompositor, snapshot_mask};
use crate::image_pipeline::common::error::{Result, TranscodeError};
use crate::image_pipeline::common::size;
use crate::image_pipeline::depth::{BitDepth, host_16bit_in_place};
use crate::image_pipeline::host::{
    HostLayout, HostTileBuffer, MaskTile, PROTOCOL_VIOLATION, TileView, TileViewMut,
};
use crate::image_pipeline::stream::header::{HEADER_LENGTH, StreamHeader};
use crate::image_pipeline::stream::io::StreamSource;
use crate::image_pipeline::stream::types::{ExchangeConfig, ReadSummary};
use crate::image_pipeline::tiling::{TileIterator, TileRect};

pub trait TileStreamReader {
    fn read_stream(
        &self,
        source: &mut dyn StreamSource,
        host: &mut dyn HostTileBuffer,
        config: &ExchangeConfig,
    ) -> Result<ReadSummary>;
}

/// Reads a planar stream into the host layer.
pub struct PlanarStreamReader;

/// How one stream channel reaches the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    PassThrough,
    ExpandGrayToRgb,
    AlphaPremultiply,
    AlphaCopy,
}

#[derive(Debug, Clone)]
struct ChannelStep {
    channel: usize,
    targets: Range<usize>,
    dispatch: Dispatch,
}

/// Channel routing decided once from the header and the host layout.
#[derive(Debug, Clone)]
struct ReadPlan {
    steps: Vec<ChannelStep>,
    alpha_channel: Option<usize>,
    expanded_gray: bool,
    premultiply: bool,
    force_opaque: bool,
}

impl ReadPlan {
    fn new(header: &StreamHeader, layout: &HostLayout) -> Result<Self> {
        let stream_colors = header.color_channels();
        let host_colors = layout.color_planes();
        let expanded_gray = match (stream_colors, host_colors) {
            (s, h) if s == h => false,
            (1, 3) => true,
            _ => {
                return Err(TranscodeError::UnsupportedMode(format!(
                    "{} stream channels into {host_colors} host color planes",
                    header.channels
                )));
            }
        };

        let alpha_channel = header.has_alpha().then_some(stream_colors);
        let host_alpha = layout.editable_alpha_plane();
        let premultiply = alpha_channel.is_some() && host_alpha.is_none();
        let force_opaque = alpha_channel.is_none() && host_alpha.is_some();

        let mut steps = Vec::with_capacity(header.channels as usize);
        for channel in 0..stream_colors {
            let (targets, mut dispatch) = if expanded_gray {
                (0..3, Dispatch::ExpandGrayToRgb)
            } else {
                (channel..channel + 1, Dispatch::PassThrough)
            };
            if premultiply {
                dispatch = Dispatch::AlphaPremultiply;
            }
            steps.push(ChannelStep {
                channel,
                targets,
                dispatch,
            });
        }
        if let (Some(channel), Some(plane)) = (alpha_channel, host_alpha) {
            steps.push(ChannelStep {
                channel,
                targets: plane..plane + 1,
                dispatch: Dispatch::AlphaCopy,
            });
        }

        Ok(Self {
            steps,
            alpha_channel,
            expanded_gray,
            premultiply,
            force_opaque,
        })
    }
}

/// Per-read scratch buffers, each sized for one tile and reused.
#[derive(Default)]
struct Scratch {
    tile: Vec<u8>,
    alpha: Vec<u8>,
    mask: Vec<u8>,
}

impl TileStreamReader for PlanarStreamReader {
    #[instrument(skip_all)]
    fn read_stream(
        &self,
        source: &mut dyn StreamSource,
        host: &mut dyn HostTileBuffer,
        config: &ExchangeConfig,
    ) -> Result<ReadSummary> {
        let base = source.stream_position()?;
        let header = StreamHeader::read_from(source, config.signature)?;
        if !header.planar {
            return Err(TranscodeError::UnsupportedMode(
                "interleaved streams are not supported".to_string(),
            ));
        }

        let layout = host.layout().clone();
        config.check_dimensions(layout.width, layout.height)?;
        if (header.width, header.height) != (layout.width, layout.height) {
            return Err(TranscodeError::InvalidDimensions(header.width, header.height));
        }
        if header.depth != layout.depth {
            return Err(TranscodeError::UnsupportedDepth(format!(
                "stream has {} bits per channel, host expects {}",
                header.depth.bits(),
                layout.depth.bits()
            )));
        }
        if config.verify_stream_length {
            verify_length(source, base, &header)?;
        }

        let plan = ReadPlan::new(&header, &layout)?;
        debug!(?plan, "read plan");

        let tiles = TileIterator::new(
            header.width,
            header.height,
            header.tile_width,
            header.tile_height,
        );
        let mut scratch = Scratch::default();
        let mut deposited = 0_u64;
        for step in &plan.steps {
            let _span = tracing::debug_span!(
                "read_channel",
                channel = step.channel,
                dispatch = ?step.dispatch
            )
            .entered();
            source.seek(SeekFrom::Start(absolute(base, header.channel_offset(step.channel)?)?))?;
            for rect in tiles.clone() {
                if host.is_cancelled() {
                    return Err(TranscodeError::UserCancelled);
                }
                read_tile(source, &header, rect, &mut scratch.tile)?;

                host.request_output(rect, step.targets.clone())?;
                if step.dispatch == Dispatch::AlphaPremultiply {
                    if let Some(alpha_channel) = plan.alpha_channel {
                        let resume = source.stream_position()?;
                        let offset = absolute(base, header.tile_offset(alpha_channel, rect)?)?;
                        source.seek(SeekFrom::Start(offset))?;
                        read_tile(source, &header, rect, &mut scratch.alpha)?;
                        source.seek(SeekFrom::Start(resume))?;
                        premultiply_scratch(host, &header, rect, &mut scratch)?;
                    }
                }
                deposit(&scratch.tile, &mut host.output_tile(), &header, rect, step.targets.len())?;
                host.commit()?;
                deposited += 1;
            }
        }

        if plan.force_opaque {
            AlphaCompositor::new(header.tile_width, header.tile_height).force_opaque_host(host)?;
        }

        info!(
            width = header.width,
            height = header.height,
            channels = header.channels,
            bits = header.depth.bits(),
            tiles = deposited,
            "stream read"
        );
        Ok(ReadSummary {
            header,
            tiles_deposited: deposited,
            expanded_gray: plan.expanded_gray,
            premultiplied: plan.premultiply,
            forced_opaque: plan.force_opaque,
        })
    }
}

fn absolute(base: u64, offset: u64) -> Result<u64> {
    size::checked_add_u64(base, offset, "stream position")
}

fn verify_length(source: &mut dyn StreamSource, base: u64, header: &StreamHeader) -> Result<()> {
    let expected = header
        .stream_len()
        .ok_or_else(|| TranscodeError::Overflow("stream length".to_string()))?;
    let end = source.seek(SeekFrom::End(0))?;
    let available = end.saturating_sub(base);
    if available < expected {
        return Err(TranscodeError::Format(format!(
            "stream holds {available} bytes, header describes {expected}"
        )));
    }
    source.seek(SeekFrom::Start(absolute(base, HEADER_LENGTH as u64)?))?;
    Ok(())
}

/// Reads one planar tile into `buffer`, converting 16-bit samples to host
/// range. 8-bit and 32-bit samples pass through untouched.
fn read_tile(
    source: &mut dyn StreamSource,
    header: &StreamHeader,
    rect: TileRect,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    let len = size::tile_bytes(rect.columns(), rect.rows(), header.bytes_per_sample())?;
    buffer.resize(len, 0);
    source.read_exact(buffer).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            TranscodeError::Format("stream ended inside a tile".to_string())
        }
        _ => TranscodeError::IoError(err),
    })?;
    if header.depth == BitDepth::Sixteen {
        host_16bit_in_place(buffer);
    }
    Ok(())
}

fn premultiply_scratch(
    host: &dyn HostTileBuffer,
    header: &StreamHeader,
    rect: TileRect,
    scratch: &mut Scratch,
) -> Result<()> {
    let bps = header.bytes_per_sample();
    let row_len = size::row_bytes(rect.columns(), bps)?;
    let mask_stride = snapshot_mask(host, &mut scratch.mask);
    let mask = mask_stride.map(|row_stride| MaskTile {
        data: &scratch.mask,
        row_stride,
    });
    alpha::premultiply(
        header.depth,
        &mut TileViewMut {
            data: &mut scratch.tile,
            row_stride: row_len,
            pixel_stride: bps,
        },
        &TileView {
            data: &scratch.alpha,
            row_stride: row_len,
            pixel_stride: bps,
        },
        size::to_usize(rect.columns())?,
        size::to_usize(rect.rows())?,
        mask.as_ref(),
    );
    Ok(())
}

/// Copies a packed single-plane tile into every target plane of the host tile.
fn deposit(
    source: &[u8],
    tile: &mut TileViewMut<'_>,
    header: &StreamHeader,
    rect: TileRect,
    planes: usize,
) -> Result<()> {
    let bps = header.bytes_per_sample();
    let columns = size::to_usize(rect.columns())?;
    let rows = size::to_usize(rect.rows())?;
    let row_len = size::row_bytes(rect.columns(), bps)?;
    if !tile.covers(columns, rows, bps * planes) {
        return Err(TranscodeError::HostProtocol(PROTOCOL_VIOLATION));
    }

    for (row, src_row) in source.chunks_exact(row_len).take(rows).enumerate() {
        let start = row * tile.row_stride;
        if planes == 1 && tile.pixel_stride == bps {
            tile.data[start..start + row_len].copy_from_slice(src_row);
            continue;
        }
        for (column, sample) in src_row.chunks_exact(bps).enumerate() {
            let pixel = start + column * tile.pixel_stride;
            for slot in 0..planes {
                let dst = pixel + slot * bps;
                tile.data[dst..dst + bps].copy_from_slice(sample);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::image_pipeline::host::{ColorMode, MemoryHost};
    use crate::image_pipeline::stream::header::DEFAULT_SIGNATURE;

    fn host_layout(mode: ColorMode, has_transparency: bool, can_edit: bool) -> HostLayout {
        HostLayout {
            width: 3,
            height: 2,
            depth: BitDepth::Eight,
            mode,
            has_transparency,
            can_edit_transparency: can_edit,
            suggested_tile: (2, 2),
        }
    }

    /// Builds a stream whose channel blocks follow the 2x2 tile walk of a
    /// 3x2 image, from row-major planes.
    fn stream_of(planes: &[[u8; 6]]) -> Vec<u8> {
        let header =
            StreamHeader::new(DEFAULT_SIGNATURE, 3, 2, planes.len() as u32, BitDepth::Eight, 2, 2)
                .unwrap();
        let mut bytes = header.to_bytes().to_vec();
        for plane in planes {
            bytes.extend_from_slice(&[plane[0], plane[1], plane[3], plane[4], plane[2], plane[5]]);
        }
        bytes
    }

    #[test]
    fn gray_is_broadcast_into_rgb() {
        let gray = [10, 20, 30, 40, 50, 60];
        let mut source = Cursor::new(stream_of(&[gray]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Rgb, false, false)).unwrap();

        let summary = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap();

        assert!(summary.expanded_gray);
        for plane in 0..3 {
            assert_eq!(host.plane(plane), &gray);
        }
    }

    #[test]
    fn gray_alpha_lands_in_plane_three() {
        let gray = [1, 2, 3, 4, 5, 6];
        let alpha = [255, 0, 255, 0, 255, 0];
        let mut source = Cursor::new(stream_of(&[gray, alpha]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Rgb, true, true)).unwrap();

        let summary = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap();

        assert!(!summary.premultiplied);
        assert_eq!(host.plane(2), &gray);
        assert_eq!(host.plane(3), &alpha);
    }

    #[test]
    fn locked_transparency_premultiplies_before_deposit() {
        let gray = [200, 200, 200, 200, 200, 200];
        let alpha = [255, 0, 128, 255, 0, 128];
        let mut source = Cursor::new(stream_of(&[gray, alpha]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Gray, true, false)).unwrap();

        let summary = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap();

        assert!(summary.premultiplied);
        assert_eq!(host.plane(0), &[200, 0, 100, 200, 0, 100]);
        assert_eq!(host.plane(1), &[0; 6]);
    }

    #[test]
    fn sixteen_bit_premultiply_skips_masked_pixels() {
        use crate::image_pipeline::depth::HOST_16BIT_MAX;
        use crate::image_pipeline::stream::{PlanarStreamWriter, TileStreamWriter};

        let to_bytes = |values: [u16; 6]| -> Vec<u8> {
            values.iter().flat_map(|v| v.to_ne_bytes()).collect()
        };
        let layout = HostLayout {
            depth: BitDepth::Sixteen,
            ..host_layout(ColorMode::Gray, true, true)
        };
        let alpha = [HOST_16BIT_MAX, 16384, 0, 8192, HOST_16BIT_MAX, 16384];
        let mut source =
            MemoryHost::from_planes(layout.clone(), vec![to_bytes([20000; 6]), to_bytes(alpha)])
                .unwrap();
        let mut stream = Cursor::new(Vec::new());
        PlanarStreamWriter
            .write_stream(&mut source, &mut stream, &ExchangeConfig::default())
            .unwrap();
        stream.set_position(0);

        let locked = HostLayout {
            can_edit_transparency: false,
            ..layout
        };
        let mut host = MemoryHost::new(locked).unwrap().with_mask(vec![1, 0, 1, 1, 0, 1]);
        let summary = PlanarStreamReader
            .read_stream(&mut stream, &mut host, &ExchangeConfig::default())
            .unwrap();

        assert!(summary.premultiplied);
        assert_eq!(
            host.samples::<u16>(0),
            vec![20000, 20000, 0, 5000, 20000, 10000]
        );
        assert!(host.samples::<u16>(1).iter().all(|v| *v == 0));
    }

    #[test]
    fn missing_alpha_forces_host_opaque() {
        let mut source = Cursor::new(stream_of(&[[7; 6]]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Gray, true, true)).unwrap();

        let summary = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap();

        assert!(summary.forced_opaque);
        assert_eq!(host.plane(1), &[255; 6]);
    }

    #[test]
    fn rgb_into_gray_is_unsupported() {
        let mut source = Cursor::new(stream_of(&[[0; 6], [0; 6], [0; 6]]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Gray, false, false)).unwrap();
        let err = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedMode(_)));
    }

    #[test]
    fn depth_mismatch_is_fatal() {
        let mut source = Cursor::new(stream_of(&[[0; 6]]));
        let layout = HostLayout {
            depth: BitDepth::Sixteen,
            ..host_layout(ColorMode::Gray, false, false)
        };
        let mut host = MemoryHost::new(layout).unwrap();
        let err = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedDepth(_)));
        assert_eq!(host.commits(), 0);
    }

    #[test]
    fn truncated_stream_is_a_format_error() {
        let mut bytes = stream_of(&[[0; 6]]);
        bytes.truncate(bytes.len() - 1);
        let mut host = MemoryHost::new(host_layout(ColorMode::Gray, false, false)).unwrap();

        let err = PlanarStreamReader
            .read_stream(&mut Cursor::new(bytes.clone()), &mut host, &ExchangeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Format(_)));

        let unchecked = ExchangeConfig::builder().verify_stream_length(false).build();
        let err = PlanarStreamReader
            .read_stream(&mut Cursor::new(bytes), &mut host, &unchecked)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Format(_)));
    }

    #[test]
    fn commit_failure_propagates_unchanged() {
        let mut source = Cursor::new(stream_of(&[[0; 6]]));
        let mut host = MemoryHost::new(host_layout(ColorMode::Gray, false, false))
            .unwrap()
            .with_commit_failure(-34);
        let err = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::HostProtocol(-34)));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut source = Cursor::new(stream_of(&[[0; 6]]));
        let layout = HostLayout {
            width: 4,
            ..host_layout(ColorMode::Gray, false, false)
        };
        let mut host = MemoryHost::new(layout).unwrap();
        let err = PlanarStreamReader
            .read_stream(&mut source, &mut host, &ExchangeConfig::default())
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidDimensions(3, 2)));
    }
}
