use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tile_exchange_rs::image_pipeline::{
    BitDepth, ColorMode, ExchangeConfig, ExchangePipeline, HostLayout, HostStatus, MemoryHost,
    StreamHeader,
};
use tile_exchange_rs::logger;

use tracing::{error, info};

const USAGE: &str = "usage: tile-exchange <inspect|demo> <file>";

fn main() -> anyhow::Result<()> {
    logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(command), Some(path)) = (args.next(), args.next().map(PathBuf::from)) else {
        bail!(USAGE);
    };

    match command.as_str() {
        "inspect" => inspect(&path),
        "demo" => demo(&path),
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let config = ExchangeConfig::default();
    let header = StreamHeader::inspect(path, config.signature)
        .with_context(|| format!("failed to read header of {}", path.display()))?;

    info!(
        width = header.width,
        height = header.height,
        channels = header.channels,
        bits = header.depth.bits(),
        tile_width = header.tile_width,
        tile_height = header.tile_height,
        "Stream header"
    );
    println!("{header:#?}");
    Ok(())
}

/// Exports a synthetic RGBA layer to `path`, then imports it into a layer
/// whose transparency is locked so the premultiply path runs.
fn demo(path: &Path) -> anyhow::Result<()> {
    let width = 640;
    let height = 480;
    let layout = HostLayout {
        width,
        height,
        depth: BitDepth::Eight,
        mode: ColorMode::Rgb,
        has_transparency: true,
        can_edit_transparency: true,
        suggested_tile: (256, 256),
    };

    let pixels = (width * height) as usize;
    let planes: Vec<Vec<u8>> = (0..layout.plane_count())
        .map(|plane| {
            (0..pixels)
                .map(|i| {
                    let (x, y) = (i % width as usize, i / width as usize);
                    match plane {
                        0 => (x * 255 / width as usize) as u8,
                        1 => (y * 255 / height as usize) as u8,
                        2 => ((x + y) % 256) as u8,
                        _ => if (x / 32 + y / 32) % 2 == 0 { 255 } else { 128 },
                    }
                })
                .collect()
        })
        .collect();
    let mut source = MemoryHost::from_planes(layout.clone(), planes)?;

    let pipeline = ExchangePipeline::new(ExchangeConfig::default());
    info!("Tile size: {:?}", pipeline.config().tile_size);

    let result = pipeline.export_file(&mut source, path);
    if let Err(e) = &result {
        error!("Export failed: {}", e);
    }
    let header = result?;
    info!(len = header.stream_len(), "Export successful!");

    let mut target = MemoryHost::new(HostLayout {
        has_transparency: false,
        can_edit_transparency: false,
        ..layout
    })?;
    let result = pipeline.import_file(path, &mut target);
    let status = pipeline.status_of(&result);
    if status != HostStatus::NoError {
        bail!("import finished with {status:?}");
    }
    let summary = result?;
    info!(
        tiles = summary.tiles_deposited,
        premultiplied = summary.premultiplied,
        "Import successful!"
    );
    Ok(())
}
