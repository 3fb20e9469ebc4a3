use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::image_pipeline::{
    common::error::{HostStatus, Result, TranscodeError},
    host::HostTileBuffer,
    stream::{
        ExchangeConfig, PlanarStreamReader, PlanarStreamWriter, ReadSummary, StreamHeader,
        StreamSink, StreamSource, TileStreamReader, TileStreamWriter,
    },
};

pub struct ExchangePipeline<R: TileStreamReader, W: TileStreamWriter> {
    reader: R,
    writer: W,
    config: ExchangeConfig,
}

impl ExchangePipeline<PlanarStreamReader, PlanarStreamWriter> {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            reader: PlanarStreamReader,
            writer: PlanarStreamWriter,
            config,
        }
    }
}

impl<R: TileStreamReader, W: TileStreamWriter> ExchangePipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: ExchangeConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Writes the host layer to `output` as a planar stream.
    #[instrument(skip_all)]
    pub fn export(
        &self,
        host: &mut dyn HostTileBuffer,
        output: &mut dyn StreamSink,
    ) -> Result<StreamHeader> {
        info!("Starting stream export");
        let header = self.writer.write_stream(host, output, &self.config)?;
        info!(
            width = header.width,
            height = header.height,
            channels = header.channels,
            "Export complete"
        );
        Ok(header)
    }

    /// Reads a planar stream from `source` into the host layer.
    #[instrument(skip_all)]
    pub fn import(
        &self,
        source: &mut dyn StreamSource,
        host: &mut dyn HostTileBuffer,
    ) -> Result<ReadSummary> {
        info!("Starting stream import");
        let summary = self.reader.read_stream(source, host, &self.config)?;
        info!(
            tiles = summary.tiles_deposited,
            premultiplied = summary.premultiplied,
            forced_opaque = summary.forced_opaque,
            "Import complete"
        );
        Ok(summary)
    }

    #[instrument(skip(self, host, output_path))]
    pub fn export_file<P: AsRef<Path>>(
        &self,
        host: &mut dyn HostTileBuffer,
        output_path: P,
    ) -> Result<StreamHeader> {
        let output_path = output_path.as_ref();
        info!(output = %output_path.display(), "Exporting to file");

        let file = {
            let _span = tracing::info_span!("create_output_file").entered();
            File::create(output_path)?
        };
        let mut output = BufWriter::new(file);
        let result = self
            .export(host, &mut output)
            .and_then(|header| output.flush().map(|_| header).map_err(Into::into));
        if result.is_err() {
            drop(output);
            if let Err(err) = std::fs::remove_file(output_path) {
                warn!(%err, output = %output_path.display(), "failed to remove partial stream");
            }
        }
        result
    }

    #[instrument(skip(self, input_path, host))]
    pub fn import_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        host: &mut dyn HostTileBuffer,
    ) -> Result<ReadSummary> {
        let input_path = input_path.as_ref();
        info!(input = %input_path.display(), "Importing from file");

        let file = {
            let _span = tracing::info_span!("open_input_file").entered();
            File::open(input_path)?
        };
        let mut source = BufReader::new(file);
        self.import(&mut source, host)
    }

    /// Collapses an operation result into the single status the host sees.
    /// Cancellation is logged as a clean abort, anything else as a failure.
    pub fn status_of<T>(&self, result: &Result<T>) -> HostStatus {
        let status = HostStatus::from_result(result);
        match result {
            Err(TranscodeError::UserCancelled) => info!("Operation cancelled"),
            Err(err) => warn!(%err, ?status, "Operation failed"),
            Ok(_) => {}
        }
        status
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ExchangeConfig) {
        self.config = config;
    }
}
