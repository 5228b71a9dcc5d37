//! Stdio transport: reads commands from stdin, writes results to stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use streetcache::{FetchReport, Pipeline};

use crate::error::{CliError, CliResult};

use super::framing::{self, Command, PositionResult};

/// Drives a [`Pipeline`] from newline-delimited JSON commands.
pub struct StdioTransport {
    pipeline: Pipeline,
    jpeg_quality: u8,
}

impl StdioTransport {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            jpeg_quality: streetcache::codec::DEFAULT_JPEG_QUALITY,
        }
    }

    /// JPEG quality of images written to the output stream.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Run the transport loop over stdin and stdout.
    pub async fn run(self) -> CliResult<FetchReport> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run_with(stdin, stdout).await
    }

    /// Run the transport loop over any line source and sink.
    ///
    /// Returns once the input hits EOF and every position query has been
    /// answered.
    pub async fn run_with<R, W>(mut self, reader: R, mut writer: W) -> CliResult<FetchReport>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut segments = reader.split(b'\n');
        let mut input_open = true;
        let mut seq = 0u64;

        tracing::info!("Stdio transport started");

        loop {
            tokio::select! {
                segment = segments.next_segment(), if input_open => {
                    match segment? {
                        Some(bytes) => {
                            if bytes.iter().all(u8::is_ascii_whitespace) {
                                continue;
                            }
                            if let Err(e) = self.dispatch(&bytes) {
                                tracing::warn!("Rejected input line: {e}");
                                writer.write_all(framing::frame_error(&e)?.as_bytes()).await?;
                                writer.flush().await?;
                            }
                        }
                        None => {
                            tracing::info!("EOF on input, closing pipeline lanes");
                            input_open = false;
                            self.pipeline.close_requests();
                            self.pipeline.close_positions();
                        }
                    }
                }
                image = self.pipeline.next_image() => {
                    let Some(image) = image else {
                        break;
                    };
                    let result = match image {
                        Some(image) => PositionResult::from_panorama(seq, &image, self.jpeg_quality)?,
                        None => PositionResult::missing(seq),
                    };
                    seq += 1;
                    writer.write_all(framing::frame_message(&result)?.as_bytes()).await?;
                    writer.flush().await?;
                }
            }
        }

        let report = self.pipeline.shutdown().await?;
        tracing::info!(
            "Answered {seq} position queries; fetch report: {} cached, {} from store, {} downloaded, {} failed",
            report.skipped,
            report.from_store,
            report.from_network,
            report.failed
        );
        Ok(report)
    }

    fn dispatch(&self, bytes: &[u8]) -> CliResult<()> {
        let line = std::str::from_utf8(bytes)
            .map_err(|e| CliError::Parse(format!("Invalid UTF-8: {e}")))?;
        let command = framing::parse_command(line)?;
        match command {
            Command::Request { .. } => self.pipeline.submit(command.image_request())?,
            Command::Position { .. } => self.pipeline.locate(command.image_request())?,
        }
        Ok(())
    }
}
