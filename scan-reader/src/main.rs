// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Scan Reader - Barcode Scanner Stream Validator
//!
//! Reads the raw byte stream of a barcode scanner from a character device
//! (e.g. `/dev/hidraw0`), a capture file or stdin, and prints one JSON line
//! per validated scan on stdout.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   chunks    ┌──────────────┐  results   ┌──────────────┐
//! │    Device    │ ──────────> │  ScanReader  │ ─────────> │    stdout    │
//! │  / stdin     │             │  + Pipeline  │  (bus)     │ (JSON lines) │
//! └──────────────┘             └──────────────┘            └──────────────┘
//! ```
//!
//! # Features
//!
//! - Terminator and inactivity based record framing
//! - EAN/UPC and Code128 check value validation
//! - Graceful shutdown with tail flushing
//! - Final counters logged on exit

use anyhow::{Context, Result};
use clap::Parser;
use scan_core::{
    config::ReaderConfig, ResultBus, ScanReader, ValidationPipeline, ValidationResult,
};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Chunks queued between the input thread and the reader
const INPUT_QUEUE_DEPTH: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "scan-reader")]
#[command(about = "Scan Reader - Frames and validates barcode scanner output", long_about = None)]
struct Args {
    /// Device or capture file to read ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Bytes requested per read
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load configuration from SCAN_* environment variables
    #[arg(long, default_value = "false")]
    env_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn source_name(&self) -> String {
        if self.reads_stdin() {
            "stdin".to_string()
        } else {
            self.input.display().to_string()
        }
    }

    fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

fn load_config(args: &Args) -> Result<ReaderConfig> {
    let config = if args.env_mode {
        info!("Loading configuration from environment variables");
        ReaderConfig::from_env().context("Failed to load configuration from environment")?
    } else if let Some(path) = &args.config {
        info!("Loading configuration from file: {:?}", path);
        ReaderConfig::from_file(path).context("Failed to load configuration from file")?
    } else {
        info!("Using default configuration");
        ReaderConfig::default()
    };
    Ok(config)
}

fn open_input(args: &Args) -> Result<Box<dyn Read + Send>> {
    if args.reads_stdin() {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("Failed to open input {:?}", args.input))?;
    Ok(Box::new(file))
}

/// Read the input on its own OS thread
///
/// A device read can block indefinitely and cannot be cancelled, so it stays
/// off the runtime's blocking pool; the thread is left behind at exit.
fn spawn_input(
    mut input: impl Read + Send + 'static,
    chunk_size: usize,
) -> Result<mpsc::Receiver<std::io::Result<Vec<u8>>>> {
    let (tx, rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    std::thread::Builder::new()
        .name("scan-input".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; chunk_size];
            loop {
                match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn input thread")?;
    Ok(rx)
}

/// Copy chunks from the input into the reader until EOF
async fn pump(
    mut chunks: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    reader: &ScanReader,
) -> Result<()> {
    while let Some(chunk) = chunks.recv().await {
        let chunk = chunk.context("Read from input failed")?;
        reader.ingest(chunk).await?;
    }
    info!("End of input reached");
    Ok(())
}

/// Write each result as a JSON line until the bus closes or output fails
///
/// Returns the number of lines written and flushed.
async fn print_results(
    mut results: mpsc::UnboundedReceiver<ValidationResult>,
    mut out: impl AsyncWrite + Unpin,
) -> usize {
    let mut written = 0;
    while let Some(result) = results.recv().await {
        if !result.valid {
            warn!(record = %result.record, symbology = %result.symbology, "Invalid scan");
        }
        let line = match result.to_json() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize result: {}", e);
                continue;
            }
        };
        if let Err(e) = out.write_all(format!("{}\n", line).as_bytes()).await {
            error!("Failed to write result: {}", e);
            break;
        }
        if let Err(e) = out.flush().await {
            error!("Failed to flush results: {}", e);
            break;
        }
        written += 1;
    }
    written
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use futures::stream::StreamExt;
        use signal_hook::consts::signal::*;
        use signal_hook_tokio::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;

        if let Some(signal) = signals.next().await {
            info!("Received signal: {:?}", signal);
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing; stdout carries results, so logs go to stderr
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!("Scan Reader v{}", scan_core::VERSION);

    let config = load_config(&args)?;
    if args.chunk_size == 0 {
        anyhow::bail!("--chunk-size must be > 0");
    }

    info!("Input: {}", args.source_name());
    info!("Flush timeout: {:?}", config.flush_timeout());
    info!("Buffer ceiling: {} bytes", config.max_buffer_bytes);
    info!("8-digit codes read as: {:?}", config.eight_digit_symbology);

    // Results flow through a bus owned by this pipeline only
    let bus = Arc::new(ResultBus::new());
    let results = bus.subscribe();
    let pipeline = Arc::new(ValidationPipeline::from_config(&config, bus));
    let metrics = pipeline.metrics().clone();

    let printer = tokio::spawn(print_results(results, tokio::io::stdout()));

    let reader = ScanReader::spawn(args.source_name(), &config, pipeline);
    let chunks = spawn_input(open_input(&args)?, args.chunk_size)?;

    tokio::select! {
        outcome = pump(chunks, &reader) => {
            if let Err(e) = outcome {
                error!("Input stopped: {:#}", e);
            }
        }
        signal = wait_for_shutdown() => {
            signal?;
            info!("Shutdown signal received, flushing buffered scan...");
        }
    }

    let stats = reader.shutdown().await?;
    // The reader task held the last pipeline handle; the printer ends once drained
    let printed = printer.await.context("Result printer failed")?;
    debug!(lines = printed, "Result printer finished");

    info!(
        chunks = stats.chunks_received,
        bytes = stats.bytes_received,
        noise_bytes = stats.bytes_discarded,
        overflow_truncations = stats.overflow_truncations,
        "Framing summary"
    );
    info!(
        records = metrics.records_total(),
        valid = metrics.records_valid(),
        malformed = metrics.records_malformed(),
        unsupported = metrics.records_unsupported(),
        "Validation summary ({:.1}% valid)",
        metrics.valid_percent()
    );
    debug!("Final counters:\n{}", metrics.prometheus_format());

    info!("Scan reader shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::framer::FrameEnd;
    use scan_core::CandidateRecord;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};
    use std::time::{Duration, Instant};

    /// Output that accepts writes but fails every flush
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn published(records: &[&str]) -> mpsc::UnboundedReceiver<ValidationResult> {
        let bus = Arc::new(ResultBus::new());
        let results = bus.subscribe();
        let pipeline = ValidationPipeline::new(bus);
        for record in records {
            pipeline.validate(CandidateRecord::new(*record, FrameEnd::Terminator));
        }
        results
    }

    /// Input that blocks like an idle scanner until its sender is dropped
    struct IdleDevice(std::sync::mpsc::Receiver<u8>);

    impl Read for IdleDevice {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[tokio::test]
    async fn test_input_is_chunked_until_eof() {
        let mut chunks = spawn_input(Cursor::new(b"abc\r".to_vec()), 2).unwrap();
        assert_eq!(chunks.recv().await.unwrap().unwrap(), b"ab");
        assert_eq!(chunks.recv().await.unwrap().unwrap(), b"c\r");
        assert!(chunks.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_results_are_printed_as_json_lines() {
        let mut out = Vec::new();
        let printed = print_results(published(&["5901234123457", "abcy"]), &mut out).await;
        assert_eq!(printed, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"valid\":true"));
        assert!(lines[1].contains("\"valid\":false"));
    }

    #[tokio::test]
    async fn test_printer_stops_when_flush_fails() {
        let printed = print_results(published(&["abcz", "AB^"]), BrokenPipe).await;
        assert_eq!(printed, 0);
    }

    #[test]
    fn test_idle_input_does_not_block_runtime_shutdown() {
        let (_scanner, idle) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut chunks = spawn_input(IdleDevice(idle), 16).unwrap();
            let waited = tokio::time::timeout(Duration::from_millis(50), chunks.recv()).await;
            assert!(waited.is_err());
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
