//! Per-device reader task
//!
//! A [`ScanReader`] owns one [`FrameAssembler`] inside a spawned task. Chunks,
//! the flush deadline and shutdown are all handled by that single task, so a
//! timeout flush and a new chunk can never touch the buffer at the same time.

use crate::config::ReaderConfig;
use crate::framer::{FrameAssembler, FramerStats};
use crate::pipeline::ValidationPipeline;
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{info, instrument};

enum Command {
    Chunk(Bytes),
    Shutdown,
}

/// Handle to a running reader task for one device
pub struct ScanReader {
    source: String,
    tx: mpsc::Sender<Command>,
    handle: JoinHandle<FramerStats>,
}

impl ScanReader {
    /// Start a reader task feeding `pipeline`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        source: impl Into<String>,
        config: &ReaderConfig,
        pipeline: Arc<ValidationPipeline>,
    ) -> Self {
        let source = source.into();
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let assembler = FrameAssembler::from_config(config);
        let handle = tokio::spawn(run(source.clone(), assembler, rx, pipeline));

        Self { source, tx, handle }
    }

    /// Device name used in log context
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Queue a raw chunk; waits when the reader is behind
    pub async fn ingest(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(Command::Chunk(chunk.into()))
            .await
            .map_err(|_| Error::ReaderClosed)
    }

    /// Flush the buffered tail, stop the task and return its framing counters
    pub async fn shutdown(self) -> Result<FramerStats> {
        // The task also stops when the channel closes, so a failed send is fine
        let _ = self.tx.send(Command::Shutdown).await;
        self.handle
            .await
            .map_err(|e| Error::Internal(format!("Reader task failed: {}", e)))
    }
}

#[instrument(skip_all, fields(source = %source))]
async fn run(
    source: String,
    mut assembler: FrameAssembler,
    mut rx: mpsc::Receiver<Command>,
    pipeline: Arc<ValidationPipeline>,
) -> FramerStats {
    info!("Scan reader started");

    loop {
        let deadline = assembler.deadline();

        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(Command::Chunk(chunk)) => {
                    for record in assembler.ingest(&chunk, Instant::now()) {
                        pipeline.validate(record);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },

            _ = wait_for(deadline) => {
                if let Some(record) = assembler.poll_flush(Instant::now()) {
                    pipeline.validate(record);
                }
            }
        }
    }

    if let Some(record) = assembler.finish() {
        pipeline.validate(record);
    }

    let stats = assembler.stats().clone();
    info!(
        records = stats.records_total(),
        bytes = stats.bytes_received,
        discarded = stats.bytes_discarded,
        "Scan reader stopped"
    );
    stats
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
