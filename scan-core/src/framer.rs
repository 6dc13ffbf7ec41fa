//! Byte stream to candidate record assembly
//!
//! Scanners deliver a record in arbitrarily sized bursts, usually ending with a
//! carriage return. The assembler filters channel noise, splits on the
//! terminator and keeps the unterminated tail until either more bytes arrive or
//! its flush deadline passes.
//!
//! # State machine
//!
//! ```text
//!            ingest (tail left)                 deadline reached
//!   Idle ─────────────────────> FlushScheduled ─────────────────> Idle (record emitted)
//!    ^                              │   ^
//!    │        ingest (no tail)      │   │ ingest (tail left, deadline re-armed)
//!    └──────────────────────────────┘───┘
//! ```
//!
//! `Accumulating` is used instead of `FlushScheduled` when timeout flushing is
//! disabled: the tail then waits for a terminator or [`FrameAssembler::finish`].
//!
//! The assembler does no I/O and never reads the clock itself; callers pass the
//! current instant in, which keeps every transition deterministic.

use crate::config::ReaderConfig;
use crate::TERMINATOR;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How a candidate record was delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// Terminator byte seen
    Terminator,
    /// Flush deadline passed with no new bytes
    Timeout,
    /// Tail drained on shutdown
    Shutdown,
}

/// One scan, as recovered from the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    text: String,
    end: FrameEnd,
}

impl CandidateRecord {
    pub fn new(text: impl Into<String>, end: FrameEnd) -> Self {
        Self {
            text: text.into(),
            end,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn end(&self) -> FrameEnd {
        self.end
    }
}

/// Framing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Buffer empty, nothing pending
    Idle,
    /// Unterminated bytes buffered, no deadline armed
    Accumulating,
    /// Unterminated bytes buffered, flushed at `deadline` unless more arrive
    FlushScheduled { deadline: Instant },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub chunks_received: u64,
    pub bytes_received: u64,
    pub bytes_discarded: u64,
    pub records_terminated: u64,
    pub records_timed_out: u64,
    pub records_on_shutdown: u64,
    pub blank_records_suppressed: u64,
    pub overflow_truncations: u64,
    pub bytes_dropped_overflow: u64,
}

impl FramerStats {
    pub fn records_total(&self) -> u64 {
        self.records_terminated + self.records_timed_out + self.records_on_shutdown
    }
}

/// Reassembles candidate records from raw scanner bytes
///
/// Owned by exactly one reader; the buffer and deadline are never shared.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_buffer: usize,
    flush_timeout: Option<Duration>,
    state: AssemblerState,
    stats: FramerStats,
}

impl FrameAssembler {
    /// Create an assembler with a buffer ceiling and optional flush delay
    pub fn new(max_buffer: usize, flush_timeout: Option<Duration>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_buffer,
            flush_timeout,
            state: AssemblerState::Idle,
            stats: FramerStats::default(),
        }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new(config.max_buffer_bytes, config.flush_timeout())
    }

    /// Feed one chunk and collect every record it completes
    ///
    /// Chunks made only of noise bytes leave the state, including any armed
    /// deadline, untouched.
    pub fn ingest(&mut self, chunk: &[u8], now: Instant) -> Vec<CandidateRecord> {
        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.len() as u64;

        let before = self.buffer.len();
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| is_frame_byte(b)));
        let kept = self.buffer.len() - before;
        self.stats.bytes_discarded += (chunk.len() - kept) as u64;

        if kept == 0 {
            return Vec::new();
        }

        // New bytes cancel any pending flush
        self.state = AssemblerState::Accumulating;

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == TERMINATOR) {
            let line = self.buffer.split_to(pos + 1);
            if let Some(record) = self.make_record(&line[..pos], FrameEnd::Terminator) {
                records.push(record);
            }
        }

        if self.buffer.len() > self.max_buffer {
            let excess = self.buffer.len() - self.max_buffer;
            self.buffer.advance(excess);
            self.stats.overflow_truncations += 1;
            self.stats.bytes_dropped_overflow += excess as u64;
            warn!(
                dropped = excess,
                retained = self.buffer.len(),
                "Assembly buffer overflow, oldest bytes dropped"
            );
        }

        self.state = match (self.buffer.is_empty(), self.flush_timeout) {
            (true, _) => AssemblerState::Idle,
            (false, Some(timeout)) => AssemblerState::FlushScheduled {
                deadline: now + timeout,
            },
            (false, None) => AssemblerState::Accumulating,
        };

        records
    }

    /// Emit the buffered tail if its flush deadline has passed
    pub fn poll_flush(&mut self, now: Instant) -> Option<CandidateRecord> {
        match self.state {
            AssemblerState::FlushScheduled { deadline } if now >= deadline => {
                self.state = AssemblerState::Idle;
                let tail = self.buffer.split();
                self.make_record(&tail, FrameEnd::Timeout)
            }
            _ => None,
        }
    }

    /// Drain the buffered tail and cancel any deadline
    pub fn finish(&mut self) -> Option<CandidateRecord> {
        self.state = AssemblerState::Idle;
        if self.buffer.is_empty() {
            return None;
        }
        let tail = self.buffer.split();
        self.make_record(&tail, FrameEnd::Shutdown)
    }

    /// Armed flush deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AssemblerState::FlushScheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &FramerStats {
        &self.stats
    }

    fn make_record(&mut self, raw: &[u8], end: FrameEnd) -> Option<CandidateRecord> {
        let cleaned: Vec<u8> = raw.iter().copied().filter(|&b| b != 0).collect();
        let text = String::from_utf8_lossy(&cleaned);
        let text = text.trim();

        if text.is_empty() {
            self.stats.blank_records_suppressed += 1;
            return None;
        }

        match end {
            FrameEnd::Terminator => self.stats.records_terminated += 1,
            FrameEnd::Timeout => self.stats.records_timed_out += 1,
            FrameEnd::Shutdown => self.stats.records_on_shutdown += 1,
        }
        debug!(record = text, end = ?end, "Framed candidate record");

        Some(CandidateRecord::new(text, end))
    }
}

/// Printable ASCII plus the terminator
fn is_frame_byte(b: u8) -> bool {
    b == TERMINATOR || (0x20..=0x7e).contains(&b)
}
