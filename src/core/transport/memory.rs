//! In-process loopback channel
//!
//! [`MemoryChannel`] behaves like a serial port whose far end is a
//! [`MemoryProbe`]: the probe queues report bytes for the session to read and
//! inspects everything the session wrote. Used by `makcu monitor --simulate`,
//! the benchmarks and the test suite.

use super::Channel;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Line {
    inbound: Mutex<VecDeque<u8>>,
    outbound: Mutex<Vec<u8>>,
    baud_history: Mutex<Vec<u32>>,
    write_chunk: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// Loopback channel handed to the session
pub struct MemoryChannel {
    line: Arc<Line>,
}

/// Far end of a [`MemoryChannel`]
#[derive(Clone)]
pub struct MemoryProbe {
    line: Arc<Line>,
}

impl MemoryChannel {
    /// Create a channel "opened" at `baud_rate` and its probe
    pub fn new(baud_rate: u32) -> (Self, MemoryProbe) {
        let line = Arc::new(Line::default());
        line.baud_history.lock().push(baud_rate);
        (
            Self { line: line.clone() },
            MemoryProbe { line },
        )
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.line.fail_reads.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut inbound = self.line.inbound.lock();
        if inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let n = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.line.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let n = match self.line.write_chunk.load(Ordering::Acquire) {
            0 => buf.len(),
            chunk => buf.len().min(chunk),
        };
        self.line.outbound.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.line.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn bytes_to_read(&self) -> io::Result<u32> {
        if self.line.fail_reads.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(u32::try_from(self.line.inbound.lock().len()).unwrap_or(u32::MAX))
    }

    fn baud_rate(&self) -> io::Result<u32> {
        Ok(self.line.baud_history.lock().last().copied().unwrap_or_default())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        self.line.baud_history.lock().push(baud_rate);
        Ok(())
    }

    fn try_clone_channel(&self) -> io::Result<Box<dyn Channel>> {
        Ok(Box::new(Self {
            line: self.line.clone(),
        }))
    }

    fn description(&self) -> String {
        format!("memory @ {} baud", self.baud_rate().unwrap_or_default())
    }
}

impl MemoryProbe {
    /// Queue bytes for the session to read
    pub fn push(&self, bytes: &[u8]) {
        self.line.inbound.lock().extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet consumed
    pub fn pending(&self) -> usize {
        self.line.inbound.lock().len()
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.line.outbound.lock().clone()
    }

    /// Drain everything written so far
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut *self.line.outbound.lock())
    }

    /// Every baud rate the line has been set to, opening rate first
    pub fn baud_history(&self) -> Vec<u32> {
        self.line.baud_history.lock().clone()
    }

    /// Accept at most `chunk` bytes per `write` call (0 = unlimited)
    pub fn set_write_chunk(&self, chunk: usize) {
        self.line.write_chunk.store(chunk, Ordering::Release);
    }

    /// Make every subsequent read fail
    pub fn fail_reads(&self, fail: bool) {
        self.line.fail_reads.store(fail, Ordering::Release);
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.line.fail_writes.store(fail, Ordering::Release);
    }
}
