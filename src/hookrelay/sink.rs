use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;

/// Destination for payloads taken off the bus.
///
/// Writes are synchronous; a consumer task blocks on its sink between payloads.
/// A slow sink stalls the tokio worker thread running that consumer.
pub trait Sink: Send + Sync {
    /// Writes `payload` followed by a newline
    fn write_payload(&self, payload: &[u8]) -> io::Result<()>;
}

/// Writes each payload as one line on standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for StdoutSink {
    fn write_payload(&self, payload: &[u8]) -> io::Result<()> {
        let stdout = io::stdout();
        // Hold the lock across both writes so lines from different topics never interleave
        let mut out = stdout.lock();
        out.write_all(payload)?;
        out.write_all(b"\n")?;
        out.flush()?;
        trace!("Wrote {} bytes to stdout", payload.len() + 1);
        Ok(())
    }
}

/// Collects payload lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl Sink for MemorySink {
    fn write_payload(&self, payload: &[u8]) -> io::Result<()> {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        buf.extend_from_slice(payload);
        buf.push(b'\n');
        Ok(())
    }
}
