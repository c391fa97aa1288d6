//! Logger setup.
//!
//! Line-oriented commands log to stderr. The dashboard owns the terminal, so
//! there log records go into an in-memory ring that the UI draws instead.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Log lines kept for the dashboard's diagnostics panel.
pub const CAPTURED_LINES: usize = 200;

fn builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

/// Log to stderr, honouring `RUST_LOG` (default `info`).
pub fn init_stderr() {
    let _ = builder().try_init();
}

/// Log into `buffer` instead of the terminal.
pub fn init_captured(buffer: LogBuffer) {
    let _ = builder()
        .write_style(env_logger::WriteStyle::Never)
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(buffer.writer())))
        .try_init();
}

/// Bounded ring of formatted log lines, shared with the UI.
#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        lines.push_back(line.into());
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// The newest `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn writer(&self) -> LogWriter {
        LogWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// `Write` adapter that splits the byte stream into lines.
pub struct LogWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            let text = text.trim_end_matches('\r');
            if !text.is_empty() {
                self.buffer.push(text);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
