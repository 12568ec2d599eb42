//! Boundary I/O: the typed print carrier, a buffered writer, and thin
//! file-system helpers.
//!
//! Everything here returns `std::io::Result` directly; the OS error code
//! is the error channel, nothing is wrapped further.

use core::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// A runtime-typed printable value, used by the variadic print helpers of
/// generated code.
#[derive(Clone, Copy, Debug)]
pub enum Value<'a> {
    I64(i64),
    U64(u64),
    F64(f64),
    Str(&'a str),
    Bool(bool),
    Char(char),
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
        }
    }
}

/// Write `values` space-separated with a trailing newline.
pub fn write_values(out: &mut impl Write, values: &[Value<'_>]) -> io::Result<()> {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        write!(out, "{value}")?;
    }
    out.write_all(b"\n")
}

/// [`write_values`] to stdout. Errors are swallowed: printing has no
/// error channel in generated code.
pub fn print_values(values: &[Value<'_>]) {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    let _ = write_values(&mut lock, values);
}

/// Fixed-capacity buffering over any writer. Flushes when an incoming
/// write would overflow the buffer, on [`flush`](Self::flush), and on
/// drop (best-effort).
pub struct BufferedWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    cap: usize,
}

impl<W: Write> BufferedWriter<W> {
    const DEFAULT_CAP: usize = 8192;

    pub fn new(inner: W) -> Self {
        Self::with_capacity(Self::DEFAULT_CAP, inner)
    }

    pub fn with_capacity(cap: usize, inner: W) -> Self {
        let cap = cap.max(1);
        Self {
            inner,
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Write the buffered bytes through and flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()
    }

    /// The underlying writer, after a final flush.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        // Disassemble without running Drop (which would flush again).
        let this = core::mem::ManuallyDrop::new(self);
        let inner = unsafe { core::ptr::read(&this.inner) };
        drop(unsafe { core::ptr::read(&this.buf) });
        Ok(inner)
    }
}

impl<W: Write> Write for BufferedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.cap {
            if !self.buf.is_empty() {
                self.inner.write_all(&self.buf)?;
                self.buf.clear();
            }
            // Oversized writes skip the buffer entirely.
            if data.len() >= self.cap {
                self.inner.write_all(data)?;
                return Ok(data.len());
            }
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        BufferedWriter::flush(self)
    }
}

impl<W: Write> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        let _ = BufferedWriter::flush(self);
    }
}

/// Read a whole file into memory.
pub fn read_to_vec(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut out = Vec::new();
    file.read_to_end(&mut out)?;
    Ok(out)
}

/// Create or truncate `path` with `bytes`.
pub fn write_all(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)
}

/// `mkdir -p`.
pub fn create_dir_all(path: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Delete a file.
pub fn remove_file(path: impl AsRef<Path>) -> io::Result<()> {
    fs::remove_file(path)
}
