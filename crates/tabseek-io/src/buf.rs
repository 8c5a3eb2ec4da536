//! Bounded buffered reading.
//!
//! Loaders read through `BoundedBufReader` so the in-flight buffer never
//! exceeds the configured capacity.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// A `BufReader` with a fixed, non-zero capacity.
pub struct BoundedBufReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> BoundedBufReader<R> {
    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity.max(1), reader),
        }
    }
}

impl<R: Read> Read for BoundedBufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> BufRead for BoundedBufReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }
    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

pub fn bounded_from_path<P: AsRef<Path>>(
    path: P,
    cap: usize,
) -> io::Result<BoundedBufReader<File>> {
    let file = File::open(path)?;
    Ok(BoundedBufReader::with_capacity(cap, file))
}

/// Read at most `max` bytes from the start of `path`.
pub fn read_prefix<P: AsRef<Path>>(path: P, max: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buf = Vec::with_capacity(max.min(64 * 1024));
    file.take(max as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
