//! Sequential stream endpoints.
//!
//! Reading needs `Read + Seek`; writing needs `Write` plus an optional size
//! hint so the destination can reserve space before the payload arrives.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, Write};

pub trait StreamSource: Read + Seek {}

impl<T: Read + Seek + ?Sized> StreamSource for T {}

pub trait StreamSink: Write {
    /// Hints the final stream length. Failing or ignoring the hint never
    /// changes the bytes written.
    fn preallocate(&mut self, len: u64) -> io::Result<()> {
        let _ = len;
        Ok(())
    }
}

// A file never grows ahead of its payload: a stream cut short stays short.
impl StreamSink for File {}

impl StreamSink for Vec<u8> {
    fn preallocate(&mut self, len: u64) -> io::Result<()> {
        reserve_total(self, len)
    }
}

impl StreamSink for Cursor<Vec<u8>> {
    fn preallocate(&mut self, len: u64) -> io::Result<()> {
        reserve_total(self.get_mut(), len)
    }
}

impl<W: StreamSink> StreamSink for BufWriter<W> {
    fn preallocate(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().preallocate(len)
    }
}

impl<S: StreamSink + ?Sized> StreamSink for &mut S {
    fn preallocate(&mut self, len: u64) -> io::Result<()> {
        (**self).preallocate(len)
    }
}

fn reserve_total(buffer: &mut Vec<u8>, len: u64) -> io::Result<()> {
    let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
    let additional = len.saturating_sub(buffer.len());
    buffer
        .try_reserve(additional)
        .map_err(|err| io::Error::new(io::ErrorKind::OutOfMemory, err))
}
