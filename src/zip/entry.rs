//! Streaming access to a single archive member.

use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use crate::error::{ExtractError, Result};
use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry, invalid};

/// Member path of the activity log inside an Apple Health export.
pub const DEFAULT_ENTRY: &str = "apple_health_export/export.xml";

/// Open `entry_name` inside the ZIP archive at `archive_path`.
///
/// The returned stream owns the archive handle; dropping it closes the file.
pub fn open_entry(archive_path: &Path, entry_name: &str) -> Result<EntryStream<LocalFileReader>> {
    let reader = LocalFileReader::new(archive_path)
        .map_err(|e| ExtractError::archive(archive_path, e))?;
    open_entry_in(Arc::new(reader), archive_path, entry_name)
}

/// Open `entry_name` inside an archive read from any [`ReadAt`] source.
///
/// `archive_path` only labels errors.
pub fn open_entry_in<R: ReadAt>(
    reader: Arc<R>,
    archive_path: &Path,
    entry_name: &str,
) -> Result<EntryStream<R>> {
    let parser = ZipParser::new(reader);

    let entry = parser
        .find_entry(entry_name)
        .map_err(|e| ExtractError::archive(archive_path, e))?
        .ok_or_else(|| ExtractError::EntryNotFound {
            entry: entry_name.to_string(),
        })?;

    if let CompressionMethod::Unknown(method) = entry.compression_method {
        return Err(ExtractError::UnsupportedCompression {
            entry: entry_name.to_string(),
            method,
        });
    }

    let data_offset = parser
        .data_offset(&entry)
        .map_err(|e| ExtractError::archive(archive_path, e))?;

    tracing::debug!(
        entry = %entry.file_name,
        method = entry.compression_method.as_u16(),
        compressed = entry.compressed_size,
        uncompressed = entry.uncompressed_size,
        "located archive member"
    );

    Ok(EntryStream::new(parser.reader().clone(), &entry, data_offset))
}

/// Bounded reader over the raw bytes of one member.
struct RangeReader<R: ReadAt> {
    reader: Arc<R>,
    pos: u64,
    end: u64,
}

impl<R: ReadAt> Read for RangeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end - self.pos;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.pos, &mut buf[..len])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive member data is truncated",
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

enum Body<R: ReadAt> {
    Stored(RangeReader<R>),
    Deflated(DeflateDecoder<RangeReader<R>>),
}

/// Decompressed byte stream of one archive member.
///
/// The CRC-32 and size recorded in the central directory are checked once
/// the stream reaches its end; a mismatch is reported as `InvalidData`.
pub struct EntryStream<R: ReadAt> {
    body: Body<R>,
    crc: Crc,
    expected_crc: u32,
    expected_size: u64,
    verified: bool,
}

impl<R: ReadAt> EntryStream<R> {
    fn new(reader: Arc<R>, entry: &ZipFileEntry, data_offset: u64) -> Self {
        let raw = RangeReader {
            reader,
            pos: data_offset,
            end: data_offset + entry.compressed_size,
        };
        let body = match entry.compression_method {
            CompressionMethod::Deflate => Body::Deflated(DeflateDecoder::new(raw)),
            _ => Body::Stored(raw),
        };
        Self {
            body,
            crc: Crc::new(),
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
            verified: false,
        }
    }

    fn verify(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        if u64::from(self.crc.amount()) != self.expected_size & 0xFFFF_FFFF {
            return Err(invalid("archive member size mismatch"));
        }
        if self.crc.sum() != self.expected_crc {
            return Err(invalid("archive member checksum mismatch"));
        }
        Ok(())
    }
}

impl<R: ReadAt> Read for EntryStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match &mut self.body {
            Body::Stored(raw) => raw.read(buf)?,
            Body::Deflated(decoder) => decoder.read(buf)?,
        };
        if n == 0 {
            self.verify()?;
        } else {
            self.crc.update(&buf[..n]);
        }
        Ok(n)
    }
}
