//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Scan the Central Directory for the requested member
//! 4. Read that member's Local File Header to locate its data
//!
//! Only the tail of the archive and the target member are ever read;
//! the data of every other member is left untouched.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Location and size of the Central Directory.
struct CentralDirectory {
    offset: u64,
    size: u64,
    total_entries: u64,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so archives can come from a local file,
/// an in-memory buffer, or a cancellable wrapper around either.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// Returns the EOCD record and its offset in the file.
    pub fn find_eocd(&self) -> io::Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(invalid("not a valid zip file"));
        }

        // Common case first: no archive comment.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf)?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            if eocd.comment_len == 0 {
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf)?;

        // Search backwards for PK\x05\x06 whose comment length reaches exactly to EOF
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
            if eocd.comment_len as usize == buf.len() - i - EndOfCentralDirectory::SIZE {
                return Ok((eocd, search_start + i as u64));
            }
        }

        Err(invalid("not a valid zip file"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has saturated (0xFFFF / 0xFFFFFFFF)
    /// fields. The locator sits immediately before the regular EOCD.
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> io::Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| invalid("missing zip64 end of central directory locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut locator_buf)?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader.read_exact_at(locator.eocd64_offset, &mut eocd64_buf)?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    fn central_directory(&self) -> io::Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        let cd = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                total_entries: eocd64.total_entries,
            }
        } else {
            CentralDirectory {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                total_entries: eocd.total_entries as u64,
            }
        };

        let in_bounds = cd
            .offset
            .checked_add(cd.size)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(invalid("central directory lies outside the archive"));
        }
        Ok(cd)
    }

    /// Look up a member by its exact name.
    ///
    /// Reads the Central Directory in one request and scans its headers,
    /// stopping at the first match. Directory entries never match.
    ///
    /// Returns `Ok(None)` when the archive is valid but has no such member.
    pub fn find_entry(&self, name: &str) -> io::Result<Option<ZipFileEntry>> {
        let cd = self.central_directory()?;

        let mut cd_data = vec![0u8; cd.size as usize];
        self.reader.read_exact_at(cd.offset, &mut cd_data)?;
        let mut cursor = Cursor::new(cd_data.as_slice());

        for _ in 0..cd.total_entries {
            let entry = parse_cdfh(&mut cursor)?;
            if !entry.is_directory && entry.file_name == name {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    /// Get the offset where the member's compressed data begins.
    ///
    /// The Local File Header has its own variable-length name and extra
    /// fields which may differ from the Central Directory copy.
    pub fn data_offset(&self, entry: &ZipFileEntry) -> io::Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(invalid("invalid local file header"));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        let in_bounds = data_offset
            .checked_add(entry.compressed_size)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(invalid("member data lies outside the archive"));
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> io::Result<ZipFileEntry> {
    let cd_len = cursor.get_ref().len() as u64;
    let remaining = cd_len.saturating_sub(cursor.position());
    if remaining < CDFH_MIN_SIZE as u64 {
        return Err(invalid("truncated central directory"));
    }

    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(invalid("invalid central directory file header"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy: a non-UTF-8 name can never equal the requested entry anyway
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    let is_directory = file_name.ends_with('/');

    // ZIP64 extended information lives in extra field 0x0001
    let extra_field_end = cursor.position() + extra_field_length as u64;
    let header_end = extra_field_end + file_comment_length as u64;
    if header_end > cd_len {
        return Err(invalid("central directory file header overruns the directory"));
    }

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = cursor.position() + field_size as u64;

        if header_id == 0x0001 {
            // Present only for header fields saturated at 0xFFFFFFFF, in this order
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    cursor.set_position(header_end);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        is_directory,
    })
}
