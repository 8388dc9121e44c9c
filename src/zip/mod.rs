//! ZIP archive parsing and member streaming.
//!
//! - [`structures`]: data structures for ZIP format elements (EOCD, headers)
//! - [`parser`]: binary parsing of those structures from a [`ReadAt`](crate::io::ReadAt) source
//! - [`entry`]: locating one named member and streaming its decompressed bytes
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first, then the Central Directory, so a member can be
//! located without touching the data of any other member.
//!
//! ## Supported Features
//!
//! - ZIP64 extensions for archives and members > 4GB
//! - STORED and DEFLATE members, streamed with CRC-32 verification
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod entry;
mod parser;
mod structures;

pub use entry::{DEFAULT_ENTRY, EntryStream, open_entry, open_entry_in};
pub use parser::ZipParser;
pub use structures::*;
