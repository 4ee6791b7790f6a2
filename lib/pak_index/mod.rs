//! Directory index parsing.
//!
//! The remote package ships one index blob mapping every logical path to the
//! numbered archive segment that backs it. Only that mapping is decoded here;
//! segment payloads are opaque to the engine and handed to the external
//! extraction tool untouched.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

/// Identifier of one backing archive segment.
///
/// Segment ids are dense small integers but the required set for a run is not
/// necessarily contiguous.
pub type SegmentId = u16;

/// Signature of a serialized directory index blob.
pub const INDEX_MAGIC: u32 = 0x55aa_1234;

const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index blob truncated: {0}")]
    Truncated(#[from] std::io::Error),
    #[error("bad index magic: {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),
    #[error("index entry path is not valid utf-8")]
    InvalidPath(#[from] std::string::FromUtf8Error),
}

/// One `path -> segment` mapping from the directory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub segment: SegmentId,
}

/// Ordered, read-only mapping from logical paths to archive segments.
///
/// Loaded once per sync run and owned by segment selection; never persisted
/// across restarts since the remote index is re-fetched cheaply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIndex {
    entries: Vec<IndexEntry>,
}

impl DirectoryIndex {
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    /// Decodes an index blob.
    ///
    /// Layout: `u32` magic, `u32` format version, `u32` entry count, then per
    /// entry a length-prefixed path (`u16` + bytes) and a `u16` segment id.
    /// All integers little-endian.
    pub fn parse(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(IndexError::BadMagic(magic));
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        if version != SUPPORTED_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        let entry_count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut entries = Vec::with_capacity(entry_count.min(1 << 16));
        for _ in 0..entry_count {
            let path_len = cursor.read_u16::<LittleEndian>()? as usize;
            let mut raw_path = vec![0u8; path_len];
            cursor.read_exact(&mut raw_path)?;
            let path = String::from_utf8(raw_path)?;
            let segment = cursor.read_u16::<LittleEndian>()?;
            entries.push(IndexEntry { path, segment });
        }

        Ok(Self { entries })
    }

    /// Encodes the index in the same layout `parse` accepts.
    pub fn to_bytes(&self) -> Vec<u8> {
        use byteorder::WriteBytesExt;

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(INDEX_MAGIC)
            .expect("vec write is infallible");
        out.write_u32::<LittleEndian>(SUPPORTED_VERSION)
            .expect("vec write is infallible");
        out.write_u32::<LittleEndian>(self.entries.len() as u32)
            .expect("vec write is infallible");
        for entry in &self.entries {
            out.write_u16::<LittleEndian>(entry.path.len() as u16)
                .expect("vec write is infallible");
            out.extend_from_slice(entry.path.as_bytes());
            out.write_u16::<LittleEndian>(entry.segment)
                .expect("vec write is infallible");
        }
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
