//! Chunk planning for resumable uploads
//!
//! A [`ChunkPlan`] splits a file of known size into fixed-size byte ranges.
//! The plan is computed once up front so that the chunk count and the transfer
//! identifier stay constant for every request of one transfer.

use crate::error::{CommonError, Result};
use chrono::{DateTime, TimeZone};
use std::path::Path;

/// Size of one upload chunk (5 MiB). The last chunk may be smaller.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Timestamp layout used as the prefix of transfer identifiers.
pub const TRANSFER_TIMESTAMP_FORMAT: &str = "%d%m%y%H%M%S";

/// One byte range of a planned upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// 1-based sequence number
    pub number: u32,
    /// Byte offset into the source file
    pub offset: u64,
    /// Number of bytes in this chunk
    pub size: u64,
}

/// Fixed-size chunk layout for a file of `total_size` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Plan chunks for `total_size` bytes with the given chunk size.
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CommonError::InvalidChunkSize(chunk_size));
        }

        // chunk numbers travel as u32
        let chunks = total_size.div_ceil(chunk_size);
        if u32::try_from(chunks).is_err() {
            return Err(CommonError::TooManyChunks {
                total_size,
                chunk_size,
            });
        }

        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    /// Plan chunks for a file on disk.
    pub fn for_file(path: impl AsRef<Path>, chunk_size: u64) -> Result<Self> {
        let total_size = std::fs::metadata(path)?.len();
        Self::new(total_size, chunk_size)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks, `ceil(total_size / chunk_size)`.
    ///
    /// [`ChunkPlan::new`] only accepts plans whose count fits in a `u32`.
    pub fn chunk_count(&self) -> u32 {
        u32::try_from(self.total_size.div_ceil(self.chunk_size)).unwrap_or(u32::MAX)
    }

    /// Iterate over the chunk spans in sequence order.
    pub fn spans(&self) -> impl Iterator<Item = ChunkSpan> + '_ {
        (0..self.chunk_count()).map(move |index| {
            let offset = index as u64 * self.chunk_size;
            ChunkSpan {
                number: index + 1,
                offset,
                size: self.chunk_size.min(self.total_size - offset),
            }
        })
    }
}

/// Build the transfer identifier for one upload.
///
/// Format: `{timestamp}-{file name without dots}`, e.g. `191026120000-datacsv`.
pub fn transfer_identifier<Tz: TimeZone>(timestamp: &DateTime<Tz>, file_name: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}-{}",
        timestamp.format(TRANSFER_TIMESTAMP_FORMAT),
        file_name.replace('.', "")
    )
}

/// Extract the final path component as UTF-8.
pub fn file_name_of(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| CommonError::InvalidFileName(path.display().to_string()))
}
