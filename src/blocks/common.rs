// blocks/common.rs
//! Common constants and helper functions for C3D block parsing.
//!
//! This module provides:
//! - Block geometry (`BLOCK_SIZE`, 1-based block offsets, padding math)
//! - Little-endian read helpers used by the header codec
//! - [`ByteCursor`], a bounds-checked sequential reader for variable-length records

use crate::{Error, Result};

/// Fixed alignment unit of a C3D file.
pub const BLOCK_SIZE: usize = 512;

/// Size of the header record at offset 0.
pub const HEADER_SIZE: usize = 512;

/// Value of the second header byte in every C3D file.
pub const C3D_MAGIC: u8 = 80;

/// Processor tag for Intel (little-endian) files, the only supported layout.
pub const PROCESSOR_INTEL: u8 = 84;

/// Size of the parameter-section preamble preceding the first record.
pub const PARAMETER_PREAMBLE_SIZE: usize = 4;

// ============================================================================
// Byte Parsing Helpers
// ============================================================================

/// Read a u16 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read an f32 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a buffer has at least `expected` bytes.
///
/// Returns `Err(TooShortBuffer)` if the buffer is too small.
#[inline]
pub fn validate_buffer_size(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(Error::TooShortBuffer {
            actual: bytes.len(),
            expected,
            file: file!(),
            line: line!(),
        });
    }
    Ok(())
}

// ============================================================================
// Block Geometry
// ============================================================================

/// Byte offset of a 1-based block index.
///
/// Block 0 does not exist in the format; it is treated like block 1.
#[inline]
pub const fn block_offset(block: u16) -> u64 {
    block.saturating_sub(1) as u64 * BLOCK_SIZE as u64
}

/// Number of zero bytes needed to reach the next block boundary.
#[inline]
pub const fn padding_to_block(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 { 0 } else { BLOCK_SIZE as u64 - rem }
}

/// Smallest number of blocks holding `size` bytes.
#[inline]
pub const fn blocks_for(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE)
}

/// Bounds-checked sequential reader over a borrowed byte slice.
///
/// Every read past the end yields [`Error::TooShortBuffer`] instead of
/// panicking, so truncated parameter sections fail as format errors.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(Error::TooShortBuffer {
                actual: self.bytes.len(),
                expected: end,
                file: file!(),
                line: line!(),
            });
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }
}

/// Decode text leniently; vendor files occasionally carry Latin-1 names.
pub(crate) fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_math() {
        assert_eq!(block_offset(1), 0);
        assert_eq!(block_offset(3), 1024);
        assert_eq!(padding_to_block(0), 0);
        assert_eq!(padding_to_block(1), 511);
        assert_eq!(padding_to_block(512), 0);
        assert_eq!(blocks_for(4), 1);
        assert_eq!(blocks_for(512), 1);
        assert_eq!(blocks_for(513), 2);
    }

    #[test]
    fn cursor_reports_short_reads() {
        let mut cur = ByteCursor::new(&[1, 0xFF, 0x34, 0x12]);
        assert_eq!(cur.u8().unwrap(), 1);
        assert_eq!(cur.i8().unwrap(), -1);
        assert_eq!(cur.i16().unwrap(), 0x1234);
        assert_eq!(cur.remaining(), 0);
        assert!(matches!(cur.u8(), Err(Error::TooShortBuffer { .. })));
    }
}
