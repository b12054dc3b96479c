// Block-aligned output with a running byte offset
use crate::{
    Error, Result,
    blocks::common::{block_offset, padding_to_block},
};
use std::io::Write;

/// Wraps an output stream and tracks how many bytes were written, so block
/// padding never has to query the stream position.
pub(super) struct BlockWriter<'a, W: Write> {
    writer: &'a mut W,
    offset: u64,
}

impl<'a, W: Write> BlockWriter<'a, W> {
    pub(super) fn new(writer: &'a mut W) -> Self {
        Self { writer, offset: 0 }
    }

    pub(super) fn offset(&self) -> u64 {
        self.offset
    }

    /// Writes `bytes` at the current offset and returns where they start.
    pub(super) fn write_block(&mut self, bytes: &[u8]) -> Result<u64> {
        self.writer.write_all(bytes)?;
        let start = self.offset;
        self.offset += bytes.len() as u64;
        Ok(start)
    }

    /// Zero-fills up to the next 512-byte boundary.
    pub(super) fn pad_to_block(&mut self) -> Result<()> {
        let padding = padding_to_block(self.offset);
        if padding != 0 {
            self.write_block(&vec![0u8; padding as usize])?;
        }
        Ok(())
    }

    /// Checks that output has reached the start of 1-based `block`.
    pub(super) fn expect_block(&self, block: u16) -> Result<()> {
        let expected = block_offset(block);
        if self.offset != expected {
            return Err(Error::BlockSerializationError(format!(
                "expected to be at block {block} (byte {expected}), at byte {}",
                self.offset
            )));
        }
        Ok(())
    }

    pub(super) fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
