//! Decoding entry point.
//!
//! [`Reader::new`] reads the header and the whole parameter directory,
//! validates them against each other and resolves the frame layout. Frames
//! are pulled lazily afterwards, either as owned values through
//! [`Reader::frames`] or into one reused buffer through
//! [`Reader::frame_cursor`].

use crate::{
    Error, Result, Warning,
    blocks::{
        BLOCK_SIZE, HEADER_SIZE, Header, Parameter,
        common::{PARAMETER_PREAMBLE_SIZE, block_offset, validate_buffer_size},
    },
    directory::Directory,
    parsing::{Frame, FrameLayout, decode_parameter_section},
};
use log::debug;
use std::io::{Read, Seek, SeekFrom};

/// Reads a C3D stream.
///
/// The reader borrows nothing and closes nothing: the handle is owned until
/// [`Reader::into_inner`] gives it back.
#[derive(Debug)]
pub struct Reader<R> {
    handle: R,
    directory: Directory,
    layout: FrameLayout,
    warnings: Vec<Warning>,
}

impl<R: Read + Seek> Reader<R> {
    /// Decodes the header and parameter section of `handle`.
    ///
    /// # Errors
    /// Format errors for bad magic, a non-Intel parameter section or a
    /// malformed record; [`Error::InconsistentMetadata`] when the header and
    /// the POINT group disagree; [`Error::MissingParameter`] when a required
    /// POINT parameter is absent.
    pub fn new(mut handle: R) -> Result<Self> {
        handle.seek(SeekFrom::Start(0))?;
        let bytes = read_up_to(&mut handle, HEADER_SIZE)?;
        let header = Header::from_bytes(&bytes)?;

        handle.seek(SeekFrom::Start(block_offset(header.parameter_block as u16)))?;
        let mut section = read_up_to(&mut handle, BLOCK_SIZE)?;
        validate_buffer_size(&section, PARAMETER_PREAMBLE_SIZE)?;
        let blocks = (section[2] as usize).max(1);
        if blocks > 1 {
            section.extend(read_up_to(&mut handle, (blocks - 1) * BLOCK_SIZE)?);
        }

        let (directory, mut warnings) = decode_parameter_section(header, &section)?;
        warnings.extend(directory.check_metadata()?);
        let layout = FrameLayout::from_directory(&directory)?;

        debug!(
            "{} points, {} analog channels x {} samples, frames {}..={}, {} bytes per frame",
            layout.point_count,
            layout.analog_channels,
            layout.analog_samples,
            directory.first_frame()?,
            directory.last_frame()?,
            layout.frame_size()
        );

        Ok(Self {
            handle,
            directory,
            layout,
            warnings,
        })
    }

    /// Iterates over all frames, each in its own buffers.
    ///
    /// Every call restarts at the first frame.
    pub fn frames(&mut self) -> Result<Frames<'_, R>> {
        Ok(Frames {
            source: self.frame_source()?,
        })
    }

    /// Iterates over all frames while reusing one frame buffer.
    pub fn frame_cursor(&mut self) -> Result<FrameCursor<'_, R>> {
        let frame = self.layout.empty_frame(0);
        Ok(FrameCursor {
            source: self.frame_source()?,
            frame,
        })
    }

    fn frame_source(&mut self) -> Result<FrameSource<'_, R>> {
        let first = self.directory.first_frame()?;
        let last = self.directory.last_frame()?;
        let offset = self.data_offset();
        self.handle.seek(SeekFrom::Start(offset))?;
        Ok(FrameSource {
            handle: &mut self.handle,
            layout: &self.layout,
            raw: vec![0; self.layout.frame_size()],
            next: first,
            last,
            failed: false,
        })
    }
}

impl<R> Reader<R> {
    pub fn header(&self) -> &Header {
        self.directory.header()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Non-fatal findings from decoding and validation.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.directory.get(key)
    }

    pub fn point_rate(&self) -> Result<f32> {
        self.directory.point_rate()
    }

    pub fn point_scale(&self) -> Result<f32> {
        self.directory.point_scale()
    }

    pub fn point_used(&self) -> Result<u16> {
        self.directory.point_used()
    }

    pub fn analog_used(&self) -> Result<u16> {
        self.directory.analog_used()
    }

    pub fn analog_rate(&self) -> Result<f32> {
        self.directory.analog_rate()
    }

    pub fn point_labels(&self) -> Result<Vec<String>> {
        self.directory.point_labels()
    }

    pub fn analog_labels(&self) -> Result<Vec<String>> {
        self.directory.analog_labels()
    }

    pub fn first_frame(&self) -> Result<u32> {
        self.directory.first_frame()
    }

    pub fn last_frame(&self) -> Result<u32> {
        self.directory.last_frame()
    }

    pub fn frame_count(&self) -> Result<u32> {
        self.directory.frame_count()
    }

    /// Byte offset of the first frame.
    pub fn data_offset(&self) -> u64 {
        block_offset(self.directory.header().data_block)
    }

    /// Gives the handle back.
    pub fn into_inner(self) -> R {
        self.handle
    }
}

/// Shared frame pump behind [`Frames`] and [`FrameCursor`].
#[derive(Debug)]
struct FrameSource<'a, R> {
    handle: &'a mut R,
    layout: &'a FrameLayout,
    raw: Vec<u8>,
    next: u32,
    last: u32,
    failed: bool,
}

impl<R: Read> FrameSource<'_, R> {
    /// Reads the next frame into `frame`; `None` once the range is exhausted
    /// or after an error.
    fn next_into(&mut self, frame: &mut Frame) -> Option<Result<()>> {
        if self.failed || self.next > self.last {
            return None;
        }
        let result = self
            .handle
            .read_exact(&mut self.raw)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::TooShortBuffer {
                    actual: 0,
                    expected: self.raw.len(),
                    file: file!(),
                    line: line!(),
                },
                _ => Error::IOError(e),
            })
            .and_then(|()| {
                frame.number = self.next;
                self.layout.decode_into(&self.raw, frame)
            });
        match result {
            Ok(()) => self.next += 1,
            Err(_) => self.failed = true,
        }
        Some(result)
    }

    fn remaining(&self) -> usize {
        if self.failed || self.next > self.last {
            0
        } else {
            (self.last - self.next) as usize + 1
        }
    }
}

/// Iterator over owned frames. Stops after the first error.
#[derive(Debug)]
pub struct Frames<'a, R> {
    source: FrameSource<'a, R>,
}

impl<R: Read> Iterator for Frames<'_, R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut frame = self.source.layout.empty_frame(self.source.next);
        self.source
            .next_into(&mut frame)
            .map(|result| result.map(|()| frame))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.source.remaining()))
    }
}

/// Frame-by-frame access through a single reused buffer.
///
/// The frame returned by [`FrameCursor::advance`] borrows the cursor, so it
/// must be consumed (or cloned) before the next call.
#[derive(Debug)]
pub struct FrameCursor<'a, R> {
    source: FrameSource<'a, R>,
    frame: Frame,
}

impl<R: Read> FrameCursor<'_, R> {
    /// Decodes the next frame into the shared buffer.
    pub fn advance(&mut self) -> Result<Option<&Frame>> {
        match self.source.next_into(&mut self.frame) {
            None => Ok(None),
            Some(Err(e)) => Err(e),
            Some(Ok(())) => Ok(Some(&self.frame)),
        }
    }
}

/// Reads up to `len` bytes, stopping early at end of stream.
fn read_up_to<R: Read>(handle: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(len);
    handle.by_ref().take(len as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
