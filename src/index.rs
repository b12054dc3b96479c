//! Frame indexing for random access.
//!
//! A [`FrameIndex`] captures where frames start, how large each one is and
//! how to decode it. It can be serialized to JSON and used later to read
//! individual frames without parsing the parameter section again.
//!
//! ```no_run
//! use c3d_rs::{FileRangeReader, FrameIndex, Result};
//!
//! fn read_one_frame() -> Result<()> {
//!     let index = FrameIndex::from_file("walk.c3d")?;
//!     index.save_to_file("walk.c3d.index")?;
//!
//!     let index = FrameIndex::load_from_file("walk.c3d.index")?;
//!     let mut source = FileRangeReader::new("walk.c3d")?;
//!     let frame = index.read_frame(120, &mut source)?;
//!     println!("{} points", frame.points.nrows());
//!     Ok(())
//! }
//! ```

use crate::{
    Error, Result,
    parsing::{Frame, FrameLayout},
    reader::Reader,
};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Trait for reading byte ranges from different sources (files, memory, ...)
pub trait ByteRangeReader {
    type Error;

    /// Read `length` bytes starting at `offset`.
    fn read_range(&mut self, offset: u64, length: u64)
    -> core::result::Result<Vec<u8>, Self::Error>;
}

/// Local file reader implementation
pub struct FileRangeReader {
    file: std::fs::File,
}

impl FileRangeReader {
    pub fn new(file_path: &str) -> Result<Self> {
        let file = std::fs::File::open(file_path).map_err(Error::IOError)?;
        Ok(Self { file })
    }
}

impl ByteRangeReader for FileRangeReader {
    type Error = Error;

    fn read_range(
        &mut self,
        offset: u64,
        length: u64,
    ) -> core::result::Result<Vec<u8>, Self::Error> {
        read_exact_at(&mut self.file, offset, length)
    }
}

impl<T: AsRef<[u8]>> ByteRangeReader for Cursor<T> {
    type Error = Error;

    fn read_range(
        &mut self,
        offset: u64,
        length: u64,
    ) -> core::result::Result<Vec<u8>, Self::Error> {
        read_exact_at(self, offset, length)
    }
}

fn read_exact_at<R: Read + Seek>(source: &mut R, offset: u64, length: u64) -> Result<Vec<u8>> {
    source.seek(SeekFrom::Start(offset)).map_err(Error::IOError)?;
    let mut buffer = vec![0u8; length as usize];
    source.read_exact(&mut buffer).map_err(Error::IOError)?;
    Ok(buffer)
}

/// Layout of the frame stream of one file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameIndex {
    /// Byte offset of the first frame
    pub data_offset: u64,
    /// Bytes per frame
    pub frame_size: u64,
    pub first_frame: u32,
    pub last_frame: u32,
    pub point_labels: Vec<String>,
    pub analog_labels: Vec<String>,
    pub layout: FrameLayout,
}

impl FrameIndex {
    pub fn from_reader<R>(reader: &Reader<R>) -> Result<Self> {
        Ok(Self {
            data_offset: reader.data_offset(),
            frame_size: reader.layout().frame_size() as u64,
            first_frame: reader.first_frame()?,
            last_frame: reader.last_frame()?,
            point_labels: reader.point_labels()?,
            analog_labels: reader.analog_labels()?,
            layout: reader.layout().clone(),
        })
    }

    /// Builds an index by decoding the metadata of the file at `path`.
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = Reader::new(std::io::BufReader::new(file))?;
        Self::from_reader(&reader)
    }

    pub fn frame_count(&self) -> u32 {
        if self.last_frame < self.first_frame {
            0
        } else {
            self.last_frame - self.first_frame + 1
        }
    }

    /// Position of a point label, ignoring case and trailing padding.
    pub fn point_index(&self, label: &str) -> Option<usize> {
        self.point_labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label.trim_end()))
    }

    /// Position of an analog channel label, ignoring case and trailing padding.
    pub fn analog_index(&self, label: &str) -> Option<usize> {
        self.analog_labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label.trim_end()))
    }

    /// Decodes a single frame by number.
    pub fn read_frame<R>(&self, number: u32, reader: &mut R) -> Result<Frame>
    where
        R: ByteRangeReader<Error = Error>,
    {
        let mut frames = self.read_frames(number, number, reader)?;
        frames
            .pop()
            .ok_or_else(|| Error::InvalidFrame(format!("frame {number} not decoded")))
    }

    /// Decodes the inclusive frame range `first..=last` with one range read.
    pub fn read_frames<R>(&self, first: u32, last: u32, reader: &mut R) -> Result<Vec<Frame>>
    where
        R: ByteRangeReader<Error = Error>,
    {
        if first > last || first < self.first_frame || last > self.last_frame {
            return Err(Error::InvalidFrame(format!(
                "frames {first}..={last} outside {}..={}",
                self.first_frame, self.last_frame
            )));
        }
        let offset = self.data_offset + (first - self.first_frame) as u64 * self.frame_size;
        let count = (last - first) as u64 + 1;
        let bytes = reader.read_range(offset, count * self.frame_size)?;

        let frame_size = self.frame_size as usize;
        (first..=last)
            .enumerate()
            .map(|(i, number)| {
                self.layout
                    .decode(number, &bytes[i * frame_size..(i + 1) * frame_size])
            })
            .collect()
    }

    /// Save the index to a JSON file.
    ///
    /// Requires the `serde` feature.
    #[cfg(feature = "serde")]
    pub fn save_to_file(&self, index_path: &str) -> Result<()> {
        std::fs::write(index_path, self.to_json()?).map_err(Error::IOError)
    }

    /// Load an index from a JSON file.
    ///
    /// Requires the `serde` feature.
    #[cfg(feature = "serde")]
    pub fn load_from_file(index_path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(index_path).map_err(Error::IOError)?;
        Self::from_json(&json)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::BlockSerializationError(format!("JSON serialization failed: {}", e))
        })
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::BlockSerializationError(format!("JSON deserialization failed: {}", e))
        })
    }
}
