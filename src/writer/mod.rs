//! C3D file writer module.
//!
//! [`Writer`] collects frames in memory and emits a complete file in one
//! pass:
//!
//! ```text
//! block 1            header (512 bytes)
//! block 2..          parameter section, zero padded to whole blocks
//! block DATA_START.. frames back to back, zero padded once at the end
//! ```
//!
//! Before any byte is written the standard POINT, ANALOG and TRIAL
//! parameters are synchronised with the frames, `POINT:DATA_START` is derived
//! from the size of the parameter section, and the header is cross-checked
//! against the directory.
//!
//! # Example
//!
//! ```no_run
//! use c3d_rs::{Result, Writer, WriterConfig};
//! use ndarray::Array2;
//! use std::fs::File;
//!
//! fn write_markers() -> Result<()> {
//!     let config = WriterConfig::new(100.0).with_point_labels(["LASI", "RASI"]);
//!     let mut writer = Writer::new(config);
//!     for _ in 0..10 {
//!         writer.add_frame(Array2::zeros((2, 5)), Array2::zeros((0, 0)))?;
//!     }
//!     writer.write(&mut File::create("markers.c3d")?)?;
//!     Ok(())
//! }
//! ```

use crate::{
    Error, Result, Warning,
    blocks::Header,
    directory::Directory,
    parsing::{Frame, FrameLayout},
};
use log::{debug, warn};
use ndarray::Array2;
use std::io::Write;

mod init;
mod io;

use io::BlockWriter;

/// Writer settings used for parameters the directory does not already hold.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// `POINT:RATE` in frames per second
    pub point_rate: f32,
    /// `POINT:SCALE`; negative selects float storage
    pub point_scale: f32,
    /// `POINT:UNITS`
    pub point_units: String,
    /// `ANALOG:GEN_SCALE`
    pub gen_scale: f32,
    /// Number of the first frame
    pub first_frame: u32,
    pub point_labels: Option<Vec<String>>,
    pub analog_labels: Option<Vec<String>>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            point_rate: 480.0,
            point_scale: -1.0,
            point_units: "mm".to_string(),
            gen_scale: 1.0,
            first_frame: 1,
            point_labels: None,
            analog_labels: None,
        }
    }
}

impl WriterConfig {
    pub fn new(point_rate: f32) -> Self {
        Self {
            point_rate,
            ..Self::default()
        }
    }

    pub fn with_point_scale(mut self, scale: f32) -> Self {
        self.point_scale = scale;
        self
    }

    pub fn with_point_units(mut self, units: &str) -> Self {
        self.point_units = units.to_string();
        self
    }

    pub fn with_gen_scale(mut self, gen_scale: f32) -> Self {
        self.gen_scale = gen_scale;
        self
    }

    pub fn with_first_frame(mut self, first_frame: u32) -> Self {
        self.first_frame = first_frame;
        self
    }

    pub fn with_point_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.point_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_analog_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analog_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }
}

/// Frame dimensions shared by every frame of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameShape {
    pub points: usize,
    pub channels: usize,
    pub samples: usize,
}

/// Writer for C3D files.
///
/// Not thread-safe; build and write from a single thread.
#[derive(Debug, Clone)]
pub struct Writer {
    config: WriterConfig,
    directory: Directory,
    frames: Vec<(Array2<f64>, Array2<f64>)>,
}

impl Writer {
    pub fn new(config: WriterConfig) -> Self {
        Self::with_directory(config, Directory::default())
    }

    /// Starts from an existing directory, e.g. one taken from a
    /// [`crate::Reader`], so its groups are carried into the new file.
    pub fn with_directory(config: WriterConfig, directory: Directory) -> Self {
        Self {
            config,
            directory,
            frames: Vec::new(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Access to the directory for adding caller groups and parameters.
    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    /// Queues one frame.
    ///
    /// `points` is `(n, 5)`: x, y, z, residual, camera count (negative
    /// residual or camera count marks the point invalid). `analog` is
    /// `(channels, samples_per_frame)`. Every frame must have the shapes of
    /// the first one. More than 255 points or channels are rejected unless
    /// the directory already holds their LABELS and DESCRIPTIONS.
    pub fn add_frame(&mut self, points: Array2<f64>, analog: Array2<f64>) -> Result<()> {
        if points.ncols() != 5 {
            return Err(Error::InvalidFrame(format!(
                "points need 5 columns, got {}",
                points.ncols()
            )));
        }
        self.check_label_columns("POINT", points.nrows())?;
        self.check_label_columns("ANALOG", analog.nrows())?;
        if analog.nrows() == 0 && analog.ncols() != 0 {
            return Err(Error::InvalidFrame(format!(
                "{} analog samples per frame but no channels",
                analog.ncols()
            )));
        }
        if let Some((first_points, first_analog)) = self.frames.first() {
            if points.dim() != first_points.dim() || analog.dim() != first_analog.dim() {
                return Err(Error::InvalidFrame(format!(
                    "frame {} has shapes {:?}/{:?}, earlier frames {:?}/{:?}",
                    self.frames.len() + 1,
                    points.dim(),
                    analog.dim(),
                    first_points.dim(),
                    first_analog.dim()
                )));
            }
        }
        self.frames.push((points, analog));
        Ok(())
    }

    /// Queues several frames, stopping at the first one that does not fit.
    pub fn add_frames<I>(&mut self, frames: I) -> Result<()>
    where
        I: IntoIterator<Item = (Array2<f64>, Array2<f64>)>,
    {
        for (points, analog) in frames {
            self.add_frame(points, analog)?;
        }
        Ok(())
    }

    /// Queues a frame decoded by a [`crate::Reader`].
    pub fn add_decoded(&mut self, frame: Frame) -> Result<()> {
        let (points, analog) = frame.into_parts();
        self.add_frame(points, analog)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Writes header, parameters and all queued frames to `handle`.
    ///
    /// The handle is flushed but not closed. Metadata problems are reported
    /// before anything is written.
    pub fn write<W: Write>(&mut self, handle: &mut W) -> Result<Vec<Warning>> {
        let shape = self.shape()?;
        self.sync_parameters(shape, self.frames.len())?;
        self.sync_header(shape)?;
        let mut warnings = self.directory.check_metadata()?;
        for (id, _) in self.directory.groups().filter(|(_, g)| g.name().is_empty()) {
            let warning = Warning::UnnamedGroup(id);
            warn!("{warning}; it is not written");
            warnings.push(warning);
        }

        let layout = FrameLayout::from_directory(&self.directory)?;
        let mut frame_bytes = Vec::with_capacity(layout.frame_size() * self.frames.len());
        for (i, (points, analog)) in self.frames.iter().enumerate() {
            layout
                .encode(points.view(), analog.view(), &mut frame_bytes)
                .map_err(|e| match e {
                    Error::InvalidFrame(msg) => {
                        Error::InvalidFrame(format!("queued frame {}: {msg}", i + 1))
                    }
                    other => other,
                })?;
        }
        let header_bytes = self.directory.header().to_bytes()?;
        let section_bytes = self.directory.to_bytes()?;

        let mut out = BlockWriter::new(handle);
        out.write_block(&header_bytes)?;
        out.expect_block(self.directory.header().parameter_block as u16)?;
        out.write_block(&section_bytes)?;
        out.pad_to_block()?;
        out.expect_block(self.directory.header().data_block)?;
        out.write_block(&frame_bytes)?;
        out.pad_to_block()?;
        out.flush()?;

        debug!(
            "wrote {} frames of {} bytes, {} bytes total",
            self.frames.len(),
            layout.frame_size(),
            out.offset()
        );
        Ok(warnings)
    }

    /// Writes to a new file at `path` through a buffered writer.
    pub fn write_to_file(&mut self, path: &str) -> Result<Vec<Warning>> {
        let file = std::fs::File::create(path)?;
        let mut buffered = std::io::BufWriter::new(file);
        self.write(&mut buffered)
    }

    /// Character arrays have one-byte dimensions, so synthesised LABELS and
    /// DESCRIPTIONS cover at most 255 columns.
    fn check_label_columns(&self, group: &str, columns: usize) -> Result<()> {
        if columns <= u8::MAX as usize {
            return Ok(());
        }
        let synthesised = ["LABELS", "DESCRIPTIONS"]
            .iter()
            .any(|param| self.directory.get(&format!("{group}:{param}")).is_none());
        if synthesised {
            return Err(Error::InvalidFrame(format!(
                "{columns} {group} columns, labels and descriptions hold at most 255"
            )));
        }
        Ok(())
    }

    fn shape(&self) -> Result<FrameShape> {
        let (points, analog) = self
            .frames
            .first()
            .ok_or_else(|| Error::InvalidFrame("no frames to write".to_string()))?;
        Ok(FrameShape {
            points: points.nrows(),
            channels: analog.nrows(),
            samples: analog.ncols(),
        })
    }

    /// Mirrors counts, scale, rate and block positions into the header.
    fn sync_header(&mut self, shape: FrameShape) -> Result<()> {
        let scale = self.directory.point_scale()?;
        let rate = self.directory.point_rate()?;
        let first = self.directory.first_frame()?;
        let last = self.directory.last_frame()?;
        let analog_count = u16::try_from(shape.channels * shape.samples).map_err(|_| {
            Error::InvalidFrame(format!(
                "{} analog samples per frame exceed 65535",
                shape.channels * shape.samples
            ))
        })?;

        // DATA_START is a fixed-size scalar, so its value does not change the
        // section size it is derived from.
        let data_block = u16::try_from(2 + self.directory.parameter_blocks()).map_err(|_| {
            Error::BlockSerializationError("parameter section too large".to_string())
        })?;
        if let Some(param) = self.directory.get_mut("POINT:DATA_START") {
            param.set_data(data_block.to_le_bytes().to_vec())?;
        }

        let header = self.directory.header_mut();
        *header = Header {
            parameter_block: 2,
            point_count: shape.points as u16,
            analog_count,
            first_frame: first.min(u16::MAX as u32) as u16,
            last_frame: last.min(u16::MAX as u32) as u16,
            scale_factor: scale,
            data_block,
            analog_per_frame: shape.samples as u16,
            frame_rate: rate,
            ..header.clone()
        };
        Ok(())
    }
}
