#![forbid(unsafe_code)]

//! # c3d-rs
//!
//! A Rust library for reading and writing C3D motion-capture files.
//!
//! C3D is a binary format for 3D marker trajectories and synchronised analog
//! signals (force plates, EMG, ...). A file is a 512-byte header, a
//! self-describing parameter section of named, typed groups, and a stream of
//! frames, all aligned to 512-byte blocks.
//!
//! ## Features
//!
//! - **Reading**: Decode the header and parameter directory, validate them
//!   against each other, and pull frames lazily as `ndarray` arrays
//! - **Writing**: Build files from frames, with the standard POINT, ANALOG and
//!   TRIAL parameters filled in automatically
//! - **Parameters**: Typed access to any parameter through a single
//!   [`ElementKind`]-driven decode
//! - **Indexing**: Serialisable frame indexes for random access to single frames
//!
//! ## Supported Files
//!
//! Intel (little-endian) parameter sections with integer or float storage,
//! signed or unsigned analog samples. DEC and MIPS processor layouts are
//! rejected.
//!
//! ## Quick Start
//!
//! ### Reading a C3D file
//!
//! ```no_run
//! use c3d_rs::{Reader, Result};
//! use std::fs::File;
//!
//! fn main() -> Result<()> {
//!     let mut reader = Reader::new(File::open("walk.c3d")?)?;
//!     println!("{} Hz, labels {:?}", reader.point_rate()?, reader.point_labels()?);
//!
//!     for frame in reader.frames()? {
//!         let frame = frame?;
//!         let visible = (0..frame.points.nrows())
//!             .filter(|&i| frame.is_point_valid(i))
//!             .count();
//!         println!("frame {}: {} visible points", frame.number, visible);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Writing a C3D file
//!
//! ```no_run
//! use c3d_rs::{Result, Writer, WriterConfig};
//! use ndarray::{Array2, array};
//!
//! fn main() -> Result<()> {
//!     let mut writer = Writer::new(WriterConfig::new(100.0).with_point_labels(["HEEL"]));
//!     for t in 0..100 {
//!         let points = array![[t as f64, 0.0, 10.0, 0.0, 4.0]];
//!         writer.add_frame(points, Array2::zeros((0, 0)))?;
//!     }
//!     writer.write_to_file("heel.c3d")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Reading Parameters
//!
//! ```no_run
//! use c3d_rs::{ElementKind, ParamValue, Reader, Result};
//! use std::fs::File;
//!
//! fn main() -> Result<()> {
//!     let reader = Reader::new(File::open("walk.c3d")?)?;
//!     if let Some(param) = reader.get("SUBJECTS:NAMES") {
//!         if let ParamValue::Utf8Array(names) = param.decode(ElementKind::Utf8Array)? {
//!             println!("subjects: {names:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`blocks`] | Header, group and parameter records |
//! | [`directory`] | The parameter directory and metadata consistency checks |
//! | [`parsing`] | Parameter section decoding and the frame codec |
//! | [`reader`] | File decoding with [`Reader`] |
//! | [`writer`] | File creation with [`Writer`] |
//! | [`index`] | Frame indexing for random access |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. Non-fatal findings are logged through the
//! `log` facade and returned as [`Warning`] values.

pub mod blocks;
pub mod directory;
pub mod error;
pub mod index;
pub mod parsing;
pub mod reader;
pub mod writer;

pub use blocks::{ElementKind, Group, Header, ParamArray, ParamValue, Parameter};
pub use directory::Directory;
pub use error::{Error, Result, Warning};
pub use index::{ByteRangeReader, FileRangeReader, FrameIndex};
pub use parsing::{AnalogFormat, Frame, FrameLayout};
pub use reader::{FrameCursor, Frames, Reader};
pub use writer::{Writer, WriterConfig};
