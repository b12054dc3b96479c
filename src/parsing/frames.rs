//! Frame layout and the per-frame point/analog codec.
//!
//! A frame on disk is `point_count` groups of four values (x, y, z, and a
//! packed residual/camera word) followed by `analog_count` analog samples in
//! sample-major order. Values are `f32` when `POINT:SCALE` is negative and
//! 16-bit integers otherwise.

use crate::{Error, Result, directory::Directory};
use ndarray::{Array2, ArrayView2};

/// Storage type of analog samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnalogFormat {
    Float32,
    Int16,
    UInt16,
}

/// Everything needed to decode or encode frames, resolved once from the
/// parameter directory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameLayout {
    pub point_count: usize,
    pub analog_channels: usize,
    /// Analog samples per channel in one point frame.
    pub analog_samples: usize,
    /// True when `POINT:SCALE < 0`; all values are then stored as `f32`.
    pub float_storage: bool,
    /// `|POINT:SCALE|`
    pub point_scale: f64,
    pub analog_format: AnalogFormat,
    pub analog_offsets: Vec<f64>,
    pub analog_scales: Vec<f64>,
    pub analog_gen_scale: f64,
}

impl FrameLayout {
    /// Resolves the layout from `POINT:SCALE`, the header counts and the
    /// ANALOG group.
    ///
    /// `analog_count` must be a whole multiple of `ANALOG:USED`, otherwise
    /// this fails with [`Error::InconsistentMetadata`].
    pub fn from_directory(directory: &Directory) -> Result<Self> {
        let header = directory.header();
        let scale = directory.point_scale()?;
        let float_storage = scale < 0.0;

        let analog_count = header.analog_count as usize;
        let analog_channels = directory.analog_used()? as usize;
        let analog_samples = if analog_channels == 0 {
            0
        } else {
            analog_count / analog_channels
        };
        if analog_channels * analog_samples != analog_count {
            return Err(Error::InconsistentMetadata {
                field: "ANALOG:USED",
                header: format!("analog_count {analog_count}"),
                parameter: format!("{analog_channels} channels"),
            });
        }

        let unsigned = match directory.get("ANALOG:FORMAT") {
            Some(p) => p.as_string()?.trim().eq_ignore_ascii_case("UNSIGNED"),
            None => false,
        };
        let analog_format = match (float_storage, unsigned) {
            (true, _) => AnalogFormat::Float32,
            (false, true) => AnalogFormat::UInt16,
            (false, false) => AnalogFormat::Int16,
        };

        let mut analog_offsets = match directory.get("ANALOG:OFFSET") {
            Some(p) if p.dimensions().is_empty() => vec![p.as_i16()? as f64],
            Some(p) => p.as_i16_array()?.into_iter().map(f64::from).collect(),
            None => Vec::new(),
        };
        analog_offsets.resize(analog_channels, 0.0);

        let mut analog_scales = match directory.get("ANALOG:SCALE") {
            Some(p) if p.dimensions().is_empty() => vec![p.as_f32()? as f64],
            Some(p) => p.as_f32_array()?.into_iter().map(f64::from).collect(),
            None => Vec::new(),
        };
        analog_scales.resize(analog_channels, 1.0);

        let analog_gen_scale = match directory.get("ANALOG:GEN_SCALE") {
            Some(p) => p.as_f32()? as f64,
            None => 1.0,
        };

        Ok(Self {
            point_count: header.point_count as usize,
            analog_channels,
            analog_samples,
            float_storage,
            point_scale: scale.abs() as f64,
            analog_format,
            analog_offsets,
            analog_scales,
            analog_gen_scale,
        })
    }

    /// Bytes per stored value, shared by points and analog samples.
    pub fn value_size(&self) -> usize {
        if self.float_storage { 4 } else { 2 }
    }

    /// Bytes occupied by one frame on disk.
    pub fn frame_size(&self) -> usize {
        (self.point_count * 4 + self.analog_channels * self.analog_samples) * self.value_size()
    }

    /// Factor applied to stored x/y/z: 1 for float storage, `|scale|` otherwise.
    pub fn point_multiplier(&self) -> f64 {
        if self.float_storage {
            1.0
        } else {
            self.point_scale
        }
    }

    /// A zeroed frame with this layout's shapes.
    pub fn empty_frame(&self, number: u32) -> Frame {
        Frame {
            number,
            points: Array2::zeros((self.point_count, 5)),
            analog: Array2::zeros((self.analog_channels, self.analog_samples)),
        }
    }

    /// Decodes one frame from `bytes` into `frame`, reusing its buffers.
    pub fn decode_into(&self, bytes: &[u8], frame: &mut Frame) -> Result<()> {
        if bytes.len() < self.frame_size() {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: self.frame_size(),
                file: file!(),
                line: line!(),
            });
        }
        if frame.points.dim() != (self.point_count, 5)
            || frame.analog.dim() != (self.analog_channels, self.analog_samples)
        {
            *frame = self.empty_frame(frame.number);
        }

        let width = self.value_size();
        let mut values = bytes.chunks_exact(width);
        let multiplier = self.point_multiplier();

        for mut row in frame.points.rows_mut() {
            let mut raw = [0f64; 4];
            for value in raw.iter_mut() {
                *value = self.read_point_value(values.next());
            }
            row[0] = raw[0] * multiplier;
            row[1] = raw[1] * multiplier;
            row[2] = raw[2] * multiplier;

            if raw[3] > -1.0 {
                // float words past 16 bits wrap instead of saturating
                let word = (raw[3] as i64 & 0xFFFF) as u16;
                row[3] = (word & 0xFF) as f64 * self.point_scale;
                row[4] = (word >> 8).count_ones() as f64;
            } else {
                row[3] = -1.0;
                row[4] = -1.0;
            }
        }

        for sample in 0..self.analog_samples {
            for channel in 0..self.analog_channels {
                let raw = self.read_analog_value(values.next());
                frame.analog[[channel, sample]] = (raw - self.analog_offsets[channel])
                    * self.analog_scales[channel]
                    * self.analog_gen_scale;
            }
        }
        Ok(())
    }

    /// Decodes one frame into a freshly allocated [`Frame`].
    pub fn decode(&self, number: u32, bytes: &[u8]) -> Result<Frame> {
        let mut frame = self.empty_frame(number);
        self.decode_into(bytes, &mut frame)?;
        Ok(frame)
    }

    /// Appends the on-disk form of one frame to `out`.
    ///
    /// `points` must be `(point_count, 5)` and `analog`
    /// `(analog_channels, analog_samples)`. A point is written as invalid when
    /// its residual or camera column is negative.
    ///
    /// In 16-bit storage a value that rounds outside the storage range fails
    /// with [`Error::InvalidFrame`]; `out` may then hold a partial frame.
    pub fn encode(
        &self,
        points: ArrayView2<'_, f64>,
        analog: ArrayView2<'_, f64>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if points.dim() != (self.point_count, 5) {
            return Err(Error::InvalidFrame(format!(
                "points must be {}x5, got {:?}",
                self.point_count,
                points.dim()
            )));
        }
        if analog.dim() != (self.analog_channels, self.analog_samples) {
            return Err(Error::InvalidFrame(format!(
                "analog must be {}x{}, got {:?}",
                self.analog_channels,
                self.analog_samples,
                analog.dim()
            )));
        }

        out.reserve(self.frame_size());
        let multiplier = self.point_multiplier();
        // a set sign bit would read back as invalid in 16-bit storage
        let max_cameras = if self.float_storage { 8.0 } else { 7.0 };

        for (index, row) in points.rows().into_iter().enumerate() {
            for &coordinate in row.iter().take(3) {
                self.write_point_value(coordinate / multiplier, out)
                    .ok_or_else(|| out_of_range(format!("point {index}"), coordinate))?;
            }
            let overflow = || out_of_range(format!("point {index}"), row[3]);
            if row[3] < 0.0 || row[4] < 0.0 {
                self.write_point_value(-1.0, out).ok_or_else(overflow)?;
                continue;
            }
            let residual = if self.point_scale > 0.0 {
                (row[3] / self.point_scale).round().clamp(0.0, 255.0) as u16
            } else {
                0
            };
            let cameras = row[4].round().clamp(0.0, max_cameras) as u32;
            let mask = (((1u32 << cameras) - 1) << 8) as u16;
            // at most 0x7FFF in 16-bit storage
            self.write_point_value(f64::from(mask | residual), out)
                .ok_or_else(overflow)?;
        }

        for sample in 0..self.analog_samples {
            for channel in 0..self.analog_channels {
                let factor = self.analog_scales[channel] * self.analog_gen_scale;
                let offset = self.analog_offsets[channel];
                let raw = if factor != 0.0 {
                    analog[[channel, sample]] / factor + offset
                } else {
                    offset
                };
                self.write_analog_value(raw, out).ok_or_else(|| {
                    out_of_range(
                        format!("analog channel {channel} sample {sample}"),
                        analog[[channel, sample]],
                    )
                })?;
            }
        }
        Ok(())
    }

    fn read_point_value(&self, bytes: Option<&[u8]>) -> f64 {
        match bytes {
            Some(&[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]) as f64,
            Some(&[a, b]) => i16::from_le_bytes([a, b]) as f64,
            _ => 0.0,
        }
    }

    fn read_analog_value(&self, bytes: Option<&[u8]>) -> f64 {
        match (self.analog_format, bytes) {
            (AnalogFormat::Float32, Some(&[a, b, c, d])) => f32::from_le_bytes([a, b, c, d]) as f64,
            (AnalogFormat::UInt16, Some(&[a, b])) => u16::from_le_bytes([a, b]) as f64,
            (AnalogFormat::Int16, Some(&[a, b])) => i16::from_le_bytes([a, b]) as f64,
            _ => 0.0,
        }
    }

    /// Appends one stored point value; `None` when it does not fit 16 bits.
    #[must_use]
    fn write_point_value(&self, value: f64, out: &mut Vec<u8>) -> Option<()> {
        if self.float_storage {
            out.extend_from_slice(&(value as f32).to_le_bytes());
        } else {
            let stored = stored_integer(value, i16::MIN.into(), i16::MAX.into())?;
            out.extend_from_slice(&(stored as i16).to_le_bytes());
        }
        Some(())
    }

    #[must_use]
    fn write_analog_value(&self, value: f64, out: &mut Vec<u8>) -> Option<()> {
        match self.analog_format {
            AnalogFormat::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            AnalogFormat::Int16 => {
                let stored = stored_integer(value, i16::MIN.into(), i16::MAX.into())?;
                out.extend_from_slice(&(stored as i16).to_le_bytes());
            }
            AnalogFormat::UInt16 => {
                let stored = stored_integer(value, 0, u16::MAX.into())?;
                out.extend_from_slice(&(stored as u16).to_le_bytes());
            }
        }
        Some(())
    }
}

/// Rounds `value` to an integer in `min..=max`; `None` outside it or for NaN.
fn stored_integer(value: f64, min: i64, max: i64) -> Option<i64> {
    let rounded = value.round();
    (rounded >= min as f64 && rounded <= max as f64).then_some(rounded as i64)
}

fn out_of_range(what: String, value: f64) -> Error {
    Error::InvalidFrame(format!("{what}: value {value} does not fit 16-bit storage"))
}

/// One decoded frame.
///
/// `points` has one row per point: x, y, z, residual estimate and camera
/// count, with the last two set to -1 for invalid points. `analog` is
/// `(channels, samples_per_frame)` in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub number: u32,
    pub points: Array2<f64>,
    pub analog: Array2<f64>,
}

impl Frame {
    pub fn new(number: u32, points: Array2<f64>, analog: Array2<f64>) -> Self {
        Self {
            number,
            points,
            analog,
        }
    }

    /// True when the point at `index` carries a residual and camera count.
    pub fn is_point_valid(&self, index: usize) -> bool {
        self.points.row(index)[3] >= 0.0
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>) {
        (self.points, self.analog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn layout(float_storage: bool, channels: usize, samples: usize) -> FrameLayout {
        FrameLayout {
            point_count: 2,
            analog_channels: channels,
            analog_samples: samples,
            float_storage,
            point_scale: if float_storage { 1.0 } else { 0.1 },
            analog_format: if float_storage {
                AnalogFormat::Float32
            } else {
                AnalogFormat::Int16
            },
            analog_offsets: vec![0.0; channels],
            analog_scales: vec![1.0; channels],
            analog_gen_scale: 1.0,
        }
    }

    fn i16s(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn int_storage_scales_and_unpacks_cameras() {
        let layout = layout(false, 0, 0);
        // cameras 0 and 2 saw the point, residual byte 20
        let word = (0b0000_0101 << 8) | 20;
        let bytes = i16s(&[10, -20, 30, word, 1, 2, 3, -1]);

        let frame = layout.decode(1, &bytes).unwrap();
        let p = frame.points.row(0);
        assert!((p[0] - 1.0).abs() < 1e-9);
        assert!((p[1] + 2.0).abs() < 1e-9);
        assert!((p[3] - 2.0).abs() < 1e-9);
        assert_eq!(p[4], 2.0);
        assert!(frame.is_point_valid(0));

        let q = frame.points.row(1);
        assert!((q[2] - 0.3).abs() < 1e-9);
        assert_eq!((q[3], q[4]), (-1.0, -1.0));
        assert!(!frame.is_point_valid(1));
    }

    #[test]
    fn zero_word_is_valid_with_no_cameras() {
        let layout = layout(false, 0, 0);
        let bytes = i16s(&[0, 0, 0, 0, 0, 0, 0, -2]);
        let frame = layout.decode(1, &bytes).unwrap();
        assert_eq!((frame.points[[0, 3]], frame.points[[0, 4]]), (0.0, 0.0));
        assert_eq!(frame.points[[1, 3]], -1.0);
    }

    #[test]
    fn analog_is_transposed_and_calibrated() {
        let mut layout = layout(false, 2, 3);
        layout.analog_offsets = vec![10.0, 0.0];
        layout.analog_scales = vec![0.5, 2.0];
        layout.analog_gen_scale = 2.0;
        let mut bytes = i16s(&[0, 0, 0, 0, 0, 0, 0, 0]);
        // sample-major: (c0, c1) per sample
        bytes.extend(i16s(&[12, 1, 14, 2, 16, 3]));

        let frame = layout.decode(7, &bytes).unwrap();
        assert_eq!(frame.number, 7);
        assert_eq!(frame.analog, array![[2.0, 4.0, 6.0], [4.0, 8.0, 12.0]]);
    }

    #[test]
    fn encode_inverts_decode() {
        let layout = layout(true, 1, 2);
        let points = array![[1.5, -2.0, 3.25, 2.0, 3.0], [4.0, 5.0, 6.0, -1.0, -1.0]];
        let analog = array![[0.25, -0.5]];

        let mut bytes = Vec::new();
        layout.encode(points.view(), analog.view(), &mut bytes).unwrap();
        assert_eq!(bytes.len(), layout.frame_size());

        let frame = layout.decode(1, &bytes).unwrap();
        assert_eq!(frame.points, points);
        assert_eq!(frame.analog, analog);
    }

    #[test]
    fn int_camera_count_stays_valid() {
        let layout = layout(false, 0, 0);
        let points = array![[0.0, 0.0, 0.0, 0.0, 8.0], [0.0, 0.0, 0.0, 0.0, 3.0]];
        let mut bytes = Vec::new();
        layout.encode(points.view(), Array2::zeros((0, 0)).view(), &mut bytes).unwrap();
        let frame = layout.decode(1, &bytes).unwrap();
        assert_eq!(frame.points[[0, 4]], 7.0);
        assert_eq!(frame.points[[1, 4]], 3.0);
    }

    #[test]
    fn int_storage_rejects_values_outside_16_bits() {
        let layout = layout(false, 1, 1);
        let fine = array![[3276.7, -3276.8, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 0.0, 0.0]];
        let mut out = Vec::new();
        layout.encode(fine.view(), array![[-32768.0]].view(), &mut out).unwrap();

        let wide = array![[5000.0, -7000.0, 1.0, 0.0, 1.0], [0.0, 0.0, 0.0, 0.0, 0.0]];
        let err = layout
            .encode(wide.view(), array![[0.0]].view(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(ref msg) if msg.contains("point 0")));

        let err = layout
            .encode(fine.view(), array![[40000.0]].view(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(ref msg) if msg.contains("channel 0")));
    }

    #[test]
    fn unsigned_analog_rejects_negative_raw_values() {
        let mut layout = layout(false, 1, 1);
        layout.analog_format = AnalogFormat::UInt16;
        let points = Array2::<f64>::zeros((2, 5));
        let mut out = Vec::new();
        layout.encode(points.view(), array![[65535.0]].view(), &mut out).unwrap();
        assert!(layout
            .encode(points.view(), array![[-1.0]].view(), &mut Vec::new())
            .is_err());
    }

    #[test]
    fn wide_float_words_wrap_to_16_bits() {
        let layout = layout(true, 0, 0);
        // 0x1_0305: residual byte 5, camera bits 0b11
        let values = [0.0f32, 0.0, 0.0, 66_309.0, 0.0, 0.0, 0.0, 0.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let frame = layout.decode(1, &bytes).unwrap();
        assert_eq!(frame.points[[0, 3]], 5.0);
        assert_eq!(frame.points[[0, 4]], 2.0);
    }

    #[test]
    fn encode_checks_shapes() {
        let layout = layout(true, 1, 2);
        let mut out = Vec::new();
        let err = layout
            .encode(Array2::zeros((3, 5)).view(), Array2::zeros((1, 2)).view(), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(_)));
        assert!(out.is_empty());
    }
}
