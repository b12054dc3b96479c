// src/blocks/parameter.rs
//! A single named, typed parameter value and its on-disk record.
//!
//! # Record layout
//!
//! ```text
//! i8   chars in name (negative = locked)
//! i8   owning group id (positive)
//! ..   name bytes
//! i16  offset to next record, counted from the start of this field
//! i8   bytes per element (1, 2, 4, or -1 for character data)
//! u8   dimension count
//! ..   dimensions (u8 each, column-major)
//! ..   payload: product(dimensions) * |bytes per element|
//! u8   description length
//! ..   description bytes
//! ```

use crate::{
    Error, Result,
    blocks::common::{ByteCursor, lossy_text},
};
use core::fmt;

/// Longest name that fits the signed length byte of a record.
pub const MAX_NAME_LEN: usize = 127;

/// Longest description that fits its unsigned length byte.
pub const MAX_DESC_LEN: usize = 255;

/// Element interpretations understood by [`Parameter::decode`] and
/// [`Parameter::decode_array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Bytes,
    Utf8,
    Utf8Array,
}

impl ElementKind {
    /// Width of one numeric element in bytes, `None` for byte and text kinds.
    pub fn width(&self) -> Option<usize> {
        match self {
            ElementKind::Int8 | ElementKind::UInt8 => Some(1),
            ElementKind::Int16 | ElementKind::UInt16 => Some(2),
            ElementKind::Int32 | ElementKind::UInt32 | ElementKind::Float32 => Some(4),
            ElementKind::Bytes | ElementKind::Utf8 | ElementKind::Utf8Array => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Int8 => write!(f, "int8"),
            ElementKind::UInt8 => write!(f, "uint8"),
            ElementKind::Int16 => write!(f, "int16"),
            ElementKind::UInt16 => write!(f, "uint16"),
            ElementKind::Int32 => write!(f, "int32"),
            ElementKind::UInt32 => write!(f, "uint32"),
            ElementKind::Float32 => write!(f, "float32"),
            ElementKind::Bytes => write!(f, "bytes"),
            ElementKind::Utf8 => write!(f, "utf-8 string"),
            ElementKind::Utf8Array => write!(f, "utf-8 string array"),
        }
    }
}

/// A single value decoded from a parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    /// The raw payload
    Bytes(Vec<u8>),
    /// The whole payload as one string
    Utf8(String),
    /// Fixed-width strings, one per column of a 2-D character array
    Utf8Array(Vec<String>),
}

impl ParamValue {
    /// Attempts to convert to f64, useful for numeric comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int8(v) => Some(*v as f64),
            ParamValue::UInt8(v) => Some(*v as f64),
            ParamValue::Int16(v) => Some(*v as f64),
            ParamValue::UInt16(v) => Some(*v as f64),
            ParamValue::Int32(v) => Some(*v as f64),
            ParamValue::UInt32(v) => Some(*v as f64),
            ParamValue::Float32(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// All elements of an array parameter, in storage order.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamArray {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Bytes(Vec<Vec<u8>>),
    Utf8(Vec<String>),
}

impl ParamArray {
    /// Number of elements (or strings) in the array.
    pub fn len(&self) -> usize {
        match self {
            ParamArray::Int8(v) => v.len(),
            ParamArray::UInt8(v) => v.len(),
            ParamArray::Int16(v) => v.len(),
            ParamArray::UInt16(v) => v.len(),
            ParamArray::Int32(v) => v.len(),
            ParamArray::UInt32(v) => v.len(),
            ParamArray::Float32(v) => v.len(),
            ParamArray::Bytes(v) => v.len(),
            ParamArray::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named, typed, possibly multi-dimensional metadata value.
///
/// The payload length always equals `product(dimensions) * |bytes_per_element|`
/// (a scalar has no dimensions and occupies one element).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameter {
    name: String,
    desc: String,
    bytes_per_element: i8,
    dimensions: Vec<u8>,
    data: Vec<u8>,
    /// Locked entries are written with a negative name length.
    pub locked: bool,
}

impl Parameter {
    /// Creates a parameter from raw fields.
    ///
    /// The name is upper-cased. Fails with [`Error::InvalidParameter`] when the
    /// element size is not 1, 2, 4 or -1, when the name or description does
    /// not fit its length byte, or when `data` does not match the dimensions.
    pub fn new(
        name: &str,
        desc: &str,
        bytes_per_element: i8,
        dimensions: Vec<u8>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let name = name.to_uppercase();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidParameter(format!(
                "name {:?} must be 1..={} bytes",
                name, MAX_NAME_LEN
            )));
        }
        if desc.len() > MAX_DESC_LEN {
            return Err(Error::InvalidParameter(format!(
                "{}: description of {} bytes exceeds {}",
                name,
                desc.len(),
                MAX_DESC_LEN
            )));
        }
        if !matches!(bytes_per_element, -1 | 1 | 2 | 4) {
            return Err(Error::InvalidParameter(format!(
                "{}: unsupported element size {}",
                name, bytes_per_element
            )));
        }
        if dimensions.len() > u8::MAX as usize {
            return Err(Error::InvalidParameter(format!(
                "{}: {} dimensions exceed 255",
                name,
                dimensions.len()
            )));
        }
        let expected = payload_len(bytes_per_element, &dimensions);
        if data.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "{}: dimensions {:?} need {} bytes, got {}",
                name,
                dimensions,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            name,
            desc: desc.to_string(),
            bytes_per_element,
            dimensions,
            data,
            locked: false,
        })
    }

    pub fn scalar_u8(name: &str, desc: &str, value: u8) -> Result<Self> {
        Self::new(name, desc, 1, Vec::new(), vec![value])
    }

    pub fn scalar_i16(name: &str, desc: &str, value: i16) -> Result<Self> {
        Self::new(name, desc, 2, Vec::new(), value.to_le_bytes().to_vec())
    }

    pub fn scalar_u16(name: &str, desc: &str, value: u16) -> Result<Self> {
        Self::new(name, desc, 2, Vec::new(), value.to_le_bytes().to_vec())
    }

    pub fn scalar_i32(name: &str, desc: &str, value: i32) -> Result<Self> {
        Self::new(name, desc, 4, Vec::new(), value.to_le_bytes().to_vec())
    }

    pub fn scalar_f32(name: &str, desc: &str, value: f32) -> Result<Self> {
        Self::new(name, desc, 4, Vec::new(), value.to_le_bytes().to_vec())
    }

    /// A 32-bit value stored as two 16-bit words, the layout used for
    /// frame numbers beyond the 16-bit header range.
    pub fn word_pair(name: &str, desc: &str, value: u32) -> Result<Self> {
        Self::new(name, desc, 2, vec![2], value.to_le_bytes().to_vec())
    }

    pub fn i16_array(name: &str, desc: &str, values: &[i16]) -> Result<Self> {
        let dims = vec![dimension(name, values.len())?];
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(name, desc, 2, dims, data)
    }

    pub fn f32_array(name: &str, desc: &str, values: &[f32]) -> Result<Self> {
        let dims = vec![dimension(name, values.len())?];
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(name, desc, 4, dims, data)
    }

    /// An array with a single zero-length dimension.
    pub fn empty_array(name: &str, desc: &str, bytes_per_element: i8) -> Result<Self> {
        Self::new(name, desc, bytes_per_element, vec![0], Vec::new())
    }

    /// Character data stored as a 1-D array of bytes.
    pub fn text(name: &str, desc: &str, value: &str) -> Result<Self> {
        let dims = vec![dimension(name, value.len())?];
        Self::new(name, desc, -1, dims, value.as_bytes().to_vec())
    }

    /// Fixed-width strings stored as a 2-D `[width, count]` character array.
    ///
    /// Every string is right-padded with spaces to the longest one.
    pub fn strings<S: AsRef<str>>(name: &str, desc: &str, values: &[S]) -> Result<Self> {
        let width = values
            .iter()
            .map(|s| s.as_ref().len())
            .max()
            .unwrap_or(0)
            .max(1);
        let dims = vec![dimension(name, width)?, dimension(name, values.len())?];
        let mut data = Vec::with_capacity(width * values.len());
        for value in values {
            let bytes = value.as_ref().as_bytes();
            data.extend_from_slice(bytes);
            data.resize(data.len() + width - bytes.len(), b' ');
        }
        Self::new(name, desc, -1, dims, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn bytes_per_element(&self) -> i8 {
        self.bytes_per_element
    }

    pub fn dimensions(&self) -> &[u8] {
        &self.dimensions
    }

    /// The raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements described by the dimensions (1 for a scalar).
    pub fn num_elements(&self) -> usize {
        self.dimensions.iter().map(|&d| d as usize).product()
    }

    /// Replaces the payload of a scalar or array, keeping its shape.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        let expected = payload_len(self.bytes_per_element, &self.dimensions);
        if data.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "{}: payload must be {} bytes, got {}",
                self.name,
                expected,
                data.len()
            )));
        }
        self.data = data;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------------

    /// Decodes the payload as a single value of the given kind.
    ///
    /// Numeric kinds read the first element. `Bytes` returns the raw payload,
    /// `Utf8` decodes the whole payload, and `Utf8Array` splits a 2-D
    /// character array into its strings.
    pub fn decode(&self, kind: ElementKind) -> Result<ParamValue> {
        Ok(match kind {
            ElementKind::Int8 => ParamValue::Int8(i8::from_le_bytes(self.first(kind)?)),
            ElementKind::UInt8 => ParamValue::UInt8(u8::from_le_bytes(self.first(kind)?)),
            ElementKind::Int16 => ParamValue::Int16(i16::from_le_bytes(self.first(kind)?)),
            ElementKind::UInt16 => ParamValue::UInt16(u16::from_le_bytes(self.first(kind)?)),
            ElementKind::Int32 => ParamValue::Int32(i32::from_le_bytes(self.first(kind)?)),
            ElementKind::UInt32 => ParamValue::UInt32(u32::from_le_bytes(self.first(kind)?)),
            ElementKind::Float32 => ParamValue::Float32(f32::from_le_bytes(self.first(kind)?)),
            ElementKind::Bytes => ParamValue::Bytes(self.data.clone()),
            ElementKind::Utf8 => ParamValue::Utf8(self.utf8(&self.data)?),
            ElementKind::Utf8Array => ParamValue::Utf8Array(self.string_columns()?),
        })
    }

    /// Decodes every element of an array parameter.
    ///
    /// Scalars are rejected. `Bytes`, `Utf8` and `Utf8Array` require exactly
    /// two dimensions `[width, count]`.
    pub fn decode_array(&self, kind: ElementKind) -> Result<ParamArray> {
        if self.dimensions.is_empty() {
            return Err(self.access_error(format!("cannot read a scalar as a {kind} array")));
        }
        Ok(match kind {
            ElementKind::Int8 => ParamArray::Int8(self.elements(kind, i8::from_le_bytes)?),
            ElementKind::UInt8 => ParamArray::UInt8(self.elements(kind, u8::from_le_bytes)?),
            ElementKind::Int16 => ParamArray::Int16(self.elements(kind, i16::from_le_bytes)?),
            ElementKind::UInt16 => ParamArray::UInt16(self.elements(kind, u16::from_le_bytes)?),
            ElementKind::Int32 => ParamArray::Int32(self.elements(kind, i32::from_le_bytes)?),
            ElementKind::UInt32 => ParamArray::UInt32(self.elements(kind, u32::from_le_bytes)?),
            ElementKind::Float32 => {
                ParamArray::Float32(self.elements(kind, f32::from_le_bytes)?)
            }
            ElementKind::Bytes => {
                ParamArray::Bytes(self.columns()?.into_iter().map(<[u8]>::to_vec).collect())
            }
            ElementKind::Utf8 | ElementKind::Utf8Array => ParamArray::Utf8(self.string_columns()?),
        })
    }

    pub fn as_i8(&self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.first(ElementKind::Int8)?))
    }

    pub fn as_u8(&self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.first(ElementKind::UInt8)?))
    }

    pub fn as_i16(&self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.first(ElementKind::Int16)?))
    }

    pub fn as_u16(&self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.first(ElementKind::UInt16)?))
    }

    pub fn as_i32(&self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.first(ElementKind::Int32)?))
    }

    pub fn as_u32(&self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.first(ElementKind::UInt32)?))
    }

    pub fn as_f32(&self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.first(ElementKind::Float32)?))
    }

    pub fn as_string(&self) -> Result<String> {
        self.utf8(&self.data)
    }

    pub fn as_strings(&self) -> Result<Vec<String>> {
        self.string_columns()
    }

    pub fn as_i16_array(&self) -> Result<Vec<i16>> {
        match self.decode_array(ElementKind::Int16)? {
            ParamArray::Int16(v) => Ok(v),
            _ => unreachable!("decode_array returns the requested kind"),
        }
    }

    pub fn as_f32_array(&self) -> Result<Vec<f32>> {
        match self.decode_array(ElementKind::Float32)? {
            ParamArray::Float32(v) => Ok(v),
            _ => unreachable!("decode_array returns the requested kind"),
        }
    }

    fn first<const N: usize>(&self, kind: ElementKind) -> Result<[u8; N]> {
        match self.data.get(..N) {
            Some(bytes) => {
                let mut out = [0u8; N];
                out.copy_from_slice(bytes);
                Ok(out)
            }
            None => Err(self.access_error(format!(
                "{} byte payload is too short for {kind}",
                self.data.len()
            ))),
        }
    }

    fn elements<const N: usize, T>(
        &self,
        kind: ElementKind,
        convert: fn([u8; N]) -> T,
    ) -> Result<Vec<T>> {
        if self.data.len() % N != 0 {
            return Err(self.access_error(format!(
                "{} byte payload is not a whole number of {kind} elements",
                self.data.len()
            )));
        }
        Ok(self
            .data
            .chunks_exact(N)
            .map(|chunk| {
                let mut word = [0u8; N];
                word.copy_from_slice(chunk);
                convert(word)
            })
            .collect())
    }

    fn columns(&self) -> Result<Vec<&[u8]>> {
        let [width, count] = self.dimensions[..] else {
            return Err(self.access_error(format!(
                "byte and string arrays need 2 dimensions, found {}",
                self.dimensions.len()
            )));
        };
        let (width, count) = (width as usize, count as usize);
        Ok((0..count)
            .map(|i| &self.data[i * width..(i + 1) * width])
            .collect())
    }

    fn string_columns(&self) -> Result<Vec<String>> {
        self.columns()?
            .into_iter()
            .map(|column| self.utf8(column))
            .collect()
    }

    fn utf8(&self, bytes: &[u8]) -> Result<String> {
        core::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| self.access_error(format!("invalid UTF-8: {e}")))
    }

    fn access_error(&self, reason: String) -> Error {
        Error::ValueAccess {
            name: self.name.clone(),
            reason,
        }
    }

    // ------------------------------------------------------------------------
    // Record codec
    // ------------------------------------------------------------------------

    /// Number of bytes [`Parameter::to_bytes`] emits for this parameter.
    pub fn binary_size(&self) -> usize {
        1 // chars in name
            + 1 // group id
            + self.name.len()
            + 2 // offset to next record
            + 1 // bytes per element
            + 1 + self.dimensions.len()
            + self.data.len()
            + 1 + self.desc.len()
    }

    /// Serializes the parameter record owned by `group_id`.
    pub fn to_bytes(&self, group_id: u8) -> Result<Vec<u8>> {
        let size = self.binary_size();
        let offset = i16::try_from(size - 2 - self.name.len()).map_err(|_| {
            Error::BlockSerializationError(format!(
                "{}: record of {} bytes does not fit a 16-bit offset",
                self.name, size
            ))
        })?;
        let name_len = self.name.len() as i8;
        let name_len = if self.locked { -name_len } else { name_len };

        let mut buffer = Vec::with_capacity(size);
        buffer.push(name_len as u8);
        buffer.push(group_id);
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.extend_from_slice(&offset.to_le_bytes());
        buffer.push(self.bytes_per_element as u8);
        buffer.push(self.dimensions.len() as u8);
        buffer.extend_from_slice(&self.dimensions);
        buffer.extend_from_slice(&self.data);
        buffer.push(self.desc.len() as u8);
        buffer.extend_from_slice(self.desc.as_bytes());

        if buffer.len() != size {
            return Err(Error::BlockSerializationError(format!(
                "{}: emitted {} bytes but binary_size is {}",
                self.name,
                buffer.len(),
                size
            )));
        }
        Ok(buffer)
    }

    /// Parses a parameter body, the part following the offset-to-next field.
    pub(crate) fn read_body(name: String, locked: bool, body: &mut ByteCursor<'_>) -> Result<Self> {
        let bytes_per_element = body.i8()?;
        let dim_count = body.u8()? as usize;
        let dimensions = body.take(dim_count)?.to_vec();
        let data = body
            .take(payload_len(bytes_per_element, &dimensions))?
            .to_vec();
        let desc_len = body.u8()? as usize;
        let desc = lossy_text(body.take(desc_len)?);

        Ok(Self {
            name,
            desc,
            bytes_per_element,
            dimensions,
            data,
            locked,
        })
    }
}

fn payload_len(bytes_per_element: i8, dimensions: &[u8]) -> usize {
    let elements: usize = dimensions.iter().map(|&d| d as usize).product();
    elements * bytes_per_element.unsigned_abs() as usize
}

fn dimension(name: &str, len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| {
        Error::InvalidParameter(format!("{name}: dimension {len} exceeds 255"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_payload_is_one_element() {
        let p = Parameter::scalar_f32("rate", "", 100.0).unwrap();
        assert_eq!(p.name(), "RATE");
        assert!(p.dimensions().is_empty());
        assert_eq!(p.data().len(), 4);
        assert_eq!(p.num_elements(), 1);
        assert_eq!(p.decode(ElementKind::Float32).unwrap(), ParamValue::Float32(100.0));
    }

    #[test]
    fn payload_must_match_dimensions() {
        let err = Parameter::new("X", "", 2, vec![3], vec![0; 4]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        let err = Parameter::new("X", "", 3, vec![], vec![0; 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn scalar_rejects_array_access() {
        let p = Parameter::scalar_u16("USED", "", 2).unwrap();
        let err = p.decode_array(ElementKind::UInt16).unwrap_err();
        assert!(matches!(err, Error::ValueAccess { .. }));
    }

    #[test]
    fn string_array_needs_two_dimensions() {
        let p = Parameter::text("UNITS", "", "mm").unwrap();
        assert_eq!(p.as_string().unwrap(), "mm");
        assert!(matches!(p.as_strings(), Err(Error::ValueAccess { .. })));
        assert!(matches!(
            p.decode_array(ElementKind::Bytes),
            Err(Error::ValueAccess { .. })
        ));
    }

    #[test]
    fn strings_are_space_padded_columns() {
        let p = Parameter::strings("LABELS", "", &["LASI", "RASIS", "C7"]).unwrap();
        assert_eq!(p.dimensions(), &[5, 3]);
        assert_eq!(p.data(), b"LASI RASISC7   ");
        assert_eq!(
            p.decode(ElementKind::Utf8Array).unwrap(),
            ParamValue::Utf8Array(vec!["LASI ".into(), "RASIS".into(), "C7   ".into()])
        );
        assert_eq!(
            p.decode_array(ElementKind::Bytes).unwrap(),
            ParamArray::Bytes(vec![b"LASI ".to_vec(), b"RASIS".to_vec(), b"C7   ".to_vec()])
        );
    }

    #[test]
    fn numeric_reinterpretation() {
        let p = Parameter::i16_array("OFFSET", "", &[-1, 2048]).unwrap();
        assert_eq!(p.as_i16_array().unwrap(), vec![-1, 2048]);
        assert_eq!(
            p.decode_array(ElementKind::UInt16).unwrap(),
            ParamArray::UInt16(vec![0xFFFF, 2048])
        );
        assert_eq!(p.decode(ElementKind::Int32).unwrap().as_f64(), Some(134_283_263.0));
        assert!(p.decode_array(ElementKind::Float32).unwrap().len() == 1);
    }

    #[test]
    fn word_pair_reads_as_int32() {
        let p = Parameter::word_pair("ACTUAL_END_FIELD", "", 70_000).unwrap();
        assert_eq!(p.dimensions(), &[2]);
        assert_eq!(p.as_i32().unwrap(), 70_000);
    }

    #[test]
    fn binary_size_matches_record() {
        let mut p = Parameter::strings("LABELS", "marker labels", &["A", "BB"]).unwrap();
        p.locked = true;
        let bytes = p.to_bytes(1).unwrap();
        assert_eq!(bytes.len(), p.binary_size());
        assert_eq!(bytes[0] as i8, -6);
        assert_eq!(bytes[1], 1);
        let offset = i16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!(offset, p.binary_size() - 2 - 6);

        let mut body = ByteCursor::new(&bytes[10..]);
        let parsed = Parameter::read_body("LABELS".into(), true, &mut body).unwrap();
        assert_eq!(parsed, p);
        assert_eq!(body.remaining(), 0);
    }

    #[test]
    fn truncated_body_is_a_short_buffer() {
        let p = Parameter::f32_array("SCALE", "", &[1.0, 2.0]).unwrap();
        let bytes = p.to_bytes(2).unwrap();
        let mut body = ByteCursor::new(&bytes[9..bytes.len() - 3]);
        assert!(matches!(
            Parameter::read_body("SCALE".into(), false, &mut body),
            Err(Error::TooShortBuffer { .. })
        ));
    }
}
