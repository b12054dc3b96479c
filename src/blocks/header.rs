// src/blocks/header.rs
use crate::{
    Error, Result,
    blocks::common::{C3D_MAGIC, HEADER_SIZE, read_f32, read_u16, validate_buffer_size},
};
use core::fmt;

/// Sentinel stored in the header when long (4-character) event labels are used.
pub const LONG_EVENT_LABELS_MAGIC: u16 = 0x3039;

/// The fixed 512-byte record at the start of every C3D file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub parameter_block: u8,     // byte[0], byte[1] is the magic value
    pub point_count: u16,        // bytes[2..4]
    pub analog_count: u16,       // bytes[4..6]
    pub first_frame: u16,        // bytes[6..8]
    pub last_frame: u16,         // bytes[8..10]
    pub max_gap: u16,            // bytes[10..12]
    pub scale_factor: f32,       // bytes[12..16]
    pub data_block: u16,         // bytes[16..18]
    pub analog_per_frame: u16,   // bytes[18..20]
    pub frame_rate: f32,         // bytes[20..24], then 270 reserved bytes
    pub long_event_labels: bool, // bytes[294..296]
    pub label_block: u16,        // bytes[296..298], then 214 reserved bytes
}

impl Header {
    /// Parses a header from the first 512 bytes of `bytes`.
    ///
    /// # Errors
    /// [`Error::TooShortBuffer`] when fewer than 512 bytes are supplied and
    /// [`Error::InvalidMagic`] when byte 1 is not 80.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        validate_buffer_size(bytes, HEADER_SIZE)?;

        let magic = bytes[1];
        if magic != C3D_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        Ok(Self {
            parameter_block: bytes[0],
            point_count: read_u16(bytes, 2),
            analog_count: read_u16(bytes, 4),
            first_frame: read_u16(bytes, 6),
            last_frame: read_u16(bytes, 8),
            max_gap: read_u16(bytes, 10),
            scale_factor: read_f32(bytes, 12),
            data_block: read_u16(bytes, 16),
            analog_per_frame: read_u16(bytes, 18),
            frame_rate: read_f32(bytes, 20),
            long_event_labels: read_u16(bytes, 294) == LONG_EVENT_LABELS_MAGIC,
            label_block: read_u16(bytes, 296),
        })
    }

    /// Serializes the header to exactly 512 bytes.
    ///
    /// # Structure
    /// - 24 bytes of capture parameters (block pointers, counts, frame range,
    ///   scale factor, frame rate)
    /// - 270 reserved bytes, zero filled
    /// - long event label sentinel and label block pointer (4 bytes)
    /// - 214 reserved bytes, zero filled
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(HEADER_SIZE);

        buffer.push(self.parameter_block);
        buffer.push(C3D_MAGIC);
        buffer.extend_from_slice(&self.point_count.to_le_bytes());
        buffer.extend_from_slice(&self.analog_count.to_le_bytes());
        buffer.extend_from_slice(&self.first_frame.to_le_bytes());
        buffer.extend_from_slice(&self.last_frame.to_le_bytes());
        buffer.extend_from_slice(&self.max_gap.to_le_bytes());
        buffer.extend_from_slice(&self.scale_factor.to_le_bytes());
        buffer.extend_from_slice(&self.data_block.to_le_bytes());
        buffer.extend_from_slice(&self.analog_per_frame.to_le_bytes());
        buffer.extend_from_slice(&self.frame_rate.to_le_bytes());

        buffer.resize(buffer.len() + 270, 0);

        let long_labels = if self.long_event_labels {
            LONG_EVENT_LABELS_MAGIC
        } else {
            0
        };
        buffer.extend_from_slice(&long_labels.to_le_bytes());
        buffer.extend_from_slice(&self.label_block.to_le_bytes());

        buffer.resize(buffer.len() + 214, 0);

        if buffer.len() != HEADER_SIZE {
            return Err(Error::BlockSerializationError(format!(
                "Header must be exactly {} bytes, got {}",
                HEADER_SIZE,
                buffer.len()
            )));
        }

        Ok(buffer)
    }
}

impl Default for Header {
    fn default() -> Self {
        Header {
            parameter_block: 2,
            point_count: 0,
            analog_count: 0,
            first_frame: 1,
            last_frame: 1,
            max_gap: 0,
            scale_factor: -1.0,
            data_block: 3,
            analog_per_frame: 0,
            frame_rate: 60.0,
            long_event_labels: false,
            label_block: 0,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  parameter_block: {}", self.parameter_block)?;
        writeln!(f, "      point_count: {}", self.point_count)?;
        writeln!(f, "     analog_count: {}", self.analog_count)?;
        writeln!(f, "      first_frame: {}", self.first_frame)?;
        writeln!(f, "       last_frame: {}", self.last_frame)?;
        writeln!(f, "          max_gap: {}", self.max_gap)?;
        writeln!(f, "     scale_factor: {}", self.scale_factor)?;
        writeln!(f, "       data_block: {}", self.data_block)?;
        writeln!(f, " analog_per_frame: {}", self.analog_per_frame)?;
        writeln!(f, "       frame_rate: {}", self.frame_rate)?;
        writeln!(f, "long_event_labels: {}", self.long_event_labels)?;
        write!(f, "      label_block: {}", self.label_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets() {
        let header = Header {
            parameter_block: 2,
            point_count: 0x0102,
            analog_count: 6,
            first_frame: 1,
            last_frame: 300,
            max_gap: 10,
            scale_factor: -0.5,
            data_block: 11,
            analog_per_frame: 3,
            frame_rate: 120.0,
            long_event_labels: true,
            label_block: 7,
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), 512);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 80);
        assert_eq!(&bytes[2..4], &[0x02, 0x01]);
        assert_eq!(&bytes[12..16], &(-0.5f32).to_le_bytes());
        assert_eq!(&bytes[20..24], &120.0f32.to_le_bytes());
        assert!(bytes[24..294].iter().all(|&b| b == 0));
        assert_eq!(&bytes[294..296], &[0x39, 0x30]);
        assert_eq!(&bytes[296..298], &[7, 0]);
        assert!(bytes[298..].iter().all(|&b| b == 0));

        assert_eq!(Header::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn any_nonzero_label_word_other_than_sentinel_is_off() {
        let mut bytes = Header::default().to_bytes().unwrap();
        bytes[294] = 1;
        assert!(!Header::from_bytes(&bytes).unwrap().long_event_labels);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let bytes = [2u8, 80, 0, 0];
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(Error::TooShortBuffer { expected: 512, .. })
        ));
    }
}
