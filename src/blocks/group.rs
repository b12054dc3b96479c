// src/blocks/group.rs
//! A named collection of parameters and its on-disk group record.
//!
//! ```text
//! i8   chars in name (negative = locked)
//! i8   negated group id
//! ..   name bytes
//! i16  offset to next record (3 + description length)
//! u8   description length
//! ..   description bytes
//! ```
//!
//! The parameter records of the group follow the group record when the
//! directory is serialized.

use crate::{
    Error, Result,
    blocks::parameter::{ElementKind, MAX_DESC_LEN, MAX_NAME_LEN, ParamValue, Parameter},
};

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    name: String,
    desc: String,
    /// Locked groups are written with a negative name length.
    pub locked: bool,
    params: Vec<Parameter>,
}

impl Group {
    /// Creates an empty group. The name is upper-cased.
    pub fn new(name: &str, desc: &str) -> Result<Self> {
        let name = name.to_uppercase();
        validate_label(&name, desc)?;
        Ok(Self {
            name,
            desc: desc.to_string(),
            locked: false,
            params: Vec::new(),
        })
    }

    /// A group known only by id, before its group record has been seen.
    pub(crate) fn unnamed() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Sets name and description together; used when a group record resolves
    /// a group whose parameters arrived first.
    pub(crate) fn rename(&mut self, name: String, desc: String) {
        self.name = name;
        self.desc = desc;
    }

    /// Adds a parameter, replacing any existing one with the same name.
    ///
    /// Returns the replaced parameter.
    pub fn insert(&mut self, param: Parameter) -> Option<Parameter> {
        match self.position(param.name()) {
            Some(i) => Some(std::mem::replace(&mut self.params[i], param)),
            None => {
                self.params.push(param);
                None
            }
        }
    }

    /// Builds a parameter from raw fields and adds it to the group.
    pub fn add_param(
        &mut self,
        name: &str,
        desc: &str,
        bytes_per_element: i8,
        dimensions: Vec<u8>,
        data: Vec<u8>,
    ) -> Result<()> {
        self.insert(Parameter::new(
            name,
            desc,
            bytes_per_element,
            dimensions,
            data,
        )?);
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.position(name).map(|i| &self.params[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.position(name).map(|i| &mut self.params[i])
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.position(name).map(|i| self.params.remove(i))
    }

    /// Decodes a parameter of this group as `kind`.
    pub fn get_value(&self, name: &str, kind: ElementKind) -> Result<ParamValue> {
        self.get(name)
            .ok_or_else(|| Error::MissingParameter(format!("{}:{}", self.name, name.to_uppercase())))?
            .decode(kind)
    }

    /// Parameters in insertion order.
    pub fn params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Size of the group record plus all of its parameter records.
    pub fn binary_size(&self) -> usize {
        1 // chars in name
            + 1 // group id
            + self.name.len()
            + 2 // offset to next record
            + 1 + self.desc.len()
            + self.params.iter().map(Parameter::binary_size).sum::<usize>()
    }

    /// Serializes the group record followed by its parameter records.
    pub fn to_bytes(&self, id: u8) -> Result<Vec<u8>> {
        validate_label(&self.name, &self.desc)?;
        if id == 0 || id > i8::MAX as u8 {
            return Err(Error::BlockSerializationError(format!(
                "group id {id} is outside 1..=127"
            )));
        }

        let size = self.binary_size();
        let name_len = self.name.len() as i8;
        let name_len = if self.locked { -name_len } else { name_len };
        let offset = 3 + self.desc.len() as i16;

        let mut buffer = Vec::with_capacity(size);
        buffer.push(name_len as u8);
        buffer.push((-(id as i8)) as u8);
        buffer.extend_from_slice(self.name.as_bytes());
        buffer.extend_from_slice(&offset.to_le_bytes());
        buffer.push(self.desc.len() as u8);
        buffer.extend_from_slice(self.desc.as_bytes());
        for param in &self.params {
            buffer.extend_from_slice(&param.to_bytes(id)?);
        }

        if buffer.len() != size {
            return Err(Error::BlockSerializationError(format!(
                "group {}: emitted {} bytes but binary_size is {}",
                self.name,
                buffer.len(),
                size
            )));
        }
        Ok(buffer)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
    }
}

fn validate_label(name: &str, desc: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidParameter(format!(
            "group name {:?} must be 1..={} bytes",
            name, MAX_NAME_LEN
        )));
    }
    if desc.len() > MAX_DESC_LEN {
        return Err(Error::InvalidParameter(format!(
            "group {name}: description of {} bytes exceeds {}",
            desc.len(),
            MAX_DESC_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_by_name() {
        let mut group = Group::new("point", "3-D data").unwrap();
        assert_eq!(group.name(), "POINT");
        assert!(group.insert(Parameter::scalar_u16("USED", "", 1).unwrap()).is_none());
        let old = group.insert(Parameter::scalar_u16("used", "", 2).unwrap());
        assert_eq!(old.unwrap().as_u16().unwrap(), 1);
        assert_eq!(group.len(), 1);
        assert_eq!(group.get("Used").unwrap().as_u16().unwrap(), 2);
    }

    #[test]
    fn missing_parameter_is_reported_with_group() {
        let group = Group::new("ANALOG", "").unwrap();
        match group.get_value("RATE", ElementKind::Float32) {
            Err(Error::MissingParameter(key)) => assert_eq!(key, "ANALOG:RATE"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn record_size_includes_parameters() {
        let mut group = Group::new("POINT", "points").unwrap();
        group.add_param("RATE", "", 4, vec![], 100f32.to_le_bytes().to_vec()).unwrap();
        group.add_param("UNITS", "", -1, vec![2], b"mm".to_vec()).unwrap();

        let bytes = group.to_bytes(1).unwrap();
        assert_eq!(bytes.len(), group.binary_size());
        assert_eq!(bytes[0], 5);
        assert_eq!(bytes[1] as i8, -1);
        assert_eq!(&bytes[2..7], b"POINT");
        assert_eq!(i16::from_le_bytes([bytes[7], bytes[8]]), 3 + 6);
        assert_eq!(bytes[9], 6);
        // first parameter record starts right after the description
        assert_eq!(bytes[16], 4);
        assert_eq!(bytes[17], 1);
    }

    #[test]
    fn id_must_fit_a_signed_byte() {
        let group = Group::new("X", "").unwrap();
        assert!(group.to_bytes(0).is_err());
        assert!(group.to_bytes(128).is_err());
        assert!(group.to_bytes(127).is_ok());
    }
}
