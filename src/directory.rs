//! The parameter directory: the header plus every parameter group of a file.
//!
//! Groups are keyed twice, by numeric id (the order they are written in) and
//! by upper-cased name. Parameters are addressed as `"GROUP:PARAM"` or
//! `"GROUP.PARAM"`, case-insensitively.

use crate::{
    Error, Result, Warning,
    blocks::{
        BLOCK_SIZE, ElementKind, Group, Header, PROCESSOR_INTEL, ParamValue, Parameter,
        common::{PARAMETER_PREAMBLE_SIZE, blocks_for},
    },
};
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// Optional parameters whose absence is reported as a [`Warning`].
const RECOMMENDED: [&str; 4] = [
    "POINT:LABELS",
    "POINT:DESCRIPTIONS",
    "ANALOG:LABELS",
    "ANALOG:DESCRIPTIONS",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    header: Header,
    groups: BTreeMap<u8, Group>,
    names: HashMap<String, u8>,
}

impl Directory {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            groups: BTreeMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Registers an empty group under `id`.
    ///
    /// Fails with [`Error::DuplicateGroup`] when the id or the (upper-cased)
    /// name is already taken.
    pub fn add_group(&mut self, id: u8, name: &str, desc: &str) -> Result<&mut Group> {
        let group = Group::new(name, desc)?;
        self.insert_group(id, group)
    }

    /// Registers a fully built group. Unnamed groups are reachable by id only.
    pub(crate) fn insert_group(&mut self, id: u8, group: Group) -> Result<&mut Group> {
        if id == 0 || id > i8::MAX as u8 {
            return Err(Error::InvalidParameter(format!(
                "group id {id} is outside 1..=127"
            )));
        }
        if self.groups.contains_key(&id) {
            return Err(Error::DuplicateGroup(format!("id {id}")));
        }
        if !group.name().is_empty() {
            if self.names.contains_key(group.name()) {
                return Err(Error::DuplicateGroup(group.name().to_string()));
            }
            self.names.insert(group.name().to_string(), id);
        }
        Ok(self.groups.entry(id).or_insert(group))
    }

    /// Returns the named group, creating it under the lowest free id.
    pub fn group_mut_or_insert(&mut self, name: &str, desc: &str) -> Result<&mut Group> {
        let key = name.to_uppercase();
        if let Some(&id) = self.names.get(&key) {
            return self
                .groups
                .get_mut(&id)
                .ok_or_else(|| Error::MissingParameter(key));
        }
        let id = (1..=i8::MAX as u8)
            .find(|id| !self.groups.contains_key(id))
            .ok_or_else(|| Error::DuplicateGroup(format!("{key}: all 127 group ids in use")))?;
        self.add_group(id, &key, desc)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        let id = self.names.get(&name.to_uppercase())?;
        self.groups.get(id)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        let id = self.names.get(&name.to_uppercase())?;
        self.groups.get_mut(id)
    }

    pub fn group_by_id(&self, id: u8) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Groups in ascending id order.
    pub fn groups(&self) -> impl Iterator<Item = (u8, &Group)> {
        self.groups.iter().map(|(&id, group)| (id, group))
    }

    // ------------------------------------------------------------------------
    // Parameter lookup
    // ------------------------------------------------------------------------

    /// Looks up `"GROUP:PARAM"` or `"GROUP.PARAM"`.
    ///
    /// The key is split on its first separator; a key without one never
    /// matches.
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        let (group, param) = split_key(key)?;
        self.group(group)?.get(param)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Parameter> {
        let (group, param) = split_key(key)?;
        self.group_mut(group)?.get_mut(param)
    }

    /// Like [`Directory::get`], but falls back to the caller's default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Parameter) -> &'a Parameter {
        self.get(key).unwrap_or(default)
    }

    /// Like [`Directory::get`], but a miss is [`Error::MissingParameter`].
    pub fn require(&self, key: &str) -> Result<&Parameter> {
        self.get(key)
            .ok_or_else(|| Error::MissingParameter(key.to_uppercase()))
    }

    pub fn get_value(&self, key: &str, kind: ElementKind) -> Result<ParamValue> {
        self.require(key)?.decode(kind)
    }

    pub fn get_u16(&self, key: &str) -> Result<u16> {
        self.require(key)?.as_u16()
    }

    pub fn get_i32(&self, key: &str) -> Result<i32> {
        self.require(key)?.as_i32()
    }

    pub fn get_f32(&self, key: &str) -> Result<f32> {
        self.require(key)?.as_f32()
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.require(key)?.as_string()
    }

    pub fn get_strings(&self, key: &str) -> Result<Vec<String>> {
        self.require(key)?.as_strings()
    }

    // ------------------------------------------------------------------------
    // Derived fields
    // ------------------------------------------------------------------------

    pub fn point_rate(&self) -> Result<f32> {
        self.get_f32("POINT:RATE")
    }

    pub fn point_scale(&self) -> Result<f32> {
        self.get_f32("POINT:SCALE")
    }

    pub fn point_used(&self) -> Result<u16> {
        self.get_u16("POINT:USED")
    }

    /// Number of analog channels, 0 when `ANALOG:USED` is absent.
    pub fn analog_used(&self) -> Result<u16> {
        self.get("ANALOG:USED").map_or(Ok(0), Parameter::as_u16)
    }

    /// Analog sample rate, 0 when `ANALOG:RATE` is absent.
    pub fn analog_rate(&self) -> Result<f32> {
        self.get("ANALOG:RATE").map_or(Ok(0.0), Parameter::as_f32)
    }

    /// Point labels with trailing padding removed; empty when absent.
    pub fn point_labels(&self) -> Result<Vec<String>> {
        self.trimmed_strings("POINT:LABELS")
    }

    /// Analog channel labels with trailing padding removed; empty when absent.
    pub fn analog_labels(&self) -> Result<Vec<String>> {
        self.trimmed_strings("ANALOG:LABELS")
    }

    /// First frame number; `TRIAL:ACTUAL_START_FIELD` overrides the header.
    pub fn first_frame(&self) -> Result<u32> {
        self.frame_number("TRIAL:ACTUAL_START_FIELD", self.header.first_frame)
    }

    /// Last frame number; `TRIAL:ACTUAL_END_FIELD` overrides the header.
    pub fn last_frame(&self) -> Result<u32> {
        self.frame_number("TRIAL:ACTUAL_END_FIELD", self.header.last_frame)
    }

    /// Number of frames in the inclusive range, 0 when it is empty.
    pub fn frame_count(&self) -> Result<u32> {
        let (first, last) = (self.first_frame()?, self.last_frame()?);
        Ok(if last < first { 0 } else { last - first + 1 })
    }

    fn trimmed_strings(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            Some(param) => Ok(param
                .as_strings()?
                .into_iter()
                .map(|s| s.trim_end_matches([' ', '\0']).to_string())
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    fn frame_number(&self, key: &str, header_value: u16) -> Result<u32> {
        let Some(param) = self.get(key) else {
            return Ok(header_value as u32);
        };
        let value = param.as_i32()?;
        u32::try_from(value).map_err(|_| Error::ValueAccess {
            name: key.to_string(),
            reason: format!("negative frame number {value}"),
        })
    }

    // ------------------------------------------------------------------------
    // Consistency and serialization
    // ------------------------------------------------------------------------

    /// Groups that have a group record; unnamed groups are not serialized.
    fn named_groups(&self) -> impl Iterator<Item = (u8, &Group)> {
        self.groups().filter(|(_, group)| !group.name().is_empty())
    }

    /// Number of 512-byte blocks the parameter section occupies.
    pub fn parameter_blocks(&self) -> usize {
        let bytes: usize = self.named_groups().map(|(_, group)| group.binary_size()).sum();
        blocks_for(PARAMETER_PREAMBLE_SIZE + bytes)
    }

    /// Cross-checks the header against the POINT group.
    ///
    /// Any disagreement is fatal. Missing label and description parameters
    /// are logged and returned as warnings.
    pub fn check_metadata(&self) -> Result<Vec<Warning>> {
        let header = &self.header;

        let used = self.point_used()?;
        if header.point_count != used {
            return Err(inconsistent("POINT:USED", header.point_count, used));
        }
        let scale = self.point_scale()?;
        if header.scale_factor != scale {
            return Err(inconsistent("POINT:SCALE", header.scale_factor, scale));
        }
        let rate = self.point_rate()?;
        if header.frame_rate != rate {
            return Err(inconsistent("POINT:RATE", header.frame_rate, rate));
        }
        let data_start = self.get_u16("POINT:DATA_START")?;
        if header.data_block != data_start {
            return Err(inconsistent("POINT:DATA_START", header.data_block, data_start));
        }

        let mut warnings = Vec::new();
        for key in RECOMMENDED {
            if self.get(key).is_none() {
                let warning = Warning::MissingParameter(key);
                warn!("{warning}");
                warnings.push(warning);
            }
        }
        Ok(warnings)
    }

    /// Serializes the parameter section, zero padded to whole blocks.
    ///
    /// The section starts with the preamble `[0, 0, blocks, 84]` and lists
    /// groups in ascending id order, each followed by its parameters. Groups
    /// without a name (see [`Warning::UnnamedGroup`]) are left out.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let blocks = self.parameter_blocks();
        let block_count = u8::try_from(blocks).map_err(|_| {
            Error::BlockSerializationError(format!(
                "parameter section needs {blocks} blocks, at most 255 fit the preamble"
            ))
        })?;

        let mut buffer = Vec::with_capacity(blocks * BLOCK_SIZE);
        buffer.extend_from_slice(&[0, 0, block_count, PROCESSOR_INTEL]);
        for (id, group) in self.named_groups() {
            buffer.extend_from_slice(&group.to_bytes(id)?);
        }
        buffer.resize(blocks * BLOCK_SIZE, 0);
        Ok(buffer)
    }
}

fn split_key(key: &str) -> Option<(&str, &str)> {
    let at = key.find(['.', ':'])?;
    Some((&key[..at], &key[at + 1..]))
}

fn inconsistent(field: &'static str, header: impl ToString, parameter: impl ToString) -> Error {
    Error::InconsistentMetadata {
        field,
        header: header.to_string(),
        parameter: parameter.to_string(),
    }
}
