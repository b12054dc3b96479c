use crate::{
    Error, Result, Warning,
    blocks::{
        Group, Header, PROCESSOR_INTEL, Parameter,
        common::{ByteCursor, PARAMETER_PREAMBLE_SIZE, lossy_text, validate_buffer_size},
    },
    directory::Directory,
};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Resolution state of one group id while the record stream is scanned.
///
/// Parameters may name a group id before the group record itself appears.
#[derive(Debug)]
enum GroupSlot {
    /// Parameters were seen, the group record was not (yet).
    Unnamed(Group),
    /// The group record has been seen.
    Named(Group),
}

impl GroupSlot {
    fn group_mut(&mut self) -> &mut Group {
        match self {
            GroupSlot::Unnamed(group) | GroupSlot::Named(group) => group,
        }
    }

    /// Applies a group record, moving the slot to `Named`.
    fn name(self, name: String, desc: String) -> Self {
        let mut group = match self {
            GroupSlot::Unnamed(group) => group,
            GroupSlot::Named(group) => {
                debug!("group record for {} repeated as {}", group.name(), name);
                group
            }
        };
        group.rename(name, desc);
        GroupSlot::Named(group)
    }
}

/// Decodes a parameter section into a [`Directory`].
///
/// `section` starts at the preamble and spans the blocks it announces (or
/// whatever was available). Fails on a non-Intel processor tag and on any
/// record that overruns the section. Nothing is returned on failure.
pub fn decode_parameter_section(
    header: Header,
    section: &[u8],
) -> Result<(Directory, Vec<Warning>)> {
    validate_buffer_size(section, PARAMETER_PREAMBLE_SIZE)?;
    let processor = section[3];
    if processor != PROCESSOR_INTEL {
        return Err(Error::UnsupportedProcessor(processor));
    }

    let mut slots: BTreeMap<u8, GroupSlot> = BTreeMap::new();
    let mut pos = PARAMETER_PREAMBLE_SIZE;
    let mut records = 0usize;

    while pos + 2 <= section.len() {
        let Some(next) = read_record(section, pos, &mut slots)? else {
            break;
        };
        records += 1;
        match next {
            Some(next) => pos = next,
            None => break,
        }
    }

    let mut directory = Directory::new(header);
    let mut warnings = Vec::new();
    for (id, slot) in slots {
        match slot {
            GroupSlot::Named(group) => {
                directory.insert_group(id, group)?;
            }
            GroupSlot::Unnamed(group) => {
                let warning = Warning::UnnamedGroup(id);
                warn!("{warning}");
                warnings.push(warning);
                directory.insert_group(id, group)?;
            }
        }
    }

    debug!(
        "decoded {} parameter records into {} groups",
        records,
        directory.groups().count()
    );
    Ok((directory, warnings))
}

/// Reads the record at `start`.
///
/// Returns `None` on the terminator, `Some(None)` for a record marked as the
/// last one, and `Some(Some(next))` with the start of the following record.
fn read_record(
    section: &[u8],
    start: usize,
    slots: &mut BTreeMap<u8, GroupSlot>,
) -> Result<Option<Option<usize>>> {
    let mut cur = ByteCursor::new(&section[start..]);
    let raw_len = cur.i8()?;
    let raw_id = cur.i8()?;
    if raw_len == 0 || raw_id == 0 {
        return Ok(None);
    }

    let name_len = raw_len.unsigned_abs() as usize;
    let locked = raw_len < 0;
    let name = lossy_text(
        cur.take(name_len)
            .map_err(|_| malformed(start, "name runs past the end of the section"))?,
    )
    .to_uppercase();
    let offset = cur
        .i16()
        .map_err(|_| malformed(start, "offset runs past the end of the section"))?;
    if offset < 0 {
        return Err(malformed(start, &format!("{name}: negative offset {offset}")));
    }

    // The offset counts from its own first byte.
    let body_start = start + 2 + name_len + 2;
    let (body_end, next) = if offset == 0 {
        (section.len(), None)
    } else {
        let next = start + 2 + name_len + offset as usize;
        if next > section.len() {
            return Err(malformed(
                start,
                &format!("{name}: record ends at {next}, section is {} bytes", section.len()),
            ));
        }
        if next < body_start {
            return Err(malformed(start, &format!("{name}: offset {offset} is too small")));
        }
        (next, Some(next))
    };
    let mut body = ByteCursor::new(&section[body_start..body_end]);

    let id = raw_id.unsigned_abs();
    if raw_id < 0 {
        let desc_len = body
            .u8()
            .map_err(|_| malformed(start, &format!("{name}: missing description")))?
            as usize;
        let desc = lossy_text(
            body.take(desc_len)
                .map_err(|_| malformed(start, &format!("{name}: truncated description")))?,
        );
        let slot = slots
            .remove(&id)
            .unwrap_or_else(|| GroupSlot::Unnamed(Group::unnamed()));
        let mut slot = slot.name(name, desc);
        slot.group_mut().locked = locked;
        slots.insert(id, slot);
    } else {
        let param = Parameter::read_body(name, locked, &mut body).map_err(|e| {
            malformed(start, &format!("parameter body: {e}"))
        })?;
        let group = slots
            .entry(id)
            .or_insert_with(|| GroupSlot::Unnamed(Group::unnamed()))
            .group_mut();
        if let Some(old) = group.insert(param) {
            debug!("parameter {} of group {} repeated", old.name(), id);
        }
    }

    Ok(Some(next))
}

fn malformed(start: usize, reason: &str) -> Error {
    Error::MalformedRecord(format!("record at byte {start}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(records: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 1, PROCESSOR_INTEL];
        for record in records {
            bytes.extend_from_slice(record);
        }
        bytes.resize(512, 0);
        bytes
    }

    fn point_group() -> Group {
        let mut group = Group::new("POINT", "points").unwrap();
        group.insert(Parameter::scalar_u16("USED", "", 3).unwrap());
        group
    }

    #[test]
    fn parameters_may_precede_their_group() {
        let param = Parameter::scalar_f32("RATE", "", 50.0).unwrap();
        let group = Group::new("POINT", "points").unwrap();
        let bytes = section(&[param.to_bytes(1).unwrap(), group.to_bytes(1).unwrap()]);

        let (dir, warnings) = decode_parameter_section(Header::default(), &bytes).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(dir.group("POINT").unwrap().desc(), "points");
        assert_eq!(dir.point_rate().unwrap(), 50.0);
    }

    #[test]
    fn group_without_record_is_kept_by_id() {
        let param = Parameter::scalar_u16("USED", "", 3).unwrap();
        let bytes = section(&[param.to_bytes(4).unwrap()]);

        let (dir, warnings) = decode_parameter_section(Header::default(), &bytes).unwrap();
        assert_eq!(warnings, vec![Warning::UnnamedGroup(4)]);
        let group = dir.group_by_id(4).unwrap();
        assert_eq!(group.name(), "");
        assert!(group.get("USED").is_some());
    }

    #[test]
    fn zero_offset_ends_the_section() {
        let mut last = point_group().to_bytes(1).unwrap();
        // zero the offset of the USED record, the final record
        let used_at = 16;
        last[used_at + 6] = 0;
        last[used_at + 7] = 0;
        let mut bytes = section(&[last]);
        // garbage after the final record must be ignored
        bytes[100] = 3;
        bytes[101] = 9;

        let (dir, _) = decode_parameter_section(Header::default(), &bytes).unwrap();
        assert_eq!(dir.point_used().unwrap(), 3);
        assert_eq!(dir.groups().count(), 1);
    }

    #[test]
    fn non_intel_processor_is_rejected() {
        let mut bytes = section(&[]);
        bytes[3] = 85;
        assert!(matches!(
            decode_parameter_section(Header::default(), &bytes),
            Err(Error::UnsupportedProcessor(85))
        ));
    }

    #[test]
    fn overrunning_record_is_malformed() {
        let mut bytes = section(&[point_group().to_bytes(1).unwrap()]);
        // POINT record: offset field at 4 + 2 + 5
        bytes[11] = 0xFF;
        bytes[12] = 0x0F;
        let err = decode_parameter_section(Header::default(), &bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
        assert!(err.is_format_error());
    }

    #[test]
    fn conflicting_group_names_are_rejected() {
        let a = Group::new("POINT", "").unwrap();
        let b = Group::new("POINT", "").unwrap();
        let bytes = section(&[a.to_bytes(1).unwrap(), b.to_bytes(2).unwrap()]);
        assert!(matches!(
            decode_parameter_section(Header::default(), &bytes),
            Err(Error::DuplicateGroup(_))
        ));
    }
}
