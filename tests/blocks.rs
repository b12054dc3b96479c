use c3d_rs::{
    Directory, ElementKind, Error, Group, Header, ParamArray, ParamValue, Parameter, Result,
    blocks::BLOCK_SIZE, parsing::decode_parameter_section,
};

fn section(records: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = vec![0, 0, 1, 84];
    for record in records {
        bytes.extend_from_slice(record);
    }
    bytes.resize(BLOCK_SIZE, 0);
    bytes
}

#[test]
fn header_roundtrip() -> Result<()> {
    let header = Header {
        parameter_block: 2,
        point_count: 41,
        analog_count: 160,
        first_frame: 1,
        last_frame: 1200,
        max_gap: 10,
        scale_factor: 0.083,
        data_block: 12,
        analog_per_frame: 10,
        frame_rate: 200.0,
        long_event_labels: true,
        label_block: 0,
    };
    let bytes = header.to_bytes()?;
    assert_eq!(bytes.len(), 512);
    assert_eq!(Header::from_bytes(&bytes)?, header);
    Ok(())
}

#[test]
fn header_display_lists_every_field() {
    let text = Header::default().to_string();
    assert_eq!(text.lines().count(), 12);
    assert!(text.contains("frame_rate: 60"));
}

#[test]
fn magic_is_checked_before_anything_else() {
    let mut bytes = vec![0xAAu8; 512];
    bytes[1] = 81;
    assert!(matches!(Header::from_bytes(&bytes), Err(Error::InvalidMagic(81))));
}

#[test]
fn group_record_order_does_not_matter() -> Result<()> {
    let mut group = Group::new("FORCE_PLATFORM", "force plates")?;
    group.insert(Parameter::scalar_u16("USED", "plate count", 2)?);
    group.insert(Parameter::i16_array("CHANNEL", "", &[1, 2, 3, 4, 5, 6])?);
    let record = group.to_bytes(3)?;

    // group record: 1 + 1 + 14 + 2 + 1 + 12 bytes
    let split = 31;
    let (group_record, params) = record.split_at(split);

    let group_first = section(&[group_record.to_vec(), params.to_vec()]);
    let params_first = section(&[params.to_vec(), group_record.to_vec()]);

    let (a, _) = decode_parameter_section(Header::default(), &group_first)?;
    let (b, _) = decode_parameter_section(Header::default(), &params_first)?;
    let a = a.group_by_id(3).expect("group 3");
    let b = b.group_by_id(3).expect("group 3");
    assert_eq!(a, b);
    assert_eq!(a, &group);
    assert_eq!(b.name(), "FORCE_PLATFORM");
    assert_eq!(b.desc(), "force plates");
    Ok(())
}

#[test]
fn parameter_blocks_is_the_smallest_fit() -> Result<()> {
    let mut directory = Directory::new(Header::default());
    assert_eq!(directory.parameter_blocks(), 1);

    let group = directory.add_group(1, "BIG", "")?;
    for i in 0..40 {
        group.insert(Parameter::f32_array(&format!("P{i}"), "", &[0.0; 8])?);
    }
    let total: usize = directory.groups().map(|(_, g)| g.binary_size()).sum();
    let blocks = directory.parameter_blocks();
    assert!(blocks * 512 >= 4 + total);
    assert!((blocks - 1) * 512 < 4 + total);
    assert_eq!(directory.to_bytes()?.len(), blocks * 512);
    Ok(())
}

#[test]
fn binary_size_equals_emitted_length() -> Result<()> {
    let params = [
        Parameter::scalar_u8("A", "", 7)?,
        Parameter::scalar_i32("B", "a description", -5)?,
        Parameter::text("C", "", "hello")?,
        Parameter::strings("D", "", &["x", "yy", "zzz"])?,
        Parameter::empty_array("E", "", 4)?,
        Parameter::new("F", "", 2, vec![2, 3], vec![0; 12])?,
    ];
    for param in &params {
        assert_eq!(param.to_bytes(1)?.len(), param.binary_size(), "{}", param.name());
    }
    Ok(())
}

#[test]
fn typed_decode_by_kind() -> Result<()> {
    let p = Parameter::new("WORDS", "", 2, vec![2], vec![0x01, 0x80, 0xFF, 0x7F])?;
    assert_eq!(p.decode(ElementKind::Int8)?, ParamValue::Int8(1));
    assert_eq!(p.decode(ElementKind::UInt16)?, ParamValue::UInt16(0x8001));
    assert_eq!(p.decode(ElementKind::Int16)?, ParamValue::Int16(-32767));
    assert_eq!(
        p.decode_array(ElementKind::Int16)?,
        ParamArray::Int16(vec![-32767, 0x7FFF])
    );
    assert_eq!(
        p.decode_array(ElementKind::UInt8)?,
        ParamArray::UInt8(vec![0x01, 0x80, 0xFF, 0x7F])
    );
    assert_eq!(
        p.decode(ElementKind::Bytes)?,
        ParamValue::Bytes(vec![0x01, 0x80, 0xFF, 0x7F])
    );
    assert!(matches!(
        p.decode(ElementKind::Utf8),
        Err(Error::ValueAccess { .. })
    ));

    let short = Parameter::scalar_u16("SHORT", "", 1)?;
    assert!(matches!(
        short.decode(ElementKind::Float32),
        Err(Error::ValueAccess { .. })
    ));
    Ok(())
}

#[test]
fn locked_records_keep_their_flag() -> Result<()> {
    let mut group = Group::new("POINT", "")?;
    group.locked = true;
    let mut used = Parameter::scalar_u16("USED", "", 4)?;
    used.locked = true;
    group.insert(used);

    let bytes = section(&[group.to_bytes(1)?]);
    let (directory, warnings) = decode_parameter_section(Header::default(), &bytes)?;
    assert!(warnings.is_empty());
    let decoded = directory.group("point").expect("POINT");
    assert!(decoded.locked);
    assert!(decoded.get("USED").expect("USED").locked);
    Ok(())
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(matches!(
        Parameter::new("", "", 1, vec![], vec![0]),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        Parameter::new(&"N".repeat(128), "", 1, vec![], vec![0]),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        Parameter::text("T", "", &"x".repeat(256)),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        Parameter::new("D", &"d".repeat(256), 1, vec![], vec![0]),
        Err(Error::InvalidParameter(_))
    ));
}
