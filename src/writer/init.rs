// Synthesis of the standard POINT, ANALOG and TRIAL parameters
use super::{FrameShape, Writer};
use crate::{Error, Result, blocks::Parameter};

impl Writer {
    /// Creates or refreshes the parameters every reader relies on.
    ///
    /// Counts, frame range and `POINT:DATA_START` are always rewritten.
    /// Rates, scales, units, labels and descriptions already present in the
    /// directory are kept; missing ones come from the [`super::WriterConfig`].
    pub(super) fn sync_parameters(&mut self, shape: FrameShape, frame_count: usize) -> Result<()> {
        let config = &self.config;
        let used = count_u16(shape.points, "point count")?;
        let channels = count_u16(shape.channels, "analog channel count")?;

        let point_labels = labels(&config.point_labels, shape.points, "M", "point")?;
        let analog_labels = labels(&config.analog_labels, shape.channels, "A", "analog")?;

        let point = self.directory.group_mut_or_insert("POINT", "POINT group")?;
        point.insert(Parameter::scalar_u16("USED", "Number of 3d markers", used)?);
        point.insert(Parameter::scalar_u16(
            "FRAMES",
            "frame count",
            frame_count.min(u16::MAX as usize) as u16,
        )?);
        point.insert(Parameter::scalar_u16("DATA_START", "data block number", 0)?);
        if point.get("SCALE").is_none() {
            point.insert(Parameter::scalar_f32("SCALE", "3d scale factor", config.point_scale)?);
        }
        if point.get("RATE").is_none() {
            point.insert(Parameter::scalar_f32("RATE", "3d data capture rate", config.point_rate)?);
        }
        if point.get("X_SCREEN").is_none() {
            point.insert(Parameter::text("X_SCREEN", "X_SCREEN parameter", "+X")?);
        }
        if point.get("Y_SCREEN").is_none() {
            point.insert(Parameter::text("Y_SCREEN", "Y_SCREEN parameter", "+Y")?);
        }
        if point.get("UNITS").is_none() {
            point.insert(Parameter::text("UNITS", "3d data units", &config.point_units)?);
        }
        if point.get("LABELS").is_none() {
            point.insert(Parameter::strings("LABELS", "labels", &point_labels)?);
        }
        if point.get("DESCRIPTIONS").is_none() {
            let blank = vec![""; shape.points];
            point.insert(Parameter::strings("DESCRIPTIONS", "descriptions", &blank)?);
        }
        let point_rate = point
            .get("RATE")
            .map_or(Ok(config.point_rate), Parameter::as_f32)?;

        let analog = self.directory.group_mut_or_insert("ANALOG", "ANALOG group")?;
        analog.insert(Parameter::scalar_u16("USED", "analog channel count", channels)?);
        if analog.get("RATE").is_none() {
            let rate = point_rate * shape.samples as f32;
            analog.insert(Parameter::scalar_f32("RATE", "analog sample rate", rate)?);
        }
        if analog.get("GEN_SCALE").is_none() {
            analog.insert(Parameter::scalar_f32(
                "GEN_SCALE",
                "analog general scale factor",
                config.gen_scale,
            )?);
        }
        if analog.get("SCALE").is_none() {
            analog.insert(Parameter::empty_array("SCALE", "analog channel scale factors", 4)?);
        }
        if analog.get("OFFSET").is_none() {
            analog.insert(Parameter::empty_array("OFFSET", "analog channel offsets", 2)?);
        }
        if analog.get("LABELS").is_none() {
            analog.insert(Parameter::strings("LABELS", "labels", &analog_labels)?);
        }
        if analog.get("DESCRIPTIONS").is_none() {
            let blank = vec![""; shape.channels];
            analog.insert(Parameter::strings("DESCRIPTIONS", "descriptions", &blank)?);
        }

        let first = config.first_frame;
        let last = first.saturating_add(frame_count.saturating_sub(1) as u32);
        let trial = self.directory.group_mut_or_insert("TRIAL", "TRIAL group")?;
        trial.insert(Parameter::word_pair("ACTUAL_START_FIELD", "actual start frame", first)?);
        trial.insert(Parameter::word_pair("ACTUAL_END_FIELD", "actual end frame", last)?);

        Ok(())
    }
}

fn count_u16(count: usize, what: &str) -> Result<u16> {
    u16::try_from(count).map_err(|_| Error::InvalidFrame(format!("{what} {count} exceeds 65535")))
}

/// Caller labels when given, `{prefix}001`, `{prefix}002`, ... otherwise.
fn labels(given: &Option<Vec<String>>, count: usize, prefix: &str, what: &str) -> Result<Vec<String>> {
    match given {
        Some(labels) if labels.len() != count => Err(Error::InvalidParameter(format!(
            "{} {what} labels for {count} {what} columns",
            labels.len()
        ))),
        Some(labels) => Ok(labels.clone()),
        None => Ok((1..=count).map(|i| format!("{prefix}{i:03}")).collect()),
    }
}
