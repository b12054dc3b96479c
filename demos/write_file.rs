use c3d_rs::{Parameter, Result, Writer, WriterConfig};
use ndarray::{Array2, array};

fn main() -> Result<()> {
    // 1) Settings for parameters the writer fills in itself
    let config = WriterConfig::new(100.0)
        .with_point_labels(["LHEE", "RHEE"])
        .with_analog_labels(["FZ"]);
    let mut writer = Writer::new(config);

    // 2) Caller-owned groups travel with the file
    let subjects = writer.directory_mut().group_mut_or_insert("SUBJECTS", "subject info")?;
    subjects.insert(Parameter::strings("NAMES", "subject names", &["S01"])?);

    // 3) One second of a heel strike pattern with a 1 kHz force channel
    for i in 0..100 {
        let t = i as f64 / 100.0;
        let height = (t * std::f64::consts::TAU).sin().abs() * 80.0;
        let mut points = array![
            [100.0, t * 1200.0, height, 0.4, 6.0],
            [-100.0, t * 1200.0 - 600.0, 80.0 - height, 0.4, 5.0],
        ];
        // right heel occluded for a few frames
        if (40..45).contains(&i) {
            points.row_mut(1).assign(&array![0.0, 0.0, 0.0, -1.0, -1.0]);
        }
        let force = Array2::from_shape_fn((1, 10), |(_, s)| 700.0 * (1.0 - height / 80.0) + s as f64);
        writer.add_frame(points, force)?;
    }

    // 4) Header, parameters and frames in one pass
    let warnings = writer.write_to_file("example.c3d")?;
    println!("wrote {} frames, {} warnings", writer.frame_count(), warnings.len());
    Ok(())
}
