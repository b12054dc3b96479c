use c3d_rs::{Reader, Result};
use std::fs::File;

fn main() -> Result<()> {
    // 1) Decode header and parameters (no frames are read yet)
    // This assumes `write_file` has been run to create the file
    let path = "example.c3d";
    let mut reader = Reader::new(File::open(path)?)?;
    for warning in reader.warnings() {
        println!("warning: {warning}");
    }
    println!("{}", reader.header());
    println!();

    // 2) Walk all parameter groups
    for (id, group) in reader.directory().groups() {
        println!("Group {id} {} : {}", group.name(), group.desc());
        for param in group.params() {
            println!(
                "    {:<20} bpe {:>2} dims {:?}",
                param.name(),
                param.bytes_per_element(),
                param.dimensions()
            );
        }
    }
    println!();

    // 3) Decode frames on demand
    let labels = reader.point_labels()?;
    let mut cursor = reader.frame_cursor()?;
    while let Some(frame) = cursor.advance()? {
        if frame.number % 25 != 0 {
            continue;
        }
        print!("frame {:>4}:", frame.number);
        for (label, row) in labels.iter().zip(frame.points.rows()) {
            if row[3] < 0.0 {
                print!("  {label} <invalid>");
            } else {
                print!("  {label} ({:.1}, {:.1}, {:.1})", row[0], row[1], row[2]);
            }
        }
        println!("  force {:.1}", frame.analog[[0, 0]]);
    }
    Ok(())
}
