mod frames;
mod parameter_section;

pub use frames::{AnalogFormat, Frame, FrameLayout};
pub use parameter_section::decode_parameter_section;
