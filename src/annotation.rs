mod class_colours;
mod overlay;

pub use class_colours::*;
pub use overlay::*;
