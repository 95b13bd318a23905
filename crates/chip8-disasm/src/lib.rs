pub mod model;
pub mod report;

// Re-exported for the two binaries
pub use model::{load_rom, parse_u32};
pub use report::{InsnOut, LabelKV, RangeOut, Report};
