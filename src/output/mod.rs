pub mod lineset;

pub use lineset::{read_lines, read_set, write_dedup, write_raw, write_set, LineSet, StageResult};
