//! Tree output: text rendering and the flat persisted record layout.

mod records;
mod render;

pub use records::{NodeRecord, ReadError, TreeRecords, FORMAT_VERSION};
pub use render::{render_text, RenderOptions};
