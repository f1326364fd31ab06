//! Query modules, one per table.

pub mod covers;
pub mod records;
