//! Usage export import and billed-reading export.

pub mod export;
pub mod import;

pub use export::{export_csv, write_csv};
pub use import::{ImportError, read_readings, read_readings_from_path};
