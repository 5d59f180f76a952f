//! File system helpers: filename sanitizing and artifact paths.

pub mod naming;
pub mod paths;

pub use naming::{make_unique_filename, sanitize_filename};
pub use paths::{cleanup_temp_files, move_to_downloads};
