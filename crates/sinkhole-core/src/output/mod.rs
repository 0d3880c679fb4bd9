//! Config writer implementations

pub mod file;

pub use file::FileConfigWriter;
