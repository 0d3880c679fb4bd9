//! Resolver reloader implementations

pub mod command;

pub use command::CommandReloader;
