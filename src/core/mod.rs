//! Core functionality: error types, configuration, and the data records
//! shared by the resolution pipeline and both gateway fronts.

pub mod config;
pub mod error;
pub mod types;
