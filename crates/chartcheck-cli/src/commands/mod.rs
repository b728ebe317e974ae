//! CLI command implementations

pub mod check;
pub mod lint;
pub mod manifest;
