//! Process exit codes, one per failure category of a check run

/// Every requested check passed
pub const SUCCESS: i32 = 0;

/// A manifest field, identity, rule or resource budget check failed
pub const VALIDATION_ERROR: i32 = 2;

/// The manifest or a chart template failed to render
pub const TEMPLATE_ERROR: i32 = 3;

/// The bundle folder is malformed or one of its files cannot be parsed
pub const BUNDLE_ERROR: i32 = 4;

/// A file could not be read
pub const IO_ERROR: i32 = 5;

/// Bad command line (sysexits.h `EX_USAGE`)
pub const USAGE_ERROR: i32 = 64;
