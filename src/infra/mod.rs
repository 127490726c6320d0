//! Adapters for the world outside the CSV pipeline: spreadsheet rosters and
//! object storage.

pub mod roster;
pub mod s3;
