//! Transformations from raw readings to report tables.
//!
//! The analyzers take rows and return rows. The one exception is the lookup
//! table loaders in [`join`] ([`join::NodeDirectory::load`] and
//! [`join::TagDirectory::load`]), which read their CSV files. Every other
//! read and write is left to [`crate::pipeline`].

pub mod effective;
pub mod hhi;
pub mod join;
pub mod occupancy;
pub mod period;
pub mod reservation;
pub mod resolve;
pub mod stay;
pub mod tags;
pub mod types;
pub mod utility;
pub mod workstyle;
