//! Domain Layer
//!
//! Metric records, their display projection and the ports the
//! infrastructure writes through.

pub mod entities;
pub mod ports;
pub mod value_objects;
