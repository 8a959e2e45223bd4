//! Adapters Layer
//!
//! Inbound adapters expose the metric collection to the outside world.

pub mod inbound;
