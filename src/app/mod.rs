//! Application core: the public radio service and its ports.
//!
//! The service holds the rules for sequencing advertising and scanning on
//! one radio.  All interaction with the vendor stack happens through the
//! port trait defined in [`ports`], keeping this layer fully testable with
//! the simulator in [`crate::adapters::sim`].

pub mod ports;
pub mod service;
