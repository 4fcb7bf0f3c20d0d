//! BLE radio hardware abstraction layer.
//!
//! Advertising and passive scanning on a single-radio device, behind one
//! blocking (plus optional non-blocking) operation surface.  The vendor
//! radio stack is reached only through [`app::ports::RadioDriver`]; the
//! host simulator in [`adapters::sim`] implements it for tests.
//!
//! ```text
//!  BleRadio ─▶ validator ─▶ ConfigStore
//!     │
//!     ├─▶ AdvertisingController ─┐
//!     └─▶ ScanningController ────┴─▶ RadioArbiter ─▶ RadioDriver
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

extern crate alloc;

pub mod ad;
pub mod adapters;
pub mod app;
pub mod arbiter;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod model;
pub mod store;
pub mod validator;

pub use app::service::{BleRadio, PendingToken, TokenPoll};
pub use error::{Error, Result};
