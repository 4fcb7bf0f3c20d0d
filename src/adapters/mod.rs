//! Adapters: concrete implementations of the port traits and callbacks.
//!
//! | Adapter    | Implements              | Connects to                 |
//! |------------|-------------------------|-----------------------------|
//! | `sim`      | RadioDriver, DelayNs    | In-memory radio simulation  |
//! | `log_sink` | FaultHandler, callbacks | `log` facade                |
//!
//! Vendor drivers (SoftDevice, NimBLE, ...) live in board support crates
//! and implement the same [`RadioDriver`](crate::app::ports::RadioDriver).

pub mod log_sink;
pub mod sim;
