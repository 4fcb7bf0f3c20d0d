//! Port traits: the boundary between the HAL core and the radio hardware.
//!
//! ```text
//!   RadioDriver adapter ──▶ RadioDriver trait ──▶ BleRadio (domain)
//! ```
//!
//! A vendor SoftDevice, a host simulator or a test mock implements
//! [`RadioDriver`].  The [`BleRadio`](super::service::BleRadio) consumes it
//! via generics, so the domain core never touches vendor APIs directly.
//!
//! ## Driver contract
//!
//! - `submit` must not block.  It either accepts the command (and later
//!   posts exactly one `Ack` or `Fault` with the same [`CommandId`] on the
//!   event channel) or rejects it synchronously.
//! - Asynchronous notifications (`AdvertisingStopped`, `AdvertisementSent`,
//!   `Report`) go through the same channel.

use core::fmt;

use crate::arbiter::command::{CommandId, RadioCommand};
use crate::arbiter::Fault;
use crate::model::{RadioAddress, ScanReport};

// ───────────────────────────────────────────────────────────────
// Radio driver port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Command-side port to the vendor radio stack.
pub trait RadioDriver {
    /// Power the radio up.  Called from `init()`.
    fn enable(&mut self) -> Result<(), DriverError>;

    /// Power the radio down.  Called from `uninit()`.
    fn disable(&mut self) -> Result<(), DriverError>;

    /// Device address burned in at the factory, if the part has one.
    fn factory_address(&self) -> Option<RadioAddress>;

    /// Hand one command to the radio.
    fn submit(&mut self, id: CommandId, command: &RadioCommand) -> Result<(), DriverError>;
}

/// Synchronous rejection from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The stack is not in a state that accepts this command.
    InvalidState,
    /// A parameter was refused by the stack.
    InvalidParam,
    /// Vendor-specific failure code.
    Internal(u8),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::Internal(code) => write!(f, "internal error 0x{code:02x}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Application callbacks
// ───────────────────────────────────────────────────────────────

/// Receives peer advertisements while scanning.  Runs on the thread that
/// drains the event channel, never in interrupt context.
pub type ScanCallback = fn(&ScanReport);

/// Receives every hardware fault, whether or not a caller also got it.
pub type FaultHandler = fn(&Fault);

/// Invoked after each advertising event goes out.
pub type SentCallback = fn();
