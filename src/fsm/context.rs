//! Mutable context threaded through the state handlers.
//!
//! One context per controller.  The handlers in [`super::states`] are the
//! only code that writes the bookkeeping fields; the controllers write
//! `fault` and `callback` directly.

use crate::app::ports::ScanCallback;
use crate::arbiter::Fault;

/// Context for the advertising state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvContext {
    /// Latched hardware fault.  Cleared only by entering `Uninit`.
    pub fault: Option<Fault>,
    /// The radio is transmitting advertisements.
    pub on_air: bool,
    /// Number of Idle → Advertising sessions since `init()`.
    pub sessions: u32,
}

/// Context for the scanning state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanContext {
    pub fault: Option<Fault>,
    /// Receives reports while `Scanning`.
    pub callback: Option<ScanCallback>,
    pub sessions: u32,
}
