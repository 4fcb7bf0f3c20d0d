//! Unified error types for the radio HAL.
//!
//! A single `Error` enum that every subsystem converts into, so the public
//! operation surface reports one taxonomy.  All variants are `Copy` so they
//! can be passed through the arbiter, the controllers and the fault handler
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible public operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Operation attempted before `init()` (or after `uninit()`).
    NotInitialized,
    /// `init()` called on an already initialised radio.
    AlreadyInitialized,
    /// Operation is illegal in the current controller state.
    InvalidState,
    /// Value outside the hardware-supported range.
    OutOfRange,
    /// Value not in the hardware capability table.
    Unsupported,
    /// Byte sequence has an unsupported length.
    UnsupportedLength,
    /// A field required to start advertising is unset.
    IncompleteConfig,
    /// Scan window is unset or exceeds the scan interval.
    InvalidWindow,
    /// The arbiter cannot grant exclusive radio access right now.
    RadioBusy,
    /// The radio driver reported a failure.  Terminal for the affected
    /// controller until `uninit()` + `init()`.
    HardwareFault(FaultReason),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "radio not initialised"),
            Self::AlreadyInitialized => write!(f, "radio already initialised"),
            Self::InvalidState => write!(f, "operation invalid in current state"),
            Self::OutOfRange => write!(f, "value out of range"),
            Self::Unsupported => write!(f, "value not supported by hardware"),
            Self::UnsupportedLength => write!(f, "unsupported length"),
            Self::IncompleteConfig => write!(f, "advertising configuration incomplete"),
            Self::InvalidWindow => write!(f, "scan window invalid for scan interval"),
            Self::RadioBusy => write!(f, "radio busy"),
            Self::HardwareFault(reason) => write!(f, "hardware fault: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware fault reasons
// ---------------------------------------------------------------------------

/// Why the driver (or the watchdog standing in for it) failed a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// The driver refused the command synchronously on submission.
    Rejected,
    /// The driver reported an asynchronous failure with a vendor code.
    Reported(u8),
    /// No acknowledgement arrived within the configured watchdog timeout.
    WatchdogTimeout,
    /// Powering the radio up or down failed.
    PowerFailure,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "command rejected by driver"),
            Self::Reported(code) => write!(f, "driver reported code 0x{code:02x}"),
            Self::WatchdogTimeout => write!(f, "acknowledgement watchdog expired"),
            Self::PowerFailure => write!(f, "radio power transition failed"),
        }
    }
}

impl From<FaultReason> for Error {
    fn from(reason: FaultReason) -> Self {
        Self::HardwareFault(reason)
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Rejections produced by the pure parameter validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    OutOfRange,
    UnsupportedLength,
    Unsupported,
    /// Scan window exceeds scan interval.
    InvalidWindow,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "out of range"),
            Self::UnsupportedLength => write!(f, "unsupported length"),
            Self::Unsupported => write!(f, "unsupported value"),
            Self::InvalidWindow => write!(f, "scan window exceeds interval"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::OutOfRange => Self::OutOfRange,
            ValidationError::UnsupportedLength => Self::UnsupportedLength,
            ValidationError::Unsupported => Self::Unsupported,
            ValidationError::InvalidWindow => Self::InvalidWindow,
        }
    }
}

// ---------------------------------------------------------------------------
// Commit errors
// ---------------------------------------------------------------------------

/// Rejections produced by the configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitError {
    /// A radio command touching this field is queued or in flight.
    Busy,
    /// The current controller state forbids changing this field.
    InvalidState,
    /// The store has not been initialised.
    NotInitialized,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "field busy"),
            Self::InvalidState => write!(f, "field locked in current state"),
            Self::NotInitialized => write!(f, "store not initialised"),
        }
    }
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Busy => Self::RadioBusy,
            CommitError::InvalidState => Self::InvalidState,
            CommitError::NotInitialized => Self::NotInitialized,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
