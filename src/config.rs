//! Hardware capability table and arbiter tuning.
//!
//! Everything the HAL must not guess about the target radio lives here:
//! supported TX power levels, advertising interval bounds, scan timing
//! bounds and whether advertising and scanning may share the radio by time
//! division.  Board support code supplies the values, either as a
//! `RadioConfig` literal, a JSON document, or a postcard blob from flash.

use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TICK_US;

/// Maximum number of discrete TX power levels in a capability table.
pub const MAX_TX_POWER_LEVELS: usize = 16;

// ---------------------------------------------------------------------------
// Capability table
// ---------------------------------------------------------------------------

/// What the target radio can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioCapabilities {
    /// Supported TX power levels in dBm, strictly ascending.
    pub tx_power_levels: heapless::Vec<i8, MAX_TX_POWER_LEVELS>,
    /// TX power applied at `init()`; must be one of `tx_power_levels`.
    pub default_tx_power_dbm: i8,

    /// Shortest advertising interval the radio accepts (ms).
    pub adv_interval_min_ms: u32,
    /// Longest advertising interval the radio accepts (ms).
    pub adv_interval_max_ms: u32,
    /// Interval applied at `init()` (ms).
    pub adv_interval_default_ms: u32,

    /// Shortest scan window / interval (µs).
    pub scan_time_min_us: u32,
    /// Longest scan window / interval (µs).
    pub scan_time_max_us: u32,

    /// Whether the radio can time-slice advertising and scanning.  When
    /// `false` the two are mutually exclusive.
    pub coexistence: bool,
}

impl Default for RadioCapabilities {
    fn default() -> Self {
        let mut levels = heapless::Vec::new();
        for dbm in [-40, -20, -16, -12, -8, -4, 0, 4] {
            // Capacity 16 > 8 entries.
            let _ = levels.push(dbm);
        }
        Self {
            tx_power_levels: levels,
            default_tx_power_dbm: 0,

            adv_interval_min_ms: 100,
            adv_interval_max_ms: 10_000,
            adv_interval_default_ms: 1010,

            scan_time_min_us: 2_500,      // 4 ticks
            scan_time_max_us: 10_240_000, // 16384 ticks

            coexistence: false,
        }
    }
}

impl RadioCapabilities {
    /// Smallest representable interval tick count not below the minimum.
    pub fn interval_min_ticks(&self) -> u32 {
        ceil_ticks(self.adv_interval_min_ms as u64 * 1000)
    }

    /// Largest representable interval tick count not above the maximum.
    pub fn interval_max_ticks(&self) -> u32 {
        floor_ticks(self.adv_interval_max_ms as u64 * 1000)
    }

    pub fn scan_min_ticks(&self) -> u32 {
        ceil_ticks(self.scan_time_min_us as u64)
    }

    pub fn scan_max_ticks(&self) -> u32 {
        floor_ticks(self.scan_time_max_us as u64)
    }

    /// Sanity-check a table before handing it to the HAL.
    pub fn check(&self) -> Result<(), CapabilityError> {
        if self.tx_power_levels.is_empty() {
            return Err(CapabilityError::Invalid("tx_power_levels is empty"));
        }
        if self.tx_power_levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CapabilityError::Invalid(
                "tx_power_levels must be strictly ascending",
            ));
        }
        if !self.tx_power_levels.contains(&self.default_tx_power_dbm) {
            return Err(CapabilityError::Invalid(
                "default_tx_power_dbm not in tx_power_levels",
            ));
        }
        if self.interval_min_ticks() == 0 || self.interval_min_ticks() > self.interval_max_ticks() {
            return Err(CapabilityError::Invalid("advertising interval bounds"));
        }
        if self.adv_interval_default_ms < self.adv_interval_min_ms
            || self.adv_interval_default_ms > self.adv_interval_max_ms
        {
            return Err(CapabilityError::Invalid(
                "adv_interval_default_ms outside bounds",
            ));
        }
        if self.scan_min_ticks() == 0 || self.scan_min_ticks() > self.scan_max_ticks() {
            return Err(CapabilityError::Invalid("scan timing bounds"));
        }
        Ok(())
    }
}

fn ceil_ticks(us: u64) -> u32 {
    us.div_ceil(TICK_US).min(u32::MAX as u64) as u32
}

fn floor_ticks(us: u64) -> u32 {
    (us / TICK_US).min(u32::MAX as u64) as u32
}

// ---------------------------------------------------------------------------
// Arbiter tuning
// ---------------------------------------------------------------------------

/// Timing of the blocking wait on driver acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// A dispatched command that is not acknowledged within this many
    /// microseconds is failed with `FaultReason::WatchdogTimeout`.
    pub ack_timeout_us: u32,
    /// Delay between polls of the completion channel while blocking.
    pub poll_interval_us: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            ack_timeout_us: 100_000,
            poll_interval_us: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Combined configuration
// ---------------------------------------------------------------------------

/// Everything `BleRadio::new` needs besides its ports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RadioConfig {
    pub capabilities: RadioCapabilities,
    pub arbiter: ArbiterConfig,
}

impl RadioConfig {
    /// Parse and check a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, CapabilityError> {
        let config: Self = serde_json::from_str(text).map_err(|_| CapabilityError::Corrupted)?;
        config.check()?;
        Ok(config)
    }

    /// Parse and check a postcard blob (e.g. a flash-resident table).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CapabilityError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| CapabilityError::Corrupted)?;
        config.check()?;
        Ok(config)
    }

    /// Encode as a postcard blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CapabilityError> {
        postcard::to_allocvec(self).map_err(|_| CapabilityError::Corrupted)
    }

    pub fn check(&self) -> Result<(), CapabilityError> {
        self.capabilities.check()?;
        if self.arbiter.ack_timeout_us == 0 || self.arbiter.poll_interval_us == 0 {
            return Err(CapabilityError::Invalid("arbiter timings must be non-zero"));
        }
        Ok(())
    }
}

/// Errors from loading or checking a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    /// The document or blob could not be decoded.
    Corrupted,
    /// A field failed validation; the message names it.
    Invalid(&'static str),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "configuration corrupted"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}
