//! Radio data model.
//!
//! Plain value types shared by the validator, the configuration store, the
//! controllers and the driver port.  Every type here is `Copy` except the
//! byte payloads, which are fixed-capacity `heapless` vectors so nothing in
//! the HAL touches the heap.

use core::fmt;
use core::time::Duration;

// ---------------------------------------------------------------------------
// Hardware-fixed sizes
// ---------------------------------------------------------------------------

/// Length of a BLE device address.
pub const ADDRESS_LEN: usize = 6;

/// Maximum legacy advertising / scan-response data length.
pub const MAX_AD_DATA_LEN: usize = 31;

/// Largest application payload that still fits next to the flags and the
/// manufacturer-specific header (31 - 3 - 4).
pub const MAX_MANUFACTURER_DATA_LEN: usize = 24;

/// Duration of one radio timing unit in microseconds (0.625 ms).
pub const TICK_US: u64 = 625;

/// The three primary advertising channels.
pub const ADVERTISING_CHANNELS: [u8; 3] = [37, 38, 39];

/// Encoded AD structures, replaced wholesale on every update.
pub type AdPayload = heapless::Vec<u8, MAX_AD_DATA_LEN>;

/// Convert a duration into 0.625 ms ticks, rounding half up.
pub fn duration_to_ticks(d: Duration) -> u64 {
    let us = d.as_micros().min(u128::from(u64::MAX - TICK_US)) as u64;
    (us + TICK_US / 2) / TICK_US
}

/// Convert 0.625 ms ticks back into a duration.
pub const fn ticks_to_duration(ticks: u32) -> Duration {
    Duration::from_micros(ticks as u64 * TICK_US)
}

// ---------------------------------------------------------------------------
// Advertisement type
// ---------------------------------------------------------------------------

/// Connectable/scannable behaviour of the advertising PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum AdvertisementType {
    #[default]
    NonConnNonScan,
    ConnNonScan,
    ConnScan,
    NonConnScan,
}

impl AdvertisementType {
    /// Whether peers may send scan requests (and get the scan response).
    pub const fn is_scannable(self) -> bool {
        matches!(self, Self::ConnScan | Self::NonConnScan)
    }

    /// Whether peers may initiate a connection.
    pub const fn is_connectable(self) -> bool {
        matches!(self, Self::ConnScan | Self::ConnNonScan)
    }
}

// ---------------------------------------------------------------------------
// Device address
// ---------------------------------------------------------------------------

/// 48-bit device address, stored in over-the-air (little-endian) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RadioAddress([u8; ADDRESS_LEN]);

impl RadioAddress {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for RadioAddress {
    /// Conventional MSB-first colon notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

// ---------------------------------------------------------------------------
// Channel mask
// ---------------------------------------------------------------------------

/// Set of enabled advertising channels (bit 0 = 37, bit 1 = 38, bit 2 = 39).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u8);

impl ChannelMask {
    pub const EMPTY: Self = Self(0);
    pub const CH37: Self = Self(0b001);
    pub const CH38: Self = Self(0b010);
    pub const CH39: Self = Self(0b100);
    pub const ALL: Self = Self(0b111);

    /// Raw bitmask.  Only the low three bits are ever set.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `channel` (37, 38 or 39) is enabled.
    pub fn contains(self, channel: u8) -> bool {
        Self::bit_for(channel).is_some_and(|bit| self.0 & bit != 0)
    }

    /// Enabled channel numbers in ascending order.
    pub fn channels(self) -> impl Iterator<Item = u8> {
        ADVERTISING_CHANNELS
            .into_iter()
            .filter(move |ch| self.contains(*ch))
    }

    pub(crate) const fn from_bits_unchecked(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub(crate) const fn bit_for(channel: u8) -> Option<u8> {
        match channel {
            37 => Some(0b001),
            38 => Some(0b010),
            39 => Some(0b100),
            _ => None,
        }
    }
}

impl core::ops::BitOr for ChannelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Advertising interval
// ---------------------------------------------------------------------------

/// Advertising interval as a whole number of 0.625 ms ticks.
///
/// Only the validator constructs these, so every value in circulation is
/// within the hardware bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdvInterval(u32);

impl AdvInterval {
    pub(crate) const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    pub const fn as_duration(self) -> Duration {
        ticks_to_duration(self.0)
    }
}

// ---------------------------------------------------------------------------
// Scan parameters
// ---------------------------------------------------------------------------

/// Scan duty cycle: listen for `window` out of every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanParams {
    window: u32,
    interval: u32,
}

impl ScanParams {
    pub(crate) const fn from_ticks(window: u32, interval: u32) -> Self {
        Self { window, interval }
    }

    pub const fn window_ticks(self) -> u32 {
        self.window
    }

    pub const fn interval_ticks(self) -> u32 {
        self.interval
    }

    pub const fn window(self) -> Duration {
        ticks_to_duration(self.window)
    }

    pub const fn interval(self) -> Duration {
        ticks_to_duration(self.interval)
    }

    /// Window must never exceed interval.
    pub const fn is_consistent(self) -> bool {
        self.window <= self.interval
    }
}

// ---------------------------------------------------------------------------
// Scan report
// ---------------------------------------------------------------------------

/// One advertisement observed while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub address: RadioAddress,
    pub rssi_dbm: i8,
    pub data: AdPayload,
}
