//! Parameter validator.
//!
//! Pure, side-effect-free checks of a single configuration field against
//! the capability table.  Each function returns the *normalized* value that
//! the store will hold and the radio will apply, so callers can report the
//! actual setting instead of the requested one.  Safe to call from any
//! context, including interrupt-adjacent paths.

use core::time::Duration;

use crate::config::RadioCapabilities;
use crate::error::ValidationError;
use crate::model::{
    duration_to_ticks, AdvInterval, ChannelMask, RadioAddress, ScanParams, ADDRESS_LEN,
    MAX_AD_DATA_LEN, MAX_MANUFACTURER_DATA_LEN,
};

/// Round `requested` to the nearest 0.625 ms tick (half up), then clamp into
/// the hardware bounds.  Never fails: out-of-range requests are clamped,
/// not accepted as-is.
///
/// `caps` should have passed [`RadioCapabilities::check`].  An inverted
/// table does not panic; the upper bound wins.
pub fn validate_interval(caps: &RadioCapabilities, requested: Duration) -> AdvInterval {
    let min = u64::from(caps.interval_min_ticks());
    let max = u64::from(caps.interval_max_ticks());
    let ticks = duration_to_ticks(requested).max(min).min(max);
    AdvInterval::from_ticks(ticks as u32)
}

/// Pick the smallest supported level at or above `dbm`.
///
/// Requests below the lowest level map to the lowest level; requests above
/// the highest level are rejected rather than silently reduced.
pub fn validate_tx_power(caps: &RadioCapabilities, dbm: i8) -> Result<i8, ValidationError> {
    caps.tx_power_levels
        .iter()
        .copied()
        .find(|level| *level >= dbm)
        .ok_or(ValidationError::OutOfRange)
}

/// Build a channel mask from channel numbers.  Duplicates are harmless;
/// anything other than 37/38/39 is `Unsupported`.  An empty list yields an
/// empty mask (legal while idle, rejected by the store while advertising).
pub fn validate_channels(channels: &[u8]) -> Result<ChannelMask, ValidationError> {
    let mut bits = 0u8;
    for ch in channels {
        bits |= ChannelMask::bit_for(*ch).ok_or(ValidationError::Unsupported)?;
    }
    Ok(ChannelMask::from_bits_unchecked(bits))
}

/// Accept a raw bitmask (bit 0 = channel 37).  Bits above bit 2 are
/// `Unsupported`.
pub fn validate_channel_bits(bits: u8) -> Result<ChannelMask, ValidationError> {
    if bits & !ChannelMask::ALL.bits() != 0 {
        return Err(ValidationError::Unsupported);
    }
    Ok(ChannelMask::from_bits_unchecked(bits))
}

pub fn validate_address(bytes: &[u8]) -> Result<RadioAddress, ValidationError> {
    let arr: [u8; ADDRESS_LEN] = bytes
        .try_into()
        .map_err(|_| ValidationError::UnsupportedLength)?;
    Ok(RadioAddress::new(arr))
}

/// Application payload carried inside the manufacturer-specific AD structure.
pub fn validate_manufacturer_data(data: &[u8]) -> Result<(), ValidationError> {
    if data.len() > MAX_MANUFACTURER_DATA_LEN {
        return Err(ValidationError::UnsupportedLength);
    }
    Ok(())
}

/// Raw scan-response data (already encoded AD structures).
pub fn validate_scan_response(data: &[u8]) -> Result<(), ValidationError> {
    if data.len() > MAX_AD_DATA_LEN {
        return Err(ValidationError::UnsupportedLength);
    }
    Ok(())
}

/// Scan window and interval, each rounded to ticks and bounded by the
/// capability table; the window may not exceed the interval.
pub fn validate_scan_params(
    caps: &RadioCapabilities,
    window: Duration,
    interval: Duration,
) -> Result<ScanParams, ValidationError> {
    let min = caps.scan_min_ticks() as u64;
    let max = caps.scan_max_ticks() as u64;
    let w = duration_to_ticks(window);
    let i = duration_to_ticks(interval);
    if !(min..=max).contains(&w) || !(min..=max).contains(&i) {
        return Err(ValidationError::OutOfRange);
    }
    if w > i {
        return Err(ValidationError::InvalidWindow);
    }
    Ok(ScanParams::from_ticks(w as u32, i as u32))
}

/// Complete local name for the scan response: printable ASCII that fits in
/// one AD structure (2 header bytes).
pub fn validate_device_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_AD_DATA_LEN - 2 {
        return Err(ValidationError::UnsupportedLength);
    }
    if !is_printable_ascii(name) {
        return Err(ValidationError::Unsupported);
    }
    Ok(())
}

/// Every byte in `0x20..=0x7E` (space through tilde).
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
