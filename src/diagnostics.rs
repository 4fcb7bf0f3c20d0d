//! Runtime counters for the radio HAL.
//!
//! Collected on the fly by the arbiter and the facade and read back with
//! `BleRadio::stats()`.  Serializable so firmware can ship a snapshot over
//! whatever telemetry link it has.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStats {
    pub commands_issued: u32,
    pub commands_acked: u32,
    pub commands_faulted: u32,
    pub watchdog_expiries: u32,
    /// Acks or faults for commands no longer in flight.
    pub stale_completions: u32,
    pub advertisements_sent: u32,
    pub scan_reports: u32,
    /// Reports received while no scan was active.
    pub reports_dropped: u32,
    /// Advertising stopped by the stack without being asked.
    pub external_stops: u32,
}

impl RadioStats {
    /// Share of issued commands that failed, in percent.
    pub fn fault_rate_percent(&self) -> u8 {
        if self.commands_issued == 0 {
            return 0;
        }
        ((self.commands_faulted as u64 * 100) / self.commands_issued as u64).min(100) as u8
    }
}
