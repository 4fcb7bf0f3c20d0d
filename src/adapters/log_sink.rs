//! Log-based callbacks.
//!
//! Ready-made [`FaultHandler`](crate::app::ports::FaultHandler) and
//! [`ScanCallback`](crate::app::ports::ScanCallback) functions that write
//! to the `log` facade (UART / RTT / host logger, whatever the firmware
//! installed).  A telemetry adapter would provide functions of the same
//! shape.

use log::{error, info};

use crate::ad;
use crate::arbiter::Fault;
use crate::model::ScanReport;

/// Fault handler: one line per hardware fault.
pub fn log_fault(fault: &Fault) {
    error!("FAULT | {}", fault);
}

/// Scan callback: address, RSSI and manufacturer data if present.
pub fn log_report(report: &ScanReport) {
    match ad::find_manufacturer_data(&report.data) {
        Some((company, data)) => info!(
            "SCAN | {} | {} dBm | mfr=0x{:04x} len={}",
            report.address,
            report.rssi_dbm,
            company,
            data.len()
        ),
        None => info!(
            "SCAN | {} | {} dBm | {} bytes",
            report.address,
            report.rssi_dbm,
            report.data.len()
        ),
    }
}

/// Sent callback: trace-level heartbeat for each advertising event.
pub fn log_sent() {
    log::trace!("ADV | event sent");
}
