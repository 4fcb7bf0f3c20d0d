//! Driver → arbiter completion channel.
//!
//! Uses an `embassy-sync` bounded channel so the driver's interrupt or
//! callback context can post completions without blocking, while the HAL
//! drains them from thread context.  The channel is owned by the firmware
//! (usually a `static`) and shared by reference.
//!
//! ```text
//! ┌──────────────┐  DriverEvent  ┌──────────────┐
//! │ Radio driver │──────────────▶│   BleRadio   │
//! │  (ISR / cb)  │               │  (arbiter)   │
//! └──────────────┘               └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use log::warn;

use super::command::CommandId;
use crate::model::ScanReport;

/// Channel depth for driver events.
pub const EVENT_DEPTH: usize = 16;

/// Notifications produced by the radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The command completed.
    Ack(CommandId),
    /// The command failed with a vendor-specific code.
    Fault(CommandId, u8),
    /// Advertising stopped without being asked (e.g. a connection took the radio).
    AdvertisingStopped,
    /// One advertising event went out on air.
    AdvertisementSent,
    /// A peer advertisement was received while scanning.
    Report(ScanReport),
}

pub type RadioEventChannel = Channel<CriticalSectionRawMutex, DriverEvent, EVENT_DEPTH>;
pub type RadioEventSender<'ch> = Sender<'ch, CriticalSectionRawMutex, DriverEvent, EVENT_DEPTH>;
pub type RadioEventReceiver<'ch> = Receiver<'ch, CriticalSectionRawMutex, DriverEvent, EVENT_DEPTH>;

/// Post an event from driver context.  Never blocks; returns `false` if the
/// channel is full and the event was dropped.  A dropped `Ack` is recovered
/// by the acknowledgement watchdog.
pub fn notify(sender: &RadioEventSender<'_>, event: DriverEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            warn!("radio event channel full, event dropped");
            false
        }
    }
}
