//! Shared fixtures: a simulated radio wired to a `BleRadio`, plus
//! recording callbacks.
//!
//! Callbacks are plain `fn` pointers, so they record into thread-locals;
//! every test runs on its own thread and [`radio`] resets them.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use ble_radio_hal::BleRadio;
use ble_radio_hal::adapters::sim::{SimDelay, SimRadio};
use ble_radio_hal::arbiter::Fault;
use ble_radio_hal::arbiter::channel::RadioEventChannel;
use ble_radio_hal::config::RadioConfig;
use ble_radio_hal::model::{AdPayload, RadioAddress, ScanReport};

pub type Radio = BleRadio<'static, SimRadio<'static>, SimDelay>;

pub const FACTORY_ADDRESS: [u8; 6] = [0xC0, 0xFF, 0xEE, 0x12, 0x34, 0xD6];

thread_local! {
    static REPORTS: RefCell<Vec<ScanReport>> = const { RefCell::new(Vec::new()) };
    static FAULTS: RefCell<Vec<Fault>> = const { RefCell::new(Vec::new()) };
    static SENT: Cell<u32> = const { Cell::new(0) };
}

fn channel() -> &'static RadioEventChannel {
    Box::leak(Box::new(RadioEventChannel::new()))
}

/// Uninitialised radio with a factory address and `config`.
pub fn radio_with(config: RadioConfig) -> Radio {
    reset_callbacks();
    let ch = channel();
    let sim = SimRadio::new(ch.sender()).with_factory_address(RadioAddress::new(FACTORY_ADDRESS));
    let mut radio = BleRadio::new(config, sim, SimDelay::new(), ch).unwrap();
    radio.set_fault_handler(Some(record_fault));
    radio.set_sent_callback(Some(record_sent));
    radio
}

/// Initialised radio whose driver has no factory address.
pub fn radio_without_address() -> Radio {
    reset_callbacks();
    let ch = channel();
    let mut radio = BleRadio::new(RadioConfig::default(), SimRadio::new(ch.sender()), SimDelay::new(), ch).unwrap();
    radio.init().unwrap();
    radio
}

/// Initialised radio with default capabilities.
pub fn radio() -> Radio {
    let mut radio = radio_with(RadioConfig::default());
    radio.init().unwrap();
    radio
}

/// Initialised radio whose capability table allows coexistence.
pub fn coexisting_radio() -> Radio {
    let mut config = RadioConfig::default();
    config.capabilities.coexistence = true;
    let mut radio = radio_with(config);
    radio.init().unwrap();
    radio
}

pub fn reset_callbacks() {
    REPORTS.with(|r| r.borrow_mut().clear());
    FAULTS.with(|f| f.borrow_mut().clear());
    SENT.with(|s| s.set(0));
}

pub fn record_report(report: &ScanReport) {
    REPORTS.with(|r| r.borrow_mut().push(report.clone()));
}

pub fn reports() -> Vec<ScanReport> {
    REPORTS.with(|r| r.borrow().clone())
}

pub fn record_fault(fault: &Fault) {
    FAULTS.with(|f| f.borrow_mut().push(*fault));
}

pub fn faults() -> Vec<Fault> {
    FAULTS.with(|f| f.borrow().clone())
}

pub fn record_sent() {
    SENT.with(|s| s.set(s.get() + 1));
}

pub fn sent() -> u32 {
    SENT.with(Cell::get)
}

pub fn report(rssi_dbm: i8, data: &[u8]) -> ScanReport {
    ScanReport {
        address: RadioAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        rssi_dbm,
        data: AdPayload::from_slice(data).unwrap(),
    }
}
