//! Fuzz target: driver behaviour against `BleRadio`
//!
//! Each input byte pair picks an operation or a piece of driver
//! misbehaviour (faults, silence, stray acks, external stops) and applies
//! it to a simulated radio.  After every step the controllers must agree
//! with what the simulated radio is actually doing, and every blocking
//! call must return.
//!
//! cargo fuzz run fuzz_driver_events

#![no_main]

use core::time::Duration;

use ble_radio_hal::BleRadio;
use ble_radio_hal::adapters::sim::{SimDelay, SimRadio, SimResponse};
use ble_radio_hal::arbiter::channel::{DriverEvent, RadioEventChannel};
use ble_radio_hal::arbiter::command::{CommandId, CommandKind};
use ble_radio_hal::config::RadioConfig;
use ble_radio_hal::controller::scanning::ScanState;
use ble_radio_hal::model::{RadioAddress, ScanReport};
use libfuzzer_sys::fuzz_target;

const KINDS: [CommandKind; 10] = [
    CommandKind::SetAddress,
    CommandKind::SetTxPower,
    CommandKind::SetInterval,
    CommandKind::SetChannelMask,
    CommandKind::SetPayload,
    CommandKind::SetScanResponse,
    CommandKind::AdvStart,
    CommandKind::AdvStop,
    CommandKind::ScanStart,
    CommandKind::ScanStop,
];

fn discard(_: &ScanReport) {}

fuzz_target!(|data: &[u8]| {
    let Some((&flags, ops)) = data.split_first() else {
        return;
    };
    let mut config = RadioConfig::default();
    config.capabilities.coexistence = flags & 1 != 0;

    let channel = RadioEventChannel::new();
    let sim = SimRadio::new(channel.sender()).with_factory_address(RadioAddress::new([7; 6]));
    let Ok(mut radio) = BleRadio::new(config, sim, SimDelay::new(), &channel) else {
        return;
    };
    if radio.init().is_err() {
        return;
    }
    let _ = radio.set_scan_params(Duration::from_millis(10), Duration::from_millis(30));

    for pair in ops.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1]);
        let kind = KINDS[arg as usize % KINDS.len()];
        match op % 14 {
            0 => {
                let _ = radio.adv_start();
            }
            1 => {
                let _ = radio.adv_stop();
            }
            2 => {
                let _ = radio.scan_start(discard);
            }
            3 => {
                let _ = radio.scan_stop();
            }
            4 => {
                let _ = radio.set_tx_power(arg as i8);
            }
            5 => {
                let _ = radio.set_interval(Duration::from_millis(u64::from(arg) * 50));
            }
            6 => {
                let _ = radio.enable_channel_bits(arg);
            }
            7 => {
                let _ = radio.set_payload(&ops[..(arg as usize).min(ops.len())]);
            }
            8 => radio.driver_mut().script(kind, SimResponse::Fault(arg)),
            9 => radio.driver_mut().script(kind, SimResponse::Silent),
            10 => radio.driver_mut().script(kind, SimResponse::Reject),
            11 => {
                if radio.driver().air().advertising {
                    radio.driver_mut().drop_advertising();
                }
            }
            12 => {
                radio.driver().post(DriverEvent::Ack(CommandId(u32::from(arg))));
            }
            _ => radio.service(Duration::from_millis(u64::from(arg))),
        }
        radio.service(Duration::ZERO);

        let air = radio.driver().air();
        assert_eq!(radio.adv_state().is_active(), air.advertising);
        assert_eq!(radio.scan_state() == ScanState::Scanning, air.scanning);
        if !radio.config().capabilities.coexistence {
            assert!(!(air.advertising && air.scanning));
        }
    }

    let _ = radio.uninit();
    assert!(!radio.is_initialized());
});
