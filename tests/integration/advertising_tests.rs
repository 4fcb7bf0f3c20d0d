//! Advertising through the public surface, against the simulated radio.

use std::time::Duration;

use ble_radio_hal::Error;
use ble_radio_hal::ad;
use ble_radio_hal::arbiter::channel::DriverEvent;
use ble_radio_hal::arbiter::command::CommandKind;
use ble_radio_hal::config::RadioConfig;
use ble_radio_hal::controller::advertising::AdvState;
use ble_radio_hal::model::{AdvertisementType, ChannelMask, RadioAddress};

use super::support::{self, FACTORY_ADDRESS};

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn operations_before_init_are_refused() {
    let mut radio = support::radio_with(RadioConfig::default());
    assert_eq!(radio.adv_state(), AdvState::Uninit);
    assert_eq!(radio.adv_start(), Err(Error::NotInitialized));
    assert_eq!(radio.set_tx_power(0), Err(Error::NotInitialized));
    assert_eq!(radio.set_interval(Duration::from_millis(200)), Err(Error::NotInitialized));
    assert_eq!(radio.uninit(), Err(Error::NotInitialized));
    assert!(!radio.driver().is_powered());
}

#[test]
fn init_twice_is_already_initialized() {
    let mut radio = support::radio();
    assert_eq!(radio.init(), Err(Error::AlreadyInitialized));
    assert_eq!(radio.adv_state(), AdvState::Idle);
}

#[test]
fn init_loads_defaults() {
    let radio = support::radio();
    assert!(radio.driver().is_powered());
    assert_eq!(radio.address(), Some(RadioAddress::new(FACTORY_ADDRESS)));
    assert_eq!(radio.get_type(), AdvertisementType::NonConnNonScan);
    assert_eq!(radio.get_tx_power(), 0);
    assert_eq!(radio.get_interval(), Duration::from_millis(1010));
    assert_eq!(radio.channels(), ChannelMask::ALL);
    assert_eq!(radio.manufacturer_id(), 0xFFFF);
    assert!(radio.payload().is_empty());
}

#[test]
fn power_failure_on_init_is_hardware_fault() {
    let mut radio = support::radio_with(RadioConfig::default());
    radio.driver_mut().fail_power(true);
    assert!(matches!(radio.init(), Err(Error::HardwareFault(_))));
    assert!(!radio.is_initialized());
    radio.driver_mut().fail_power(false);
    assert!(radio.init().is_ok());
}

#[test]
fn uninit_stops_advertising_and_resets_config() {
    let mut radio = support::radio();
    radio.set_tx_power(4).unwrap();
    radio.adv_start().unwrap();
    radio.uninit().unwrap();
    assert_eq!(radio.adv_state(), AdvState::Uninit);
    assert!(!radio.driver().air().advertising);
    assert!(!radio.driver().is_powered());

    radio.init().unwrap();
    assert_eq!(radio.get_tx_power(), 0);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn tx_power_rounds_up_to_supported_level() {
    let mut radio = support::radio();
    radio.set_tx_power(-5).unwrap();
    assert_eq!(radio.get_tx_power(), -4);
    radio.set_tx_power(-100).unwrap();
    assert_eq!(radio.get_tx_power(), -40);
    assert_eq!(radio.set_tx_power(10), Err(Error::OutOfRange));
    assert_eq!(radio.get_tx_power(), -40);
}

#[test]
fn interval_is_clamped_and_reported() {
    let mut radio = support::radio();
    assert_eq!(radio.set_interval(Duration::from_millis(20)), Ok(Duration::from_millis(100)));
    assert_eq!(radio.set_interval(Duration::from_secs(30)), Ok(Duration::from_millis(10_000)));
    assert_eq!(radio.set_interval(Duration::from_micros(250_100)), Ok(Duration::from_micros(250_000)));
    assert_eq!(radio.get_interval(), Duration::from_micros(250_000));
}

#[test]
fn channel_selection() {
    let mut radio = support::radio();
    radio.enable_channels(&[37, 39]).unwrap();
    assert_eq!(radio.channels(), ChannelMask::CH37 | ChannelMask::CH39);
    assert_eq!(radio.enable_channels(&[36]), Err(Error::Unsupported));
    radio.enable_channel_bits(0b010).unwrap();
    assert_eq!(radio.channels(), ChannelMask::CH38);
    assert_eq!(radio.enable_channel_bits(0b1000), Err(Error::Unsupported));
}

#[test]
fn address_length_checked() {
    let mut radio = support::radio();
    assert_eq!(radio.set_address(&[1, 2, 3]), Err(Error::UnsupportedLength));
    radio.set_address(&[1, 2, 3, 4, 5, 6]).unwrap();
    assert_eq!(radio.address(), Some(RadioAddress::new([1, 2, 3, 4, 5, 6])));
}

#[test]
fn payload_limited_to_24_bytes() {
    let mut radio = support::radio();
    assert_eq!(radio.set_payload(&[0; 25]), Err(Error::UnsupportedLength));
    radio.set_payload(&[5; 24]).unwrap();
    assert_eq!(radio.payload(), &[5; 24]);
}

// ── Start / stop ──────────────────────────────────────────────

#[test]
fn start_applies_committed_configuration() {
    let mut radio = support::radio();
    radio.set_manufacturer_id(0x0499).unwrap();
    radio.set_payload(&[0xAB, 0xCD]).unwrap();
    radio.set_tx_power(4).unwrap();
    radio.adv_start().unwrap();

    assert_eq!(radio.adv_state(), AdvState::Advertising);
    let air = radio.driver().air().clone();
    assert!(air.advertising);
    assert_eq!(air.tx_power, Some(4));
    assert_eq!(air.address, Some(RadioAddress::new(FACTORY_ADDRESS)));
    assert_eq!(air.channels, Some(ChannelMask::ALL));
    assert_eq!(ad::find_manufacturer_data(&air.payload), Some((0x0499, &[0xAB, 0xCD][..])));
}

#[test]
fn start_while_advertising_is_invalid_state() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    assert_eq!(radio.adv_start(), Err(Error::InvalidState));
}

#[test]
fn stop_twice_is_harmless() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.adv_stop().unwrap();
    let commands = radio.driver().commands().len();
    radio.adv_stop().unwrap();
    assert_eq!(radio.adv_state(), AdvState::Idle);
    assert_eq!(radio.driver().commands().len(), commands);
}

#[test]
fn address_and_type_locked_while_advertising() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    assert_eq!(radio.set_address(&[9; 6]), Err(Error::InvalidState));
    assert_eq!(radio.set_type(AdvertisementType::ConnScan), Err(Error::InvalidState));
    radio.adv_stop().unwrap();
    radio.set_type(AdvertisementType::ConnScan).unwrap();
}

#[test]
fn empty_channel_mask_blocks_start() {
    let mut radio = support::radio();
    radio.enable_channels(&[]).unwrap();
    assert_eq!(radio.adv_start(), Err(Error::IncompleteConfig));
    assert_eq!(radio.driver().commands().len(), 0);
}

#[test]
fn empty_channel_mask_refused_while_advertising() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    assert_eq!(radio.enable_channels(&[]), Err(Error::InvalidState));
    assert_eq!(radio.channels(), ChannelMask::ALL);
}

#[test]
fn missing_address_is_incomplete_config() {
    let mut radio = support::radio_without_address();
    assert_eq!(radio.address(), None);
    assert_eq!(radio.adv_start(), Err(Error::IncompleteConfig));
    radio.set_address(&[1, 2, 3, 4, 5, 6]).unwrap();
    assert!(radio.adv_start().is_ok());
}

// ── Live updates ──────────────────────────────────────────────

#[test]
fn tx_power_change_restarts_advertising() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().clear_log();

    radio.set_tx_power(-8).unwrap();
    assert_eq!(
        radio.driver().kinds(),
        [CommandKind::AdvStop, CommandKind::SetTxPower, CommandKind::AdvStart]
    );
    assert_eq!(radio.adv_state(), AdvState::Advertising);
    assert_eq!(radio.get_tx_power(), -8);
    assert_eq!(radio.driver().air().tx_power, Some(-8));
}

#[test]
fn interval_change_while_advertising_is_applied() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    let applied = radio.set_interval(Duration::from_millis(500)).unwrap();
    assert_eq!(applied, Duration::from_millis(500));
    assert_eq!(
        radio.driver().air().interval.map(|i| i.as_duration()),
        Some(Duration::from_millis(500))
    );
    assert!(radio.driver().air().advertising);
}

#[test]
fn send_requires_advertising() {
    let mut radio = support::radio();
    assert_eq!(radio.send(&[1, 2, 3]), Err(Error::InvalidState));
    radio.adv_start().unwrap();
    radio.driver_mut().clear_log();

    radio.send(&[1, 2, 3]).unwrap();
    // Payload goes out live, no restart.
    assert_eq!(radio.driver().kinds(), [CommandKind::SetPayload]);
    assert_eq!(radio.payload(), &[1, 2, 3]);
    let air = radio.driver().air();
    assert_eq!(ad::find_manufacturer_data(&air.payload), Some((0xFFFF, &[1u8, 2, 3][..])));
}

#[test]
fn scan_response_sub_state() {
    let mut radio = support::radio();
    radio.set_type(AdvertisementType::ConnScan).unwrap();
    radio.setup_scan_response(Some("Ruuvi"), None).unwrap();
    radio.adv_start().unwrap();
    assert_eq!(radio.adv_state(), AdvState::AdvertisingScanResponse);
    assert!(!radio.driver().air().scan_response.is_empty());

    radio.set_scan_response(&[]).unwrap();
    assert_eq!(radio.adv_state(), AdvState::Advertising);
    assert!(radio.scan_response().is_empty());

    radio.setup_scan_response(Some("Ruuvi"), Some(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e)).unwrap();
    assert_eq!(radio.adv_state(), AdvState::AdvertisingScanResponse);

    radio.adv_stop().unwrap();
    assert_eq!(radio.adv_state(), AdvState::Idle);
}

#[test]
fn oversized_scan_response_rejected() {
    let mut radio = support::radio();
    assert_eq!(radio.set_scan_response(&[0; 32]), Err(Error::UnsupportedLength));
    assert_eq!(
        radio.setup_scan_response(Some("a name far too long for the pdu"), None),
        Err(Error::UnsupportedLength)
    );
}

// ── Driver notifications ──────────────────────────────────────

#[test]
fn external_stop_returns_to_idle() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().drop_advertising();
    radio.service(Duration::ZERO);
    assert_eq!(radio.adv_state(), AdvState::Idle);
    assert_eq!(radio.stats().external_stops, 1);
    assert!(radio.adv_start().is_ok());
}

#[test]
fn sent_callback_counts_events() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver().post(DriverEvent::AdvertisementSent);
    radio.driver().post(DriverEvent::AdvertisementSent);
    radio.service(Duration::from_millis(1));
    assert_eq!(support::sent(), 2);
    assert_eq!(radio.stats().advertisements_sent, 2);
}
