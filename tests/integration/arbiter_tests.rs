//! Command arbitration, fault handling and the non-blocking surface.

use std::time::Duration;

use ble_radio_hal::adapters::sim::SimResponse;
use ble_radio_hal::arbiter::channel::DriverEvent;
use ble_radio_hal::arbiter::command::{CommandKind, Owner};
use ble_radio_hal::controller::advertising::AdvState;
use ble_radio_hal::controller::scanning::ScanState;
use ble_radio_hal::error::FaultReason;
use ble_radio_hal::{Error, TokenPoll};

use super::support::{self, record_report};

// ── Hardware faults ───────────────────────────────────────────

#[test]
fn fault_during_start_leaves_idle() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetTxPower, SimResponse::Fault(0x08));

    assert_eq!(
        radio.adv_start(),
        Err(Error::HardwareFault(FaultReason::Reported(0x08)))
    );
    assert_eq!(radio.adv_state(), AdvState::Idle);
    // The rest of the batch was dropped.
    assert_eq!(radio.driver().count(CommandKind::AdvStart), 0);
    assert!(!radio.driver().air().advertising);

    let faults = support::faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].owner, Owner::Advertising);
    assert_eq!(faults[0].command, CommandKind::SetTxPower);
    assert_eq!(faults[0].reason, FaultReason::Reported(0x08));
}

#[test]
fn fault_stays_latched_until_reinit() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::AdvStart, SimResponse::Fault(0x21));
    assert!(radio.adv_start().is_err());

    let latched = radio.latched_fault(Owner::Advertising).unwrap();
    assert_eq!(latched.command, CommandKind::AdvStart);
    assert_eq!(
        radio.adv_start(),
        Err(Error::HardwareFault(FaultReason::Reported(0x21)))
    );
    assert_eq!(radio.latched_fault(Owner::Scanning), None);

    radio.uninit().unwrap();
    radio.init().unwrap();
    assert_eq!(radio.latched_fault(Owner::Advertising), None);
    radio.adv_start().unwrap();
    assert_eq!(radio.adv_state(), AdvState::Advertising);
}

#[test]
fn advertising_fault_does_not_block_scanning() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetAddress, SimResponse::Fault(0x01));
    assert!(radio.adv_start().is_err());

    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();
    radio.scan_start(record_report).unwrap();
    assert_eq!(radio.scan_state(), ScanState::Scanning);
}

#[test]
fn scan_start_fault_latches_scanner() {
    let mut radio = support::radio();
    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();
    radio.driver_mut().script(CommandKind::ScanStart, SimResponse::Fault(0x0C));
    assert_eq!(
        radio.scan_start(record_report),
        Err(Error::HardwareFault(FaultReason::Reported(0x0C)))
    );
    assert_eq!(radio.scan_state(), ScanState::Idle);
    assert_eq!(support::faults()[0].owner, Owner::Scanning);
}

#[test]
fn synchronous_reject_is_a_fault() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::AdvStart, SimResponse::Reject);
    assert_eq!(
        radio.adv_start(),
        Err(Error::HardwareFault(FaultReason::Rejected))
    );
    assert_eq!(radio.adv_state(), AdvState::Idle);
}

#[test]
fn failed_stop_keeps_advertising() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().script(CommandKind::AdvStop, SimResponse::Fault(0x02));
    assert_eq!(
        radio.adv_stop(),
        Err(Error::HardwareFault(FaultReason::Reported(0x02)))
    );
    assert_eq!(radio.adv_state(), AdvState::Advertising);
    assert!(radio.driver().air().advertising);
}

#[test]
fn failed_restart_after_stop_goes_idle() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().script(CommandKind::SetTxPower, SimResponse::Fault(0x04));

    assert_eq!(
        radio.set_tx_power(-4),
        Err(Error::HardwareFault(FaultReason::Reported(0x04)))
    );
    assert_eq!(radio.adv_state(), AdvState::Idle);
    assert!(!radio.driver().air().advertising);
    // Nothing committed.
    assert_eq!(radio.get_tx_power(), 0);
}

// ── Watchdog ──────────────────────────────────────────────────

#[test]
fn silent_driver_times_out() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetAddress, SimResponse::Silent);
    assert_eq!(
        radio.adv_start(),
        Err(Error::HardwareFault(FaultReason::WatchdogTimeout))
    );
    assert_eq!(radio.adv_state(), AdvState::Idle);
    assert_eq!(radio.stats().watchdog_expiries, 1);
}

#[test]
fn late_ack_after_timeout_is_ignored() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetAddress, SimResponse::Silent);
    assert!(radio.adv_start().is_err());

    let (late, _) = radio.driver().commands()[0].clone();
    radio.driver().post(DriverEvent::Ack(late));
    radio.service(Duration::ZERO);

    assert_eq!(radio.stats().stale_completions, 1);
    assert_eq!(radio.adv_state(), AdvState::Idle);
}

// ── Non-blocking surface ──────────────────────────────────────

#[test]
fn token_resolves_after_acks() {
    let mut radio = support::radio();
    radio.driver_mut().defer_acks(true);
    let token = radio.request_adv_start().unwrap();
    assert!(!token.is_immediate());

    let TokenPoll::Pending(token) = radio.poll_token(token) else {
        panic!("start cannot settle before the radio acknowledges");
    };
    assert_eq!(radio.adv_state(), AdvState::Idle);

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::from_micros(50));
    assert_eq!(radio.poll_token(token), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.adv_state(), AdvState::Advertising);
}

#[test]
fn token_reports_fault() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetInterval, SimResponse::Fault(0x3A));
    let token = radio.request_adv_start().unwrap();
    radio.service(Duration::ZERO);
    assert_eq!(
        radio.poll_token(token),
        TokenPoll::Ready(Err(Error::HardwareFault(FaultReason::Reported(0x3A))))
    );
}

#[test]
fn token_times_out_through_service() {
    let mut radio = support::radio();
    radio.driver_mut().script(CommandKind::SetAddress, SimResponse::Silent);
    let token = radio.request_adv_start().unwrap();
    radio.service(Duration::from_millis(50));
    let TokenPoll::Pending(token) = radio.poll_token(token) else {
        panic!("watchdog budget not yet spent");
    };
    radio.service(Duration::from_millis(60));
    assert_eq!(
        radio.poll_token(token),
        TokenPoll::Ready(Err(Error::HardwareFault(FaultReason::WatchdogTimeout)))
    );
}

#[test]
fn stop_with_nothing_to_do_is_immediate() {
    let mut radio = support::radio();
    let token = radio.request_adv_stop().unwrap();
    assert!(token.is_immediate());
    assert_eq!(radio.poll_token(token), TokenPoll::Ready(Ok(())));
}

#[test]
fn stop_queued_behind_start_wins() {
    let mut radio = support::radio();
    radio.driver_mut().defer_acks(true);
    let start = radio.request_adv_start().unwrap();
    let stop = radio.request_adv_stop().unwrap();
    // A second stop piggybacks on the first.
    assert!(radio.request_adv_stop().unwrap().is_immediate());

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::ZERO);

    assert_eq!(radio.poll_token(start), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.poll_token(stop), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.adv_state(), AdvState::Idle);
    assert!(!radio.driver().air().advertising);
}

#[test]
fn commit_on_busy_field_is_radio_busy() {
    let mut radio = support::radio();
    radio.driver_mut().defer_acks(true);
    let token = radio.request_adv_start().unwrap();

    assert_eq!(radio.set_tx_power(4), Err(Error::RadioBusy));
    assert_eq!(radio.set_payload(&[1]), Err(Error::RadioBusy));
    // Scan parameters are not part of the advertising batch.
    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::ZERO);
    assert_eq!(radio.poll_token(token), TokenPoll::Ready(Ok(())));
    radio.set_tx_power(4).unwrap();
}

#[test]
fn fields_stay_locked_until_start_batch_settles() {
    let mut radio = support::radio();
    radio.driver_mut().defer_acks(true);
    let token = radio.request_adv_start().unwrap();
    // Address, TX power, interval and channel mask are acked one by one.
    for _ in 0..4 {
        radio.driver_mut().release();
        radio.service(Duration::ZERO);
    }
    assert_eq!(radio.driver().count(CommandKind::SetChannelMask), 1);
    assert_eq!(radio.adv_state(), AdvState::Idle);

    assert_eq!(radio.set_tx_power(-8), Err(Error::RadioBusy));
    assert_eq!(radio.enable_channels(&[]), Err(Error::RadioBusy));
    assert_eq!(radio.set_address(&[9; 6]), Err(Error::RadioBusy));
    assert_eq!(radio.set_manufacturer_id(0x0042), Err(Error::RadioBusy));

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::ZERO);
    assert_eq!(radio.poll_token(token), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.adv_state(), AdvState::Advertising);

    let air = radio.driver().air().clone();
    assert_eq!(air.tx_power, Some(radio.get_tx_power()));
    assert_eq!(air.channels, Some(radio.channels()));
    assert!(!radio.channels().is_empty());
    assert_eq!(air.address, radio.address());
}

#[test]
fn start_queues_behind_pending_stop() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().defer_acks(true);
    let stop = radio.request_adv_stop().unwrap();
    let start = radio.request_adv_start().unwrap();
    assert_eq!(radio.adv_state(), AdvState::Advertising);

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::ZERO);

    assert_eq!(radio.poll_token(stop), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.poll_token(start), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.adv_state(), AdvState::Advertising);
    assert!(radio.driver().air().advertising);
    assert_eq!(radio.driver().count(CommandKind::AdvStart), 2);
}

#[test]
fn scan_start_queues_behind_pending_stop() {
    let mut radio = support::radio();
    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();
    radio.scan_start(record_report).unwrap();
    radio.driver_mut().defer_acks(true);
    let stop = radio.request_scan_stop().unwrap();
    let start = radio.request_scan_start(record_report).unwrap();

    radio.driver_mut().defer_acks(false);
    radio.driver_mut().release();
    radio.service(Duration::ZERO);

    assert_eq!(radio.poll_token(stop), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.poll_token(start), TokenPoll::Ready(Ok(())));
    assert_eq!(radio.scan_state(), ScanState::Scanning);

    radio.driver().receive(support::report(-55, &[]));
    radio.service(Duration::ZERO);
    assert_eq!(support::reports().len(), 1);
}

#[test]
fn failed_stop_abandons_queued_start() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().defer_acks(true);
    let stop = radio.request_adv_stop().unwrap();
    let start = radio.request_adv_start().unwrap();

    let (held, _) = radio.driver().commands().last().cloned().unwrap();
    radio.driver().post(DriverEvent::Fault(held, 0x0C));
    radio.service(Duration::ZERO);

    let fault = Err(Error::HardwareFault(FaultReason::Reported(0x0C)));
    assert_eq!(radio.poll_token(stop), TokenPoll::Ready(fault));
    assert_eq!(radio.poll_token(start), TokenPoll::Ready(fault));
    assert_eq!(radio.adv_state(), AdvState::Advertising);
    assert_eq!(radio.driver().count(CommandKind::AdvStart), 1);
}

// ── Uninit ────────────────────────────────────────────────────

#[test]
fn uninit_reports_stop_fault_but_still_powers_down() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    radio.driver_mut().script(CommandKind::AdvStop, SimResponse::Fault(0x03));

    assert_eq!(
        radio.uninit(),
        Err(Error::HardwareFault(FaultReason::Reported(0x03)))
    );
    assert!(!radio.is_initialized());
    assert_eq!(radio.adv_state(), AdvState::Uninit);
    assert_eq!(radio.scan_state(), ScanState::Uninit);
    assert!(!radio.driver().is_powered());
}

#[test]
fn uninit_stops_scanning_too() {
    let mut radio = support::coexisting_radio();
    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();
    radio.adv_start().unwrap();
    radio.scan_start(record_report).unwrap();

    radio.uninit().unwrap();
    assert_eq!(radio.driver().count(CommandKind::AdvStop), 1);
    assert_eq!(radio.driver().count(CommandKind::ScanStop), 1);
    assert!(!radio.driver().air().scanning);
}

#[test]
fn power_down_failure_is_reported() {
    let mut radio = support::radio();
    radio.driver_mut().fail_power(true);
    assert_eq!(
        radio.uninit(),
        Err(Error::HardwareFault(FaultReason::PowerFailure))
    );
    assert!(!radio.is_initialized());
}

// ── Diagnostics ───────────────────────────────────────────────

#[test]
fn stats_count_commands() {
    let mut radio = support::radio();
    radio.adv_start().unwrap();
    let stats = radio.stats();
    assert_eq!(stats.commands_issued, 6);
    assert_eq!(stats.commands_acked, 6);
    assert_eq!(stats.commands_faulted, 0);
    assert_eq!(stats.fault_rate_percent(), 0);

    radio.driver_mut().script(CommandKind::AdvStop, SimResponse::Fault(0x01));
    assert!(radio.adv_stop().is_err());
    assert_eq!(radio.stats().commands_faulted, 1);
}

#[test]
fn log_sink_callbacks_plug_in() {
    use ble_radio_hal::adapters::log_sink::{log_fault, log_report, log_sent};

    let mut radio = support::radio();
    radio.set_fault_handler(Some(log_fault));
    radio.set_sent_callback(Some(log_sent));
    radio
        .set_scan_params(Duration::from_millis(10), Duration::from_millis(20))
        .unwrap();
    radio.scan_start(log_report).unwrap();
    radio.driver().receive(support::report(-42, &[0x03, 0xFF, 0x99, 0x04]));
    radio.service(Duration::ZERO);
    assert_eq!(radio.stats().scan_reports, 1);

    radio.driver_mut().script(CommandKind::ScanStop, SimResponse::Fault(0x05));
    assert!(radio.scan_stop().is_err());
    // The recording handler was replaced, so nothing lands there.
    assert!(support::faults().is_empty());
}
