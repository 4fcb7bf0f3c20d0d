//! Radio service: the public operation surface.
//!
//! [`BleRadio`] owns the arbiter, the configuration store and both
//! controllers.  It exposes a hardware-agnostic API; all radio I/O flows
//! through the [`RadioDriver`] port and the driver event channel, so the
//! whole service runs against the simulator in host tests.
//!
//! ```text
//!   caller ──▶ ┌──────────────────────────────────┐ ──▶ RadioDriver
//!              │            BleRadio              │
//!              │ validator · store · controllers  │
//!   callbacks ◀│            arbiter               │◀── DriverEvent channel
//!              └──────────────────────────────────┘
//! ```
//!
//! Every mutating operation comes in a blocking form that returns once the
//! radio has acknowledged (or failed) the change.  Blocking waits poll the
//! event channel, sleeping `poll_interval_us` between polls and charging
//! that time to the acknowledgement watchdog, so they always terminate.
//!
//! Start and stop also come in a non-blocking form returning a
//! [`PendingToken`]; the caller then drives [`BleRadio::service`] and
//! resolves the token with [`BleRadio::poll_token`].  Callbacks (scan
//! reports, fault handler, sent notifications) only ever run inside these
//! calls, on the caller's thread.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use heapless::Deque;
use log::{error, info, warn};

use crate::ad;
use crate::arbiter::channel::{DriverEvent, RadioEventChannel, RadioEventReceiver};
use crate::arbiter::command::{BatchId, Owner};
use crate::arbiter::{Fault, QUEUE_DEPTH, RadioArbiter};
use crate::config::{CapabilityError, RadioConfig};
use crate::controller::advertising::{AdvState, AdvertisingController};
use crate::controller::scanning::{ScanState, ScanningController};
use crate::diagnostics::RadioStats;
use crate::error::{Error, FaultReason, Result};
use crate::model::{AdPayload, AdvertisementType, ChannelMask, RadioAddress, ScanParams};
use crate::store::{CommitGuard, ConfigStore, Field, ManufacturerData, Setting};
use crate::validator;

use super::ports::{FaultHandler, RadioDriver, ScanCallback, SentCallback};

/// Outcomes kept for tokens that have not been polled yet.
const OUTCOME_DEPTH: usize = QUEUE_DEPTH;

// ───────────────────────────────────────────────────────────────
// Pending tokens
// ───────────────────────────────────────────────────────────────

/// Handle to a non-blocking start or stop.  Resolves exactly once: it is
/// consumed by [`BleRadio::poll_token`] and handed back while pending.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending token must be polled to observe its outcome"]
pub struct PendingToken {
    /// `None` when nothing had to be sent to the radio.
    batch: Option<BatchId>,
}

impl PendingToken {
    /// The operation needed no radio command and has already succeeded.
    pub fn is_immediate(&self) -> bool {
        self.batch.is_none()
    }
}

/// Result of polling a [`PendingToken`].
#[derive(Debug, PartialEq, Eq)]
pub enum TokenPoll {
    Ready(Result<()>),
    Pending(PendingToken),
}

// ───────────────────────────────────────────────────────────────
// BleRadio
// ───────────────────────────────────────────────────────────────

pub struct BleRadio<'ch, D: RadioDriver, T: DelayNs> {
    config: RadioConfig,
    arbiter: RadioArbiter<D>,
    store: ConfigStore,
    adv: AdvertisingController,
    scan: ScanningController,
    events: RadioEventReceiver<'ch>,
    delay: T,
    outcomes: Deque<(BatchId, core::result::Result<(), Fault>), OUTCOME_DEPTH>,
    fault_handler: Option<FaultHandler>,
    sent_callback: Option<SentCallback>,
}

impl<'ch, D: RadioDriver, T: DelayNs> BleRadio<'ch, D, T> {
    /// Build the service.  The radio stays powered down until [`init`](Self::init).
    pub fn new(
        config: RadioConfig,
        driver: D,
        delay: T,
        events: &'ch RadioEventChannel,
    ) -> core::result::Result<Self, CapabilityError> {
        config.check()?;
        let arbiter = RadioArbiter::new(driver, &config.arbiter);
        let store = ConfigStore::new(&config.capabilities);
        Ok(Self {
            arbiter,
            store,
            adv: AdvertisingController::new(),
            scan: ScanningController::new(),
            events: events.receiver(),
            delay,
            outcomes: Deque::new(),
            fault_handler: None,
            sent_callback: None,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Power the radio up and load the capability defaults.
    pub fn init(&mut self) -> Result<()> {
        if self.store.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        // Completions left over from a previous session are stale.
        self.pump();

        if let Err(e) = self.arbiter.driver_mut().enable() {
            error!("radio enable failed: {}", e);
            return Err(Error::HardwareFault(FaultReason::PowerFailure));
        }
        let address = self.arbiter.driver().factory_address();
        self.store.init(&self.config.capabilities, address);
        self.adv.init()?;
        self.scan.init()?;
        info!("radio initialised, address {:?}", address);
        Ok(())
    }

    /// Stop all radio activity and power down.  Always ends uninitialised;
    /// returns the first fault hit on the way.
    pub fn uninit(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.wait_while(|r| !r.arbiter.is_idle());

        let mut result = Ok(());
        let adv_stop = self.adv.force_stop(&mut self.arbiter);
        keep_first(&mut result, self.finish(adv_stop));
        let scan_stop = self.scan.force_stop(&mut self.arbiter);
        keep_first(&mut result, self.finish(scan_stop));

        self.adv.uninit();
        self.scan.uninit();
        self.store.clear(&self.config.capabilities);
        self.outcomes.clear();
        if let Err(e) = self.arbiter.driver_mut().disable() {
            error!("radio disable failed: {}", e);
            keep_first(&mut result, Err(Error::HardwareFault(FaultReason::PowerFailure)));
        }
        info!("radio uninitialised");
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    // ── Advertising configuration ─────────────────────────────

    pub fn set_type(&mut self, adv_type: AdvertisementType) -> Result<()> {
        self.apply(Setting::AdvType(adv_type))
    }

    pub fn get_type(&self) -> AdvertisementType {
        self.store.adv_type()
    }

    /// Set the 6-byte device address (over-the-air byte order).
    pub fn set_address(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        let address = validator::validate_address(bytes)?;
        self.apply(Setting::Address(address))
    }

    pub fn address(&self) -> Option<RadioAddress> {
        self.store.address()
    }

    pub fn set_manufacturer_id(&mut self, id: u16) -> Result<()> {
        self.apply(Setting::ManufacturerId(id))
    }

    /// Configured company identifier; `0xFFFF` when unset.
    pub fn manufacturer_id(&self) -> u16 {
        self.store.manufacturer_id()
    }

    /// Select the TX power.  The request is rounded up to the next
    /// supported level; read it back with [`get_tx_power`](Self::get_tx_power).
    pub fn set_tx_power(&mut self, dbm: i8) -> Result<()> {
        self.ensure_initialized()?;
        let level = validator::validate_tx_power(&self.config.capabilities, dbm)?;
        self.apply(Setting::TxPower(level))
    }

    /// TX power level in use, in dBm.
    pub fn get_tx_power(&self) -> i8 {
        self.store.tx_power()
    }

    /// Set the advertising interval.  Returns the interval actually applied
    /// (rounded to 0.625 ms and clamped to the hardware bounds).
    pub fn set_interval(&mut self, interval: Duration) -> Result<Duration> {
        self.ensure_initialized()?;
        let applied = validator::validate_interval(&self.config.capabilities, interval);
        self.apply(Setting::Interval(applied))?;
        Ok(applied.as_duration())
    }

    pub fn get_interval(&self) -> Duration {
        self.store.interval().as_duration()
    }

    /// Advertise on exactly `channels` (each of 37, 38, 39).
    pub fn enable_channels(&mut self, channels: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        let mask = validator::validate_channels(channels)?;
        self.apply(Setting::ChannelMask(mask))
    }

    /// Same as [`enable_channels`](Self::enable_channels) with a raw mask,
    /// bit 0 = channel 37.
    pub fn enable_channel_bits(&mut self, bits: u8) -> Result<()> {
        self.ensure_initialized()?;
        let mask = validator::validate_channel_bits(bits)?;
        self.apply(Setting::ChannelMask(mask))
    }

    pub fn channels(&self) -> ChannelMask {
        self.store.channels()
    }

    /// Build and install a scan response with a complete local name and/or
    /// a 128-bit service UUID.  Both `None` clears it.
    pub fn setup_scan_response(&mut self, name: Option<&str>, service_uuid: Option<u128>) -> Result<()> {
        self.ensure_initialized()?;
        let data = ad::scan_response(name, service_uuid)?;
        self.apply(Setting::ScanResponse(data))
    }

    /// Install pre-encoded scan-response AD structures.  Empty clears it.
    pub fn set_scan_response(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        validator::validate_scan_response(data)?;
        let data = AdPayload::from_slice(data).map_err(|_| Error::UnsupportedLength)?;
        self.apply(Setting::ScanResponse(data))
    }

    pub fn scan_response(&self) -> &[u8] {
        self.store.scan_response()
    }

    /// Set the manufacturer-specific application data (up to 24 bytes).
    /// Pushed to the radio without interrupting advertising.
    pub fn set_payload(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        validator::validate_manufacturer_data(data)?;
        let data = ManufacturerData::from_slice(data).map_err(|_| Error::UnsupportedLength)?;
        self.apply(Setting::Payload(data))
    }

    pub fn payload(&self) -> &[u8] {
        self.store.payload()
    }

    /// Publish new data on an ongoing advertisement.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        self.pump();
        if !self.adv.is_active() {
            return Err(Error::InvalidState);
        }
        self.set_payload(data)
    }

    // ── Scanning configuration ────────────────────────────────

    pub fn set_scan_params(&mut self, window: Duration, interval: Duration) -> Result<()> {
        self.ensure_initialized()?;
        let params = validator::validate_scan_params(&self.config.capabilities, window, interval)?;
        self.apply(Setting::ScanParams(params))
    }

    pub fn scan_params(&self) -> Option<ScanParams> {
        self.store.scan_params()
    }

    // ── Start / stop (blocking) ───────────────────────────────

    pub fn adv_start(&mut self) -> Result<()> {
        let token = self.request_adv_start()?;
        self.wait_token(token)
    }

    pub fn adv_stop(&mut self) -> Result<()> {
        let token = self.request_adv_stop()?;
        self.wait_token(token)?;
        self.wait_while(|r| r.adv.has_pending());
        match self.adv.fault() {
            Some(fault) => Err(Error::HardwareFault(fault.reason)),
            None => Ok(()),
        }
    }

    pub fn scan_start(&mut self, callback: ScanCallback) -> Result<()> {
        let token = self.request_scan_start(callback)?;
        self.wait_token(token)
    }

    pub fn scan_stop(&mut self) -> Result<()> {
        let token = self.request_scan_stop()?;
        self.wait_token(token)?;
        self.wait_while(|r| r.scan.has_pending());
        match self.scan.fault() {
            Some(fault) => Err(Error::HardwareFault(fault.reason)),
            None => Ok(()),
        }
    }

    // ── Start / stop (non-blocking) ───────────────────────────

    pub fn request_adv_start(&mut self) -> Result<PendingToken> {
        self.pump();
        let coexistence = self.config.capabilities.coexistence;
        let batch = self.adv.start(&mut self.arbiter, &self.store, &self.scan, coexistence)?;
        Ok(PendingToken { batch: Some(batch) })
    }

    /// Queue an advertising stop.  A stop requested while a start is still
    /// pending runs after it, cancelling the start's effect.
    pub fn request_adv_stop(&mut self) -> Result<PendingToken> {
        self.pump();
        let batch = self.adv.stop(&mut self.arbiter)?;
        Ok(PendingToken { batch })
    }

    pub fn request_scan_start(&mut self, callback: ScanCallback) -> Result<PendingToken> {
        self.pump();
        let coexistence = self.config.capabilities.coexistence;
        let batch = self
            .scan
            .start(&mut self.arbiter, &self.store, &self.adv, coexistence, callback)?;
        Ok(PendingToken { batch: Some(batch) })
    }

    pub fn request_scan_stop(&mut self) -> Result<PendingToken> {
        self.pump();
        let batch = self.scan.stop(&mut self.arbiter)?;
        Ok(PendingToken { batch })
    }

    /// Process driver events and advance the watchdog by `elapsed`.  Call
    /// periodically while tokens are outstanding or scanning is active.
    pub fn service(&mut self, elapsed: Duration) {
        self.pump();
        let us = elapsed.as_micros().min(u32::MAX as u128) as u32;
        self.arbiter.tick(us);
        self.pump();
    }

    /// Resolve `token` if its operation has settled.
    pub fn poll_token(&mut self, token: PendingToken) -> TokenPoll {
        let Some(batch) = token.batch else {
            return TokenPoll::Ready(Ok(()));
        };
        self.pump();
        if let Some(outcome) = self.claim(batch) {
            return TokenPoll::Ready(outcome);
        }
        if self.arbiter.is_pending(batch) {
            return TokenPoll::Pending(token);
        }
        warn!("outcome of batch {:?} no longer available", batch);
        TokenPoll::Ready(Err(Error::InvalidState))
    }

    // ── Queries and handlers ──────────────────────────────────

    pub fn adv_state(&self) -> AdvState {
        self.adv.state()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan.state()
    }

    /// Fault latched on the advertising or scanning controller.
    pub fn latched_fault(&self, owner: Owner) -> Option<Fault> {
        match owner {
            Owner::Advertising => self.adv.fault(),
            Owner::Scanning => self.scan.fault(),
        }
    }

    /// Register the handler that sees every hardware fault.
    pub fn set_fault_handler(&mut self, handler: Option<FaultHandler>) {
        self.fault_handler = handler;
    }

    /// Register a callback for each advertising event sent on air.
    pub fn set_sent_callback(&mut self, callback: Option<SentCallback>) {
        self.sent_callback = callback;
    }

    pub fn stats(&self) -> RadioStats {
        *self.arbiter.stats()
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        self.arbiter.driver()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        self.arbiter.driver_mut()
    }

    // ── Internals ─────────────────────────────────────────────

    fn ensure_initialized(&self) -> Result<()> {
        if !self.store.is_initialized() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn guard(&self) -> CommitGuard {
        CommitGuard {
            busy: self.arbiter.busy_resources(),
            adv: self.adv.state(),
            scan: self.scan.state(),
        }
    }

    /// Validate-then-commit path shared by every setter.  While advertising,
    /// the radio takes the new value first and the store follows only once
    /// it has been acknowledged.
    fn apply(&mut self, setting: Setting) -> Result<()> {
        self.ensure_initialized()?;
        self.pump();
        self.store.check(&setting, &self.guard())?;
        if setting.field() != Field::ScanParams {
            let live = self.adv.reconfigure(&mut self.arbiter, &self.store, &setting)?;
            if let Some(batch) = live {
                self.wait_for(batch)?;
            }
        }
        self.store.commit(setting, &self.guard())?;
        Ok(())
    }

    fn finish(&mut self, submitted: Result<Option<BatchId>>) -> Result<()> {
        match submitted? {
            Some(batch) => self.wait_for(batch),
            None => Ok(()),
        }
    }

    fn wait_token(&mut self, token: PendingToken) -> Result<()> {
        match token.batch {
            Some(batch) => self.wait_for(batch),
            None => Ok(()),
        }
    }

    /// Block until `batch` settles.
    fn wait_for(&mut self, batch: BatchId) -> Result<()> {
        let poll_us = self.config.arbiter.poll_interval_us;
        loop {
            self.pump();
            if let Some(outcome) = self.claim(batch) {
                return outcome;
            }
            if !self.arbiter.is_pending(batch) {
                error!("batch {:?} settled without a recorded outcome", batch);
                return Err(Error::InvalidState);
            }
            self.delay.delay_us(poll_us);
            self.arbiter.tick(poll_us);
        }
    }

    /// Block while `cond` holds.  Terminates because every in-flight
    /// command settles within the watchdog budget.
    fn wait_while(&mut self, cond: fn(&Self) -> bool) {
        let poll_us = self.config.arbiter.poll_interval_us;
        self.pump();
        while cond(self) {
            self.delay.delay_us(poll_us);
            self.arbiter.tick(poll_us);
            self.pump();
        }
    }

    /// Drain the event channel and route settlements.
    fn pump(&mut self) {
        while let Ok(event) = self.events.try_receive() {
            self.on_event(event);
            self.collect_settlements();
        }
        self.collect_settlements();
    }

    fn on_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Ack(id) => self.arbiter.on_ack(id),
            DriverEvent::Fault(id, code) => self.arbiter.on_fault(id, code),
            DriverEvent::AdvertisingStopped => {
                if self.adv.external_stop() {
                    info!("advertising stopped by the radio stack");
                    let stats = self.arbiter.stats_mut();
                    stats.external_stops = stats.external_stops.wrapping_add(1);
                }
            }
            DriverEvent::AdvertisementSent => {
                let stats = self.arbiter.stats_mut();
                stats.advertisements_sent = stats.advertisements_sent.wrapping_add(1);
                if let Some(callback) = self.sent_callback {
                    callback();
                }
            }
            DriverEvent::Report(report) => {
                let delivered = self.scan.deliver(&report);
                let stats = self.arbiter.stats_mut();
                if delivered {
                    stats.scan_reports = stats.scan_reports.wrapping_add(1);
                } else {
                    stats.reports_dropped = stats.reports_dropped.wrapping_add(1);
                }
            }
        }
    }

    fn collect_settlements(&mut self) {
        while let Some(settlement) = self.arbiter.take_settlement() {
            match settlement.owner {
                Owner::Advertising => self.adv.settle(&settlement),
                Owner::Scanning => self.scan.settle(&settlement),
            }
            if let Err(fault) = &settlement.outcome {
                if let Some(handler) = self.fault_handler {
                    handler(fault);
                }
            }
            if self.outcomes.is_full() {
                if let Some((stale, _)) = self.outcomes.pop_front() {
                    warn!("dropping unclaimed outcome of batch {:?}", stale);
                }
            }
            let _ = self.outcomes.push_back((settlement.batch, settlement.outcome));
        }
    }

    /// Take the recorded outcome of `batch`, if any.
    fn claim(&mut self, batch: BatchId) -> Option<Result<()>> {
        let mut found = None;
        for _ in 0..self.outcomes.len() {
            let Some(entry) = self.outcomes.pop_front() else {
                break;
            };
            if found.is_none() && entry.0 == batch {
                found = Some(entry.1.map_err(|fault| Error::HardwareFault(fault.reason)));
            } else {
                let _ = self.outcomes.push_back(entry);
            }
        }
        found
    }
}

fn keep_first(result: &mut Result<()>, next: Result<()>) {
    if result.is_ok() {
        *result = next;
    }
}
