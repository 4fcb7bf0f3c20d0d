//! Advertising controller.
//!
//! Builds the command batches for starting, stopping and live-updating
//! advertising, and moves the advertising state machine when they settle.
//!
//! Starting applies the whole committed configuration in one batch:
//!
//! ```text
//!  set_address, set_tx_power, set_interval, set_channel_mask,
//!  set_payload, [set_scan_response], adv_start(type)
//! ```
//!
//! While advertising, TX power, interval and channel mask changes need the
//! radio stopped, so they go out as `adv_stop, set_*, adv_start`.  Payload
//! and scan-response changes are pushed live.

use heapless::Vec;
use log::{error, warn};

use crate::ad;
use crate::app::ports::RadioDriver;
use crate::arbiter::command::{BatchId, Owner, RadioCommand};
use crate::arbiter::{Fault, RadioArbiter, Settlement};
use crate::error::{Error, Result};
use crate::fsm::context::AdvContext;
use crate::fsm::states::build_advertising_table;
use crate::fsm::{Fsm, StateSet};
use crate::model::{AdPayload, AdvertisementType};
use crate::store::{ConfigStore, Setting};

use super::PendingBatches;
use super::scanning::ScanningController;

/// Longest batch the controller builds (a full start).
const MAX_BATCH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvState {
    Uninit,
    Idle,
    Advertising,
    /// Advertising with a scan response configured on a scannable type.
    AdvertisingScanResponse,
}

impl AdvState {
    /// The radio is (or should be) on air.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Advertising | Self::AdvertisingScanResponse)
    }
}

impl StateSet for AdvState {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Start { scan_response: bool },
    Stop,
    Restart { scan_response: bool },
    Payload,
    ScanResponse { active: bool },
}

pub struct AdvertisingController {
    fsm: Fsm<AdvState, AdvContext, 4>,
    ctx: AdvContext,
    pending: PendingBatches<Intent>,
}

impl Default for AdvertisingController {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvertisingController {
    pub fn new() -> Self {
        Self {
            fsm: Fsm::new(build_advertising_table(), AdvState::Uninit),
            ctx: AdvContext::default(),
            pending: PendingBatches::new(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> AdvState {
        self.fsm.current_state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// A batch from this controller has not settled yet.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn fault(&self) -> Option<Fault> {
        self.ctx.fault
    }

    /// Advertising sessions started since `init()`.
    pub fn sessions(&self) -> u32 {
        self.ctx.sessions
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn init(&mut self) -> Result<()> {
        if self.state() != AdvState::Uninit {
            return Err(Error::AlreadyInitialized);
        }
        self.go(AdvState::Idle);
        Ok(())
    }

    /// Return to `Uninit` from any state, dropping pending bookkeeping and
    /// the latched fault.  The caller stops the radio first.
    pub fn uninit(&mut self) {
        self.pending.clear();
        if self.state() != AdvState::Uninit {
            self.go(AdvState::Uninit);
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state() == AdvState::Uninit {
            return Err(Error::NotInitialized);
        }
        if let Some(fault) = self.ctx.fault {
            return Err(Error::HardwareFault(fault.reason));
        }
        Ok(())
    }

    // ── Start / stop ──────────────────────────────────────────

    /// Queue the start batch built from the committed configuration.
    /// Allowed while advertising only when a stop is already queued, in
    /// which case the start runs after it.
    pub fn start<D: RadioDriver>(
        &mut self,
        arbiter: &mut RadioArbiter<D>,
        store: &ConfigStore,
        scan: &ScanningController,
        coexistence: bool,
    ) -> Result<BatchId> {
        self.ensure_usable()?;
        // A start may queue behind a stop; anything else must settle first.
        if self.pending.last() != Some(Intent::Stop) {
            if self.is_active() {
                return Err(Error::InvalidState);
            }
            if self.has_pending() {
                return Err(Error::RadioBusy);
            }
        }
        if self.pending.is_full() {
            return Err(Error::RadioBusy);
        }
        if scan.has_pending() || (!coexistence && scan.is_active()) {
            warn!("advertising start refused: scanner holds the radio");
            return Err(Error::RadioBusy);
        }
        if let Some(field) = store.missing_for_advertising() {
            warn!("advertising start refused: {:?} unset", field);
            return Err(Error::IncompleteConfig);
        }
        let address = store.address().ok_or(Error::IncompleteConfig)?;
        let adv_type = store.adv_type();

        let mut batch: Vec<RadioCommand, MAX_BATCH> = Vec::new();
        let _ = batch.push(RadioCommand::SetAddress(address));
        let _ = batch.push(RadioCommand::SetTxPower(store.tx_power()));
        let _ = batch.push(RadioCommand::SetInterval(store.interval()));
        let _ = batch.push(RadioCommand::SetChannelMask(store.channels()));
        let _ = batch.push(RadioCommand::SetPayload(store.encoded_payload()?));
        let scan_response = adv_type.is_scannable() && !store.scan_response().is_empty();
        if scan_response {
            let data = ad_payload(store.scan_response())?;
            let _ = batch.push(RadioCommand::SetScanResponse(data));
        }
        let _ = batch.push(RadioCommand::AdvStart(adv_type));

        let id = arbiter.submit(Owner::Advertising, &batch)?;
        self.pending.push(id, Intent::Start { scan_response });
        Ok(id)
    }

    /// Queue a stop.  `Ok(None)` when there is nothing to stop or a stop is
    /// already queued.
    pub fn stop<D: RadioDriver>(&mut self, arbiter: &mut RadioArbiter<D>) -> Result<Option<BatchId>> {
        self.ensure_usable()?;
        self.submit_stop(arbiter)
    }

    /// Stop ignoring the fault latch.  Used by `uninit()`.
    pub(crate) fn force_stop<D: RadioDriver>(
        &mut self,
        arbiter: &mut RadioArbiter<D>,
    ) -> Result<Option<BatchId>> {
        if self.state() == AdvState::Uninit {
            return Ok(None);
        }
        self.submit_stop(arbiter)
    }

    fn submit_stop<D: RadioDriver>(&mut self, arbiter: &mut RadioArbiter<D>) -> Result<Option<BatchId>> {
        match self.pending.last() {
            Some(Intent::Stop) => return Ok(None),
            None if !self.is_active() => return Ok(None),
            _ => {}
        }
        if self.pending.is_full() {
            return Err(Error::RadioBusy);
        }
        let id = arbiter.submit(Owner::Advertising, &[RadioCommand::AdvStop])?;
        self.pending.push(id, Intent::Stop);
        Ok(Some(id))
    }

    // ── Live reconfiguration ──────────────────────────────────

    /// Apply `setting` to the running radio.  `Ok(None)` when the radio is
    /// not advertising (or the field does not touch it) and the store can
    /// take the value directly.  Refused while any batch of this controller
    /// is unsettled, since the radio may not match the store yet.
    pub fn reconfigure<D: RadioDriver>(
        &mut self,
        arbiter: &mut RadioArbiter<D>,
        store: &ConfigStore,
        setting: &Setting,
    ) -> Result<Option<BatchId>> {
        self.ensure_usable()?;
        if self.has_pending() {
            return Err(Error::RadioBusy);
        }
        if !self.is_active() {
            return Ok(None);
        }

        let adv_type = store.adv_type();
        let restarting = self.state() == AdvState::AdvertisingScanResponse;
        let (batch, intent): (Vec<RadioCommand, 3>, Intent) = match setting {
            Setting::TxPower(dbm) => (restart(RadioCommand::SetTxPower(*dbm), adv_type), Intent::Restart {
                scan_response: restarting,
            }),
            Setting::Interval(iv) => (restart(RadioCommand::SetInterval(*iv), adv_type), Intent::Restart {
                scan_response: restarting,
            }),
            Setting::ChannelMask(mask) => (
                restart(RadioCommand::SetChannelMask(*mask), adv_type),
                Intent::Restart { scan_response: restarting },
            ),
            Setting::ManufacturerId(id) => (
                single(RadioCommand::SetPayload(ad::manufacturer_payload(*id, store.payload())?)),
                Intent::Payload,
            ),
            Setting::Payload(data) => (
                single(RadioCommand::SetPayload(ad::manufacturer_payload(store.manufacturer_id(), data)?)),
                Intent::Payload,
            ),
            Setting::ScanResponse(data) if adv_type.is_scannable() => (
                single(RadioCommand::SetScanResponse(data.clone())),
                Intent::ScanResponse { active: !data.is_empty() },
            ),
            _ => return Ok(None),
        };

        let id = arbiter.submit(Owner::Advertising, &batch)?;
        self.pending.push(id, intent);
        Ok(Some(id))
    }

    // ── Settlement ────────────────────────────────────────────

    /// Apply the outcome of one of this controller's batches.
    pub fn settle(&mut self, settlement: &Settlement) {
        let Some(intent) = self.pending.take(settlement.batch) else {
            warn!("advertising: settlement for unknown batch {:?}", settlement.batch);
            return;
        };

        match (intent, settlement.outcome) {
            (Intent::Start { scan_response } | Intent::Restart { scan_response }, Ok(())) => {
                self.enter_on_air(scan_response);
            }
            (Intent::Stop, Ok(())) => {
                if self.is_active() {
                    self.go(AdvState::Idle);
                }
            }
            (Intent::Payload, Ok(())) => {}
            (Intent::ScanResponse { active }, Ok(())) => match self.state() {
                AdvState::Advertising if active => self.go(AdvState::AdvertisingScanResponse),
                AdvState::AdvertisingScanResponse if !active => self.go(AdvState::Advertising),
                _ => {}
            },
            (intent, Err(fault)) => {
                self.ctx.fault = Some(fault);
                if matches!(intent, Intent::Restart { .. }) && settlement.radio_stopped && self.is_active() {
                    self.go(AdvState::Idle);
                }
            }
        }
    }

    /// The stack stopped advertising on its own.
    pub fn external_stop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.go(AdvState::Idle);
        true
    }

    fn enter_on_air(&mut self, scan_response: bool) {
        if self.state() == AdvState::Idle {
            self.go(AdvState::Advertising);
        }
        if scan_response {
            self.go(AdvState::AdvertisingScanResponse);
        } else {
            self.go(AdvState::Advertising);
        }
    }

    fn go(&mut self, next: AdvState) {
        if let Err(e) = self.fsm.transition(next, &mut self.ctx) {
            error!("advertising: illegal transition {:?} -> {:?}", e.from, e.to);
        }
    }
}

fn restart(command: RadioCommand, adv_type: AdvertisementType) -> Vec<RadioCommand, 3> {
    let mut batch = Vec::new();
    let _ = batch.push(RadioCommand::AdvStop);
    let _ = batch.push(command);
    let _ = batch.push(RadioCommand::AdvStart(adv_type));
    batch
}

fn single(command: RadioCommand) -> Vec<RadioCommand, 3> {
    let mut batch = Vec::new();
    let _ = batch.push(command);
    batch
}

fn ad_payload(data: &[u8]) -> Result<AdPayload> {
    AdPayload::from_slice(data).map_err(|_| Error::UnsupportedLength)
}
