//! Scanning controller.
//!
//! Passive scanning only.  A start is a single `scan_start(params)`
//! command using the committed scan window and interval; reports reach
//! the registered callback only while the state machine is `Scanning`.

use log::{error, warn};

use crate::app::ports::{RadioDriver, ScanCallback};
use crate::arbiter::command::{BatchId, Owner, RadioCommand};
use crate::arbiter::{Fault, RadioArbiter, Settlement};
use crate::error::{Error, Result};
use crate::fsm::context::ScanContext;
use crate::fsm::states::build_scanning_table;
use crate::fsm::{Fsm, StateSet};
use crate::model::ScanReport;
use crate::store::ConfigStore;

use super::PendingBatches;
use super::advertising::AdvertisingController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Uninit,
    Idle,
    Scanning,
}

impl StateSet for ScanState {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy)]
enum Intent {
    /// The callback is installed once the scan is running.
    Start(ScanCallback),
    Stop,
}

pub struct ScanningController {
    fsm: Fsm<ScanState, ScanContext, 3>,
    ctx: ScanContext,
    pending: PendingBatches<Intent>,
}

impl Default for ScanningController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanningController {
    pub fn new() -> Self {
        Self {
            fsm: Fsm::new(build_scanning_table(), ScanState::Uninit),
            ctx: ScanContext::default(),
            pending: PendingBatches::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.fsm.current_state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ScanState::Scanning
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn fault(&self) -> Option<Fault> {
        self.ctx.fault
    }

    pub fn sessions(&self) -> u32 {
        self.ctx.sessions
    }

    pub fn init(&mut self) -> Result<()> {
        if self.state() != ScanState::Uninit {
            return Err(Error::AlreadyInitialized);
        }
        self.go(ScanState::Idle);
        Ok(())
    }

    pub fn uninit(&mut self) {
        self.pending.clear();
        if self.state() != ScanState::Uninit {
            self.go(ScanState::Uninit);
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state() == ScanState::Uninit {
            return Err(Error::NotInitialized);
        }
        if let Some(fault) = self.ctx.fault {
            return Err(Error::HardwareFault(fault.reason));
        }
        Ok(())
    }

    /// Queue a passive scan with the committed parameters.  May queue
    /// behind a pending stop.
    pub fn start<D: RadioDriver>(
        &mut self,
        arbiter: &mut RadioArbiter<D>,
        store: &ConfigStore,
        adv: &AdvertisingController,
        coexistence: bool,
        callback: ScanCallback,
    ) -> Result<BatchId> {
        self.ensure_usable()?;
        if !matches!(self.pending.last(), Some(Intent::Stop)) {
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
        if adv.has_pending() || (!coexistence && adv.is_active()) {
            warn!("scan start refused: advertiser holds the radio");
            return Err(Error::RadioBusy);
        }
        let params = store
            .scan_params()
            .filter(|p| p.is_consistent())
            .ok_or(Error::InvalidWindow)?;

        let id = arbiter.submit(Owner::Scanning, &[RadioCommand::ScanStart(params)])?;
        self.pending.push(id, Intent::Start(callback));
        Ok(id)
    }

    /// Queue a stop.  `Ok(None)` when not scanning or a stop is already queued.
    pub fn stop<D: RadioDriver>(&mut self, arbiter: &mut RadioArbiter<D>) -> Result<Option<BatchId>> {
        self.ensure_usable()?;
        self.submit_stop(arbiter)
    }

    pub(crate) fn force_stop<D: RadioDriver>(
        &mut self,
        arbiter: &mut RadioArbiter<D>,
    ) -> Result<Option<BatchId>> {
        if self.state() == ScanState::Uninit {
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
        let id = arbiter.submit(Owner::Scanning, &[RadioCommand::ScanStop])?;
        self.pending.push(id, Intent::Stop);
        Ok(Some(id))
    }

    pub fn settle(&mut self, settlement: &Settlement) {
        let Some(intent) = self.pending.take(settlement.batch) else {
            warn!("scanning: settlement for unknown batch {:?}", settlement.batch);
            return;
        };
        match (intent, settlement.outcome) {
            (Intent::Start(callback), Ok(())) => {
                self.ctx.callback = Some(callback);
                self.go(ScanState::Scanning);
            }
            (Intent::Stop, Ok(())) => self.go(ScanState::Idle),
            (_, Err(fault)) => self.ctx.fault = Some(fault),
        }
    }

    /// Hand `report` to the callback.  Returns `false` (report dropped)
    /// unless scanning.
    pub fn deliver(&self, report: &ScanReport) -> bool {
        match (self.state(), self.ctx.callback) {
            (ScanState::Scanning, Some(callback)) => {
                callback(report);
                true
            }
            _ => false,
        }
    }

    fn go(&mut self, next: ScanState) {
        if let Err(e) = self.fsm.transition(next, &mut self.ctx) {
            error!("scanning: illegal transition {:?} -> {:?}", e.from, e.to);
        }
    }
}
