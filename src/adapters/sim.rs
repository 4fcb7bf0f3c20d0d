//! Host-side radio simulation.
//!
//! [`SimRadio`] implements [`RadioDriver`] entirely in memory: accepted
//! commands are recorded and acknowledged through the event channel, and
//! the simulated air state (advertising, scanning, applied settings) is
//! tracked so tests can assert on what the hardware would be doing.
//! Individual commands can be scripted to fault, be rejected or never be
//! acknowledged.  [`SimDelay`] is a [`DelayNs`] that only counts time.

use alloc::vec::Vec;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::{DriverError, RadioDriver};
use crate::arbiter::channel::{DriverEvent, RadioEventSender, notify};
use crate::arbiter::command::{CommandId, CommandKind, RadioCommand};
use crate::model::{AdPayload, AdvInterval, ChannelMask, RadioAddress, ScanReport};

/// Scripted reaction to one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimResponse {
    Ack,
    /// Accept, then post `Fault(id, code)`.
    Fault(u8),
    /// Refuse synchronously in `submit`.
    Reject,
    /// Accept and never answer.
    Silent,
}

/// What the simulated radio is doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirState {
    pub advertising: bool,
    pub scanning: bool,
    pub address: Option<RadioAddress>,
    pub tx_power: Option<i8>,
    pub interval: Option<AdvInterval>,
    pub channels: Option<ChannelMask>,
    pub payload: AdPayload,
    pub scan_response: AdPayload,
}

pub struct SimRadio<'ch> {
    events: RadioEventSender<'ch>,
    factory_address: Option<RadioAddress>,
    powered: bool,
    fail_power: bool,
    defer_acks: bool,
    held: Vec<(CommandId, RadioCommand)>,
    script: Vec<(CommandKind, SimResponse)>,
    log: Vec<(CommandId, RadioCommand)>,
    air: AirState,
}

impl<'ch> SimRadio<'ch> {
    pub fn new(events: RadioEventSender<'ch>) -> Self {
        Self {
            events,
            factory_address: None,
            powered: false,
            fail_power: false,
            defer_acks: false,
            held: Vec::new(),
            script: Vec::new(),
            log: Vec::new(),
            air: AirState::default(),
        }
    }

    #[must_use]
    pub fn with_factory_address(mut self, address: RadioAddress) -> Self {
        self.factory_address = Some(address);
        self
    }

    // ── Scripting ─────────────────────────────────────────────

    /// The next command of `kind` gets `response` instead of an ack.
    pub fn script(&mut self, kind: CommandKind, response: SimResponse) {
        self.script.push((kind, response));
    }

    /// Make `enable` / `disable` fail.
    pub fn fail_power(&mut self, fail: bool) {
        self.fail_power = fail;
    }

    /// Hold acknowledgements until [`release`](Self::release) is called.
    pub fn defer_acks(&mut self, defer: bool) {
        self.defer_acks = defer;
    }

    /// Acknowledge held commands, oldest first.  Returns how many.
    pub fn release(&mut self) -> usize {
        let held = core::mem::take(&mut self.held);
        let n = held.len();
        for (id, command) in held {
            self.apply(&command);
            notify(&self.events, DriverEvent::Ack(id));
        }
        n
    }

    /// Post an arbitrary driver event (reports, external stop, sent).
    pub fn post(&self, event: DriverEvent) -> bool {
        notify(&self.events, event)
    }

    /// Deliver a scan report as the radio would.
    pub fn receive(&self, report: ScanReport) -> bool {
        self.post(DriverEvent::Report(report))
    }

    /// The stack drops advertising on its own (e.g. a peer connected).
    pub fn drop_advertising(&mut self) -> bool {
        self.air.advertising = false;
        self.post(DriverEvent::AdvertisingStopped)
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn commands(&self) -> &[(CommandId, RadioCommand)] {
        &self.log
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.log.iter().map(|(_, c)| c.kind()).collect()
    }

    pub fn count(&self, kind: CommandKind) -> usize {
        self.log.iter().filter(|(_, c)| c.kind() == kind).count()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn air(&self) -> &AirState {
        &self.air
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    fn take_script(&mut self, kind: CommandKind) -> SimResponse {
        match self.script.iter().position(|(k, _)| *k == kind) {
            Some(i) => self.script.remove(i).1,
            None => SimResponse::Ack,
        }
    }

    fn apply(&mut self, command: &RadioCommand) {
        let air = &mut self.air;
        match command {
            RadioCommand::SetAddress(a) => air.address = Some(*a),
            RadioCommand::SetTxPower(p) => air.tx_power = Some(*p),
            RadioCommand::SetInterval(i) => air.interval = Some(*i),
            RadioCommand::SetChannelMask(m) => air.channels = Some(*m),
            RadioCommand::SetPayload(p) => air.payload = p.clone(),
            RadioCommand::SetScanResponse(p) => air.scan_response = p.clone(),
            RadioCommand::AdvStart(_) => air.advertising = true,
            RadioCommand::AdvStop => air.advertising = false,
            RadioCommand::ScanStart(_) => air.scanning = true,
            RadioCommand::ScanStop => air.scanning = false,
        }
    }
}

impl RadioDriver for SimRadio<'_> {
    fn enable(&mut self) -> Result<(), DriverError> {
        if self.fail_power {
            return Err(DriverError::Internal(0x01));
        }
        self.powered = true;
        self.air = AirState::default();
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DriverError> {
        if self.fail_power {
            return Err(DriverError::Internal(0x02));
        }
        self.powered = false;
        self.air.advertising = false;
        self.air.scanning = false;
        Ok(())
    }

    fn factory_address(&self) -> Option<RadioAddress> {
        self.factory_address
    }

    fn submit(&mut self, id: CommandId, command: &RadioCommand) -> Result<(), DriverError> {
        if !self.powered {
            return Err(DriverError::InvalidState);
        }
        let response = self.take_script(command.kind());
        debug!("sim radio: {} #{} -> {:?}", command.kind(), id.0, response);
        if response == SimResponse::Reject {
            return Err(DriverError::InvalidParam);
        }
        self.log.push((id, command.clone()));
        match response {
            SimResponse::Ack if self.defer_acks => self.held.push((id, command.clone())),
            SimResponse::Ack => {
                self.apply(command);
                notify(&self.events, DriverEvent::Ack(id));
            }
            SimResponse::Fault(code) => {
                notify(&self.events, DriverEvent::Fault(id, code));
            }
            SimResponse::Silent | SimResponse::Reject => {}
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Delay
// ───────────────────────────────────────────────────────────────

/// Delay provider that returns at once and keeps a running total.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimDelay {
    total_ns: u64,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time "slept" so far.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.total_ns)
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns = self.total_ns.saturating_add(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns = self.total_ns.saturating_add(us as u64 * 1_000);
    }
}
