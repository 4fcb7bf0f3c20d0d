//! Radio arbiter.
//!
//! The single owner of the driver's command interface.  Both controllers
//! submit *batches* (the commands of one logical operation); the arbiter
//! queues them FIFO and keeps exactly one command in flight.  Completions
//! come back through [`channel`] as `Ack` / `Fault` events.
//!
//! ```text
//!  AdvertisingController ─┐                    ┌──────────────┐
//!                         ├─▶ queue ─▶ in-flight ─▶ RadioDriver │
//!  ScanningController ────┘     ▲                └──────┬───────┘
//!                               └── Ack / Fault ◀───────┘
//! ```
//!
//! A batch settles when its last command is acknowledged, or on the first
//! failure.  Failures are never retried: the rest of the batch is dropped
//! and a [`Settlement`] carrying the [`Fault`] is produced so the owning
//! controller can revert to its last stable state.  Later batches of the
//! same owner still in the queue settle with the same fault.  A command
//! that sees no completion within the watchdog budget fails with
//! [`FaultReason::WatchdogTimeout`]; a completion that arrives afterwards
//! is logged and ignored.

pub mod channel;
pub mod command;

use core::fmt;

use heapless::Deque;
use log::{debug, error, warn};

use crate::app::ports::RadioDriver;
use crate::config::ArbiterConfig;
use crate::diagnostics::RadioStats;
use crate::error::{Error, FaultReason};

use command::{BatchId, CommandId, CommandKind, Owner, RadioCommand, Resource, ResourceSet};

/// Commands that may be queued or in flight at once.
pub const QUEUE_DEPTH: usize = 16;

/// Settled batches awaiting collection by the owner.
const SETTLED_DEPTH: usize = QUEUE_DEPTH;

/// A failed radio command, as reported to callers and the fault handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub owner: Owner,
    pub command: CommandKind,
    pub command_id: CommandId,
    pub reason: FaultReason,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} command {} (#{}) failed: {}",
            self.owner, self.command, self.command_id.0, self.reason
        )
    }
}

/// Final outcome of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub batch: BatchId,
    pub owner: Owner,
    pub outcome: Result<(), Fault>,
    /// A stop command in this batch was acknowledged before the outcome.
    pub radio_stopped: bool,
}

struct Queued {
    id: CommandId,
    batch: BatchId,
    owner: Owner,
    command: RadioCommand,
    last_in_batch: bool,
}

struct InFlight {
    id: CommandId,
    batch: BatchId,
    owner: Owner,
    kind: CommandKind,
    resource: Resource,
    last_in_batch: bool,
    waited_us: u32,
}

pub struct RadioArbiter<D: RadioDriver> {
    driver: D,
    queue: Deque<Queued, QUEUE_DEPTH>,
    in_flight: Option<InFlight>,
    settled: Deque<Settlement, SETTLED_DEPTH>,
    next_command: u32,
    next_batch: u32,
    /// Batch currently being executed and whether it has acked a stop.
    active_batch: Option<(BatchId, bool)>,
    /// Resources the active batch has already written.  They stay busy
    /// until the batch settles.
    batch_resources: ResourceSet,
    ack_timeout_us: u32,
    stats: RadioStats,
}

impl<D: RadioDriver> RadioArbiter<D> {
    pub fn new(driver: D, config: &ArbiterConfig) -> Self {
        Self {
            driver,
            queue: Deque::new(),
            in_flight: None,
            settled: Deque::new(),
            next_command: 0,
            next_batch: 0,
            active_batch: None,
            batch_resources: ResourceSet::EMPTY,
            ack_timeout_us: config.ack_timeout_us,
            stats: RadioStats::default(),
        }
    }

    // ── Submission ────────────────────────────────────────────

    /// Queue `commands` as one batch and dispatch if the radio is free.
    ///
    /// Fails with [`Error::RadioBusy`] if the queue cannot take the whole
    /// batch; nothing is queued in that case.  A driver that rejects the
    /// first command synchronously still yields a batch id, whose
    /// settlement carries the fault.
    pub fn submit(&mut self, owner: Owner, commands: &[RadioCommand]) -> Result<BatchId, Error> {
        if commands.is_empty() {
            return Err(Error::InvalidState);
        }
        if QUEUE_DEPTH - self.queue.len() < commands.len() {
            warn!("arbiter queue full, {:?} batch refused", owner);
            return Err(Error::RadioBusy);
        }

        let batch = BatchId(self.next_batch);
        self.next_batch = self.next_batch.wrapping_add(1);
        let last = commands.len() - 1;
        for (i, command) in commands.iter().enumerate() {
            let id = CommandId(self.next_command);
            self.next_command = self.next_command.wrapping_add(1);
            // Capacity checked above.
            let _ = self.queue.push_back(Queued {
                id,
                batch,
                owner,
                command: command.clone(),
                last_in_batch: i == last,
            });
        }
        debug!("queued {:?} batch {} ({} commands)", owner, batch.0, commands.len());
        self.dispatch_next();
        Ok(batch)
    }

    fn dispatch_next(&mut self) {
        while self.in_flight.is_none() {
            let Some(next) = self.queue.pop_front() else {
                return;
            };
            if self.active_batch.map(|(b, _)| b) != Some(next.batch) {
                self.active_batch = Some((next.batch, false));
                self.batch_resources = ResourceSet::EMPTY;
            }

            let kind = next.command.kind();
            self.stats.commands_issued = self.stats.commands_issued.wrapping_add(1);
            match self.driver.submit(next.id, &next.command) {
                Ok(()) => {
                    debug!("dispatched {} #{}", kind, next.id.0);
                    self.in_flight = Some(InFlight {
                        id: next.id,
                        batch: next.batch,
                        owner: next.owner,
                        kind,
                        resource: next.command.resource(),
                        last_in_batch: next.last_in_batch,
                        waited_us: 0,
                    });
                }
                Err(e) => {
                    error!("driver rejected {} #{}: {:?}", kind, next.id.0, e);
                    let fault = Fault {
                        owner: next.owner,
                        command: kind,
                        command_id: next.id,
                        reason: FaultReason::Rejected,
                    };
                    self.fail_batch(next.batch, next.owner, next.last_in_batch, fault);
                }
            }
        }
    }

    // ── Completions ───────────────────────────────────────────

    /// Driver acknowledged `id`.
    pub fn on_ack(&mut self, id: CommandId) {
        let Some(current) = self.in_flight.take_if(|c| c.id == id) else {
            self.stats.stale_completions = self.stats.stale_completions.wrapping_add(1);
            warn!("ignoring ack for #{} (not in flight)", id.0);
            return;
        };
        self.stats.commands_acked = self.stats.commands_acked.wrapping_add(1);
        self.batch_resources.insert(current.resource);
        if matches!(current.kind, CommandKind::AdvStop | CommandKind::ScanStop) {
            if let Some((_, stopped)) = self.active_batch.as_mut() {
                *stopped = true;
            }
        }
        if current.last_in_batch {
            self.settle(current.batch, current.owner, Ok(()));
        }
        self.dispatch_next();
    }

    /// Driver failed `id` with a vendor `code`.
    pub fn on_fault(&mut self, id: CommandId, code: u8) {
        let Some(current) = self.in_flight.take_if(|c| c.id == id) else {
            self.stats.stale_completions = self.stats.stale_completions.wrapping_add(1);
            warn!("ignoring fault 0x{:02x} for #{} (not in flight)", code, id.0);
            return;
        };
        let fault = Fault {
            owner: current.owner,
            command: current.kind,
            command_id: current.id,
            reason: FaultReason::Reported(code),
        };
        error!("{}", fault);
        self.fail_batch(current.batch, current.owner, current.last_in_batch, fault);
        self.dispatch_next();
    }

    /// Advance the watchdog by `elapsed_us`.
    pub fn tick(&mut self, elapsed_us: u32) {
        let Some(current) = self.in_flight.as_mut() else {
            return;
        };
        current.waited_us = current.waited_us.saturating_add(elapsed_us);
        if current.waited_us < self.ack_timeout_us {
            return;
        }

        let Some(current) = self.in_flight.take() else {
            return;
        };
        self.stats.watchdog_expiries = self.stats.watchdog_expiries.wrapping_add(1);
        let fault = Fault {
            owner: current.owner,
            command: current.kind,
            command_id: current.id,
            reason: FaultReason::WatchdogTimeout,
        };
        error!("{}", fault);
        self.fail_batch(current.batch, current.owner, current.last_in_batch, fault);
        self.dispatch_next();
    }

    /// Drop the rest of `batch` from the queue and record the failure.
    ///
    /// Batches the same owner queued behind it were built against a radio
    /// state that no longer holds; they settle with the same fault without
    /// reaching the driver.
    fn fail_batch(&mut self, batch: BatchId, owner: Owner, was_last: bool, fault: Fault) {
        self.stats.commands_faulted = self.stats.commands_faulted.wrapping_add(1);
        if !was_last {
            // A batch is contiguous and its remainder sits at the front.
            while self.queue.front().is_some_and(|q| q.batch == batch) {
                let _ = self.queue.pop_front();
            }
        }
        self.settle(batch, owner, Err(fault));

        let mut kept: Deque<Queued, QUEUE_DEPTH> = Deque::new();
        while let Some(queued) = self.queue.pop_front() {
            if queued.owner != owner {
                let _ = kept.push_back(queued);
            } else if queued.last_in_batch {
                warn!("abandoning {:?} batch {} after fault", owner, queued.batch.0);
                self.settle(queued.batch, owner, Err(fault));
            }
        }
        self.queue = kept;
    }

    fn settle(&mut self, batch: BatchId, owner: Owner, outcome: Result<(), Fault>) {
        let radio_stopped = matches!(self.active_batch, Some((b, true)) if b == batch);
        if self.active_batch.is_some_and(|(b, _)| b == batch) {
            self.active_batch = None;
            self.batch_resources = ResourceSet::EMPTY;
        }
        // One settlement per batch and at most QUEUE_DEPTH batches outstanding.
        let _ = self.settled.push_back(Settlement {
            batch,
            owner,
            outcome,
            radio_stopped,
        });
    }

    /// Next settled batch, oldest first.
    pub fn take_settlement(&mut self) -> Option<Settlement> {
        self.settled.pop_front()
    }

    // ── Queries ───────────────────────────────────────────────

    /// Resources touched by queued or in-flight commands, plus those
    /// already written by a batch that has not settled.
    pub fn busy_resources(&self) -> ResourceSet {
        let mut set = self.batch_resources;
        if let Some(current) = &self.in_flight {
            set.insert(current.resource);
        }
        for queued in self.queue.iter() {
            set.insert(queued.command.resource());
        }
        set
    }

    /// Whether `batch` has not settled yet (settled but uncollected counts
    /// as settled).
    pub fn is_pending(&self, batch: BatchId) -> bool {
        self.in_flight.as_ref().is_some_and(|c| c.batch == batch)
            || self.queue.iter().any(|q| q.batch == batch)
    }

    /// No command queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        QUEUE_DEPTH - self.queue.len()
    }

    pub fn stats(&self) -> &RadioStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut RadioStats {
        &mut self.stats
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
