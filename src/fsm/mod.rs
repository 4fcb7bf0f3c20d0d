//! Table-driven finite state machine engine.
//!
//! Classic embedded FSM pattern: each state is a row of plain `fn`
//! pointers plus the list of states it may move to.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  StateTable                                               │
//! │  ┌──────────┬───────────┬──────────┬────────────────────┐ │
//! │  │ state    │ on_enter  │ on_exit  │ next               │ │
//! │  ├──────────┼───────────┼──────────┼────────────────────┤ │
//! │  │ Uninit   │ fn(ctx)   │ None     │ [Idle]             │ │
//! │  │ Idle     │ fn(ctx)   │ None     │ [Active, Uninit]   │ │
//! │  │ ...      │           │          │                    │ │
//! │  └──────────┴───────────┴──────────┴────────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The controllers decide *when* to move; the engine refuses any move the
//! table does not list, runs `on_exit` for the current state, then
//! `on_enter` for the next.  Both controllers share this engine with their
//! own state type and context (see [`states`] and [`context`]).

pub mod context;
pub mod states;

use core::fmt;

use log::info;

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn<C> = fn(&mut C);

/// Implemented by the state enums driven by [`Fsm`].
pub trait StateSet: Copy + Eq + fmt::Debug {
    /// Row of this state in the table.
    fn index(self) -> usize;
}

/// Static descriptor for a single state.
pub struct StateDescriptor<S: 'static, C> {
    pub id: S,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<C>>,
    pub on_exit: Option<StateActionFn<C>>,
    /// States this one may transition to.
    pub next: &'static [S],
}

/// A transition the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition<S> {
    pub from: S,
    pub to: S,
}

/// The state machine engine.  Owns the table and the current row index.
pub struct Fsm<S: StateSet + 'static, C, const N: usize> {
    table: [StateDescriptor<S, C>; N],
    current: usize,
    transitions: u32,
}

impl<S: StateSet + 'static, C, const N: usize> Fsm<S, C, N> {
    /// Construct a machine positioned at `initial`.  No `on_enter` runs.
    pub fn new(table: [StateDescriptor<S, C>; N], initial: S) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, row)| row.id.index() == i),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial.index(),
            transitions: 0,
        }
    }

    pub fn current_state(&self) -> S {
        self.table[self.current].id
    }

    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// Whether the table lists `next` as reachable from the current state.
    pub fn can_transition(&self, next: S) -> bool {
        self.table[self.current].next.contains(&next)
    }

    /// Move to `next`.  Moving to the current state is a no-op.
    pub fn transition(&mut self, next: S, ctx: &mut C) -> Result<(), IllegalTransition<S>> {
        let from = self.current_state();
        if next == from {
            return Ok(());
        }
        if !self.can_transition(next) {
            return Err(IllegalTransition { from, to: next });
        }

        let next_idx = next.index();
        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }
        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        Ok(())
    }

    /// Total transitions taken since construction.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }
}
