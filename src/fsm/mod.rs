//! Table-driven state machine engine shared by the reflow and bake runs.
//!
//! A run's state machine is a fixed array of [`StateDescriptor`] rows, one
//! per phase, each bundling the state's enum value, a display name, and
//! three function pointers: optional `on_enter`/`on_exit` actions and a
//! mandatory per-tick `on_update` that returns `Some(next)` to leave the
//! state or `None` to stay in it. On a transition the engine fires the old
//! state's `on_exit`, the new state's `on_enter`, and moves the cursor;
//! every handler works against the same `&mut RunContext`.
//!
//! [`Fsm`] is generic over the state enum and the row count, so the two
//! machines get one engine without any overlap between their state sets.
//! Handlers are plain `fn` pointers in fixed arrays; no heap, no `dyn`.

pub mod bake;
pub mod context;
pub mod reflow;

use core::fmt::Debug;

use context::RunContext;
use log::info;

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut RunContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn<S> = fn(&mut RunContext) -> Option<S>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array — no heap, no `dyn`.
pub struct StateDescriptor<S> {
    pub id: S,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn<S>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and is ticked with a
/// mutable [`RunContext`] threaded through every handler call.
pub struct Fsm<S: Copy + PartialEq + Debug, const N: usize> {
    /// Fixed-size table; rows are looked up by state identity.
    table: [StateDescriptor<S>; N],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl<S: Copy + PartialEq + Debug, const N: usize> Fsm<S, N> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<S>; N], initial: S) -> Self {
        let current = Self::position(&table, initial);
        Self {
            table,
            current,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut RunContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut RunContext) {
        self.tick_count += 1;
        let next = (self.table[self.current].on_update)(ctx);
        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition (used by the service to jump to the
    /// abort state regardless of what `on_update` returned).
    pub fn force_transition(&mut self, next: S, ctx: &mut RunContext) {
        if next != self.table[self.current].id {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> S {
        self.table[self.current].id
    }

    /// The current state's display name.
    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn position(table: &[StateDescriptor<S>; N], id: S) -> usize {
        table
            .iter()
            .position(|d| d.id == id)
            .unwrap_or_else(|| {
                debug_assert!(false, "state {id:?} missing from table");
                N - 1 // last row is the abort state in both machines
            })
    }

    fn transition(&mut self, next_id: S, ctx: &mut RunContext) {
        let next_idx = Self::position(&self.table, next_id);

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        // Update pointer and timing
        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.elapsed_in_phase_secs = 0;

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
