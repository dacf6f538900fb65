//! Simulation clock and exchange cadence.
//!
//! Tracks the authoritative current time, the final time, the next-timestamp
//! hints of both synchronization scopes and the interval gate that throttles
//! intermediate exchanges.

use serde::{Deserialize, Serialize};

use crate::error::{ActorError, ActorResult};

/// Synchronization scope a next-timestamp hint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Intermediate exchanges inside the timestep loop (`O_I` / `S`).
    Inner,
    /// Initial and final exchanges of an outer iteration (`F_INIT` / `O_F`).
    Outer,
}

/// Next-timestamp hints, one per scope.
///
/// `None` means the message it is attached to is the last one in that scope.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NextTimestamps {
    inner: Option<f64>,
    outer: Option<f64>,
}

impl NextTimestamps {
    /// Hint for `scope`.
    #[must_use]
    pub const fn get(&self, scope: SyncScope) -> Option<f64> {
        match scope {
            SyncScope::Inner => self.inner,
            SyncScope::Outer => self.outer,
        }
    }

    /// Replaces the hint for `scope`.
    pub fn set(&mut self, scope: SyncScope, hint: Option<f64>) {
        match scope {
            SyncScope::Inner => self.inner = hint,
            SyncScope::Outer => self.outer = hint,
        }
    }
}

/// Interval gate for exchanges that must not happen more often than a minimum spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceGate {
    interval: f64,
    last_exchange: f64,
}

impl CadenceGate {
    /// Creates a gate that has never fired, so the first check is always due.
    #[must_use]
    pub const fn new(interval: f64) -> Self {
        Self {
            interval,
            last_exchange: f64::NEG_INFINITY,
        }
    }

    /// Minimum spacing between gated exchanges.
    #[must_use]
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Time of the last gated exchange (negative infinity before the first).
    #[must_use]
    pub const fn last_exchange(&self) -> f64 {
        self.last_exchange
    }

    /// Whether a gated exchange is due at `t_cur`.
    #[must_use]
    pub fn is_due(&self, t_cur: f64) -> bool {
        t_cur >= self.last_exchange + self.interval
    }

    /// Records that a gated exchange happened at `t_cur`.
    pub fn mark(&mut self, t_cur: f64) {
        self.last_exchange = t_cur;
    }
}

/// Clock of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    t_cur: f64,
    t_final: f64,
    next: NextTimestamps,
    gate: CadenceGate,
}

impl ClockState {
    /// Creates a clock at `t_cur` that ends at `t_final`.
    #[must_use]
    pub const fn new(t_cur: f64, t_final: f64, equilibrium_interval: f64) -> Self {
        Self {
            t_cur,
            t_final,
            next: NextTimestamps {
                inner: None,
                outer: None,
            },
            gate: CadenceGate::new(equilibrium_interval),
        }
    }

    /// Current simulation time.
    #[must_use]
    pub const fn t_cur(&self) -> f64 {
        self.t_cur
    }

    /// Final simulation time.
    #[must_use]
    pub const fn t_final(&self) -> f64 {
        self.t_final
    }

    /// Next-timestamp hint of `scope`.
    #[must_use]
    pub const fn next(&self, scope: SyncScope) -> Option<f64> {
        self.next.get(scope)
    }

    /// The interval gate.
    #[must_use]
    pub const fn gate(&self) -> &CadenceGate {
        &self.gate
    }

    /// Restarts the clock for a freshly built initial state.
    ///
    /// Time starts over, so the gate is re-armed. Hints survive: they belong
    /// to the peers, not to the state.
    pub fn restart(&mut self, t_cur: f64, t_final: f64) {
        self.t_cur = t_cur;
        self.t_final = t_final;
        self.gate = CadenceGate::new(self.gate.interval());
    }

    /// Moves the current time forward.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `t` lies before the current time.
    pub fn advance_to(&mut self, t: f64) -> ActorResult<()> {
        if t < self.t_cur {
            return Err(ActorError::internal(format!(
                "simulation time moved backwards from {} to {t}",
                self.t_cur
            )));
        }
        self.t_cur = t;
        Ok(())
    }

    /// Candidate next time for a step of `dt`, or `None` once it reaches the final time.
    ///
    /// `is_done` is the engine's terminal test; a candidate it treats as the
    /// end of the run has no successor round.
    #[must_use]
    pub fn next_after(&self, dt: f64, is_done: impl Fn(f64) -> bool) -> Option<f64> {
        let candidate = self.t_cur + dt;
        (candidate < self.t_final && !is_done(candidate)).then_some(candidate)
    }

    /// Computes and stores the inner next-timestamp hint for a step of `dt`.
    pub fn advance_next(&mut self, dt: f64, is_done: impl Fn(f64) -> bool) -> Option<f64> {
        let hint = self.next_after(dt, is_done);
        self.next.set(SyncScope::Inner, hint);
        hint
    }

    /// Stores a next-timestamp hint received from a peer.
    pub fn set_next(&mut self, scope: SyncScope, hint: Option<f64>) {
        self.next.set(scope, hint);
    }

    /// Whether an interval-gated exchange is due at the current time.
    #[must_use]
    pub fn due_for_gated_exchange(&self) -> bool {
        self.gate.is_due(self.t_cur)
    }

    /// Records a gated exchange at the current time.
    pub fn mark_gated_exchange(&mut self) {
        self.gate.mark(self.t_cur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_fires_first_time_regardless_of_interval() {
        let gate = CadenceGate::new(1.0e9);
        assert!(gate.is_due(0.0));
        assert!(gate.last_exchange().is_infinite());
    }

    #[test]
    fn gate_respects_interval() {
        let mut gate = CadenceGate::new(0.25);
        gate.mark(0.0);
        assert!(!gate.is_due(0.1));
        assert!(!gate.is_due(0.2));
        assert!(gate.is_due(0.25));
        gate.mark(0.3);
        assert!(!gate.is_due(0.5));
        assert!(gate.is_due(0.55));
    }

    #[test]
    fn zero_interval_is_always_due() {
        let mut gate = CadenceGate::new(0.0);
        for t in [0.0, 0.0, 0.1, 0.2] {
            assert!(gate.is_due(t));
            gate.mark(t);
        }
    }

    #[test]
    fn gated_rounds_follow_interval_over_a_step_sequence() {
        let mut clock = ClockState::new(0.0, 10.0, 0.3);
        let mut fired = Vec::new();
        for k in 0..10 {
            if clock.due_for_gated_exchange() {
                let last = clock.gate().last_exchange();
                assert!(clock.t_cur() - last >= 0.3);
                clock.mark_gated_exchange();
                assert_eq!(clock.gate().last_exchange(), clock.t_cur());
                fired.push(k);
            }
            clock.advance_to(clock.t_cur() + 0.1).unwrap();
        }
        // t = 0.0, ~0.3/0.4, ... spacing of 3-4 steps of 0.1
        assert_eq!(fired[0], 0);
        assert!(fired.windows(2).all(|w| w[1] - w[0] >= 3));
    }

    fn never_done(_: f64) -> bool {
        false
    }

    #[test]
    fn next_hint_collapses_at_final_time() {
        let mut clock = ClockState::new(0.0, 0.3, 0.0);
        assert_eq!(clock.advance_next(0.1, never_done), Some(0.1));
        clock.advance_to(0.2).unwrap();
        assert_eq!(clock.advance_next(0.1, never_done), None);
        assert_eq!(clock.next(SyncScope::Inner), None);
        assert_eq!(clock.next_after(0.05, never_done), Some(0.25));
    }

    #[test]
    fn next_hint_collapses_when_engine_reports_done() {
        // Accumulated steps of 0.1 land just short of 1.0.
        let t = (0..9).fold(0.0_f64, |t, _| t + 0.1);
        let mut clock = ClockState::new(0.0, 1.0, 0.0);
        clock.advance_to(t).unwrap();
        assert_eq!(clock.next_after(0.1, never_done), Some(t + 0.1));
        assert_eq!(clock.advance_next(0.1, |candidate| candidate >= 1.0 - 1e-9), None);
        assert_eq!(clock.next(SyncScope::Inner), None);
    }

    #[test]
    fn scopes_are_independent() {
        let mut clock = ClockState::new(0.0, 1.0, 0.0);
        clock.set_next(SyncScope::Outer, Some(5.0));
        clock.advance_next(0.5, never_done);
        assert_eq!(clock.next(SyncScope::Outer), Some(5.0));
        assert_eq!(clock.next(SyncScope::Inner), Some(0.5));
    }

    #[test]
    fn restart_rearms_gate_and_keeps_hints() {
        let mut clock = ClockState::new(0.0, 1.0, 0.5);
        clock.set_next(SyncScope::Outer, Some(2.0));
        clock.advance_to(0.9).unwrap();
        clock.mark_gated_exchange();
        clock.restart(0.0, 1.0);
        assert!(clock.due_for_gated_exchange());
        assert_eq!(clock.next(SyncScope::Outer), Some(2.0));
        assert_eq!(clock.gate().interval(), 0.5);
    }

    #[test]
    fn advance_rejects_going_backwards() {
        let mut clock = ClockState::new(1.0, 2.0, 0.0);
        assert!(clock.advance_to(0.5).is_err());
        assert_eq!(clock.t_cur(), 1.0);
    }
}
