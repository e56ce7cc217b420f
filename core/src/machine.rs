//! Breaker lifecycle state machine
//!
//! Declared with `state_machines` in dynamic mode. Guards read the shared
//! [`CircuitContext`]; the consecutive failure counter lives there so the
//! `trip` guard sees the same value the breaker mutates.

use crate::{
    circuit::{BreakerConfig, CircuitState},
    clock::{Clock, MonotonicClock},
};
use state_machines::state_machine;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Circuit breaker context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: BreakerConfig,
    /// Consecutive failures; zeroed by a success while closed
    pub failure_count: Arc<AtomicUsize>,
    pub clock: Arc<dyn Clock>,
}

impl CircuitContext {
    pub fn new(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            failure_count: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    pub fn failures(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self::new(
            String::new(),
            BreakerConfig::default(),
            Arc::new(MonotonicClock::new()),
        )
    }
}

impl std::fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("failure_count", &self.failures())
            .field("clock", &self.clock)
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    /// Time of the most recent failure; the cooldown runs from here
    pub opened_at: f64,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    pub consecutive_successes: usize,
}

state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [timeout_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// Trip only on consecutive failures; the outcome window is never consulted
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        ctx.failures() >= ctx.config.failure_threshold
    }
}

impl Circuit<HalfOpen> {
    /// A single failed trial revokes recovery
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        true
    }

    fn should_close(&self, ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .map(|data| data.consecutive_successes >= ctx.config.success_threshold)
            .unwrap_or(false)
    }
}

impl Circuit<Open> {
    fn timeout_elapsed(&self, ctx: &CircuitContext) -> bool {
        self.state_data_open()
            .map(|data| ctx.clock.now() - data.opened_at >= ctx.config.timeout_secs)
            .unwrap_or(true)
    }
}

/// Narrow wrapper over the generated dynamic machine
pub(crate) struct BreakerMachine {
    machine: DynamicCircuit,
}

impl BreakerMachine {
    pub(crate) fn new(context: CircuitContext) -> Self {
        Self {
            machine: DynamicCircuit::new(context),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        match self.machine.current_state() {
            "Open" => CircuitState::Open,
            "HalfOpen" => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Fire `trip`; on success the cooldown starts at `now`
    pub(crate) fn trip(&mut self, now: f64) -> bool {
        if self.machine.handle(CircuitEvent::Trip).is_ok() {
            self.mark_open(now);
            true
        } else {
            false
        }
    }

    /// Restart the cooldown of an already open circuit
    pub(crate) fn mark_open(&mut self, now: f64) {
        if let Some(data) = self.machine.open_data_mut() {
            data.opened_at = now;
        }
    }

    pub(crate) fn attempt_reset(&mut self) -> bool {
        self.machine.handle(CircuitEvent::AttemptReset).is_ok()
    }

    /// Count a successful trial; returns the consecutive successes so far
    pub(crate) fn record_trial_success(&mut self) -> usize {
        match self.machine.half_open_data_mut() {
            Some(data) => {
                data.consecutive_successes += 1;
                data.consecutive_successes
            }
            None => 0,
        }
    }

    pub(crate) fn close(&mut self) -> bool {
        self.machine.handle(CircuitEvent::Close).is_ok()
    }

    /// Consecutive trial successes (0 outside HalfOpen)
    pub(crate) fn success_count(&self) -> usize {
        self.machine
            .half_open_data()
            .map(|data| data.consecutive_successes)
            .unwrap_or(0)
    }

    pub(crate) fn opened_at(&self) -> Option<f64> {
        self.machine.open_data().map(|data| data.opened_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn context(failure_threshold: usize, timeout_secs: f64) -> (CircuitContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let ctx = CircuitContext::new(
            "test_circuit",
            BreakerConfig {
                failure_threshold,
                success_threshold: 2,
                timeout_secs,
                window_size: 10,
            },
            clock.clone(),
        );
        (ctx, clock)
    }

    #[test]
    fn test_state_machine_closed_to_open_transition() {
        let (ctx, _clock) = context(3, 60.0);
        let mut circuit = DynamicCircuit::new(ctx.clone());

        let result = circuit.handle(CircuitEvent::Trip);
        assert!(result.is_err(), "Should fail guard when below threshold");

        ctx.failure_count.store(3, Ordering::SeqCst);

        circuit
            .handle(CircuitEvent::Trip)
            .expect("Should open after reaching threshold");
        assert_eq!(circuit.current_state(), "Open");
    }

    #[test]
    fn test_state_machine_open_to_half_open_transition() {
        let (ctx, clock) = context(1, 5.0);
        ctx.failure_count.store(1, Ordering::SeqCst);

        let mut circuit = DynamicCircuit::new(ctx.clone());
        circuit.handle(CircuitEvent::Trip).expect("Should open");
        if let Some(data) = circuit.open_data_mut() {
            data.opened_at = clock.now();
        }

        let result = circuit.handle(CircuitEvent::AttemptReset);
        assert!(result.is_err(), "Should fail guard when timeout not elapsed");

        clock.advance(5.0);

        circuit
            .handle(CircuitEvent::AttemptReset)
            .expect("Should reset after timeout");
        assert_eq!(circuit.current_state(), "HalfOpen");
        let data = circuit.half_open_data().expect("Should have HalfOpen data");
        assert_eq!(data.consecutive_successes, 0);
    }

    #[test]
    fn test_state_machine_half_open_to_closed_guard() {
        let (ctx, clock) = context(1, 1.0);
        ctx.failure_count.store(1, Ordering::SeqCst);

        let mut machine = BreakerMachine::new(ctx);
        assert!(machine.trip(clock.now()));
        clock.advance(1.0);
        assert!(machine.attempt_reset());

        assert!(!machine.close(), "Should fail guard without successes");
        assert_eq!(machine.record_trial_success(), 1);
        assert!(!machine.close());
        assert_eq!(machine.record_trial_success(), 2);
        assert!(machine.close());
        assert_eq!(machine.state(), CircuitState::Closed);
        assert_eq!(machine.success_count(), 0);
    }

    #[test]
    fn test_half_open_trip_needs_no_threshold() {
        let (ctx, clock) = context(3, 1.0);
        ctx.failure_count.store(3, Ordering::SeqCst);

        let mut machine = BreakerMachine::new(ctx.clone());
        assert!(machine.trip(0.0));
        clock.advance(2.0);
        assert!(machine.attempt_reset());

        // Even with the streak cleared the HalfOpen guard always trips
        ctx.failure_count.store(0, Ordering::SeqCst);
        assert!(machine.trip(clock.now()));
        assert_eq!(machine.state(), CircuitState::Open);
        assert_eq!(machine.opened_at(), Some(2.0));
    }

    #[test]
    fn test_mark_open_restarts_cooldown() {
        let (ctx, clock) = context(1, 5.0);
        ctx.failure_count.store(1, Ordering::SeqCst);

        let mut machine = BreakerMachine::new(ctx);
        assert!(machine.trip(0.0));
        clock.advance(4.0);
        machine.mark_open(clock.now());
        clock.advance(4.0);

        assert!(!machine.attempt_reset());
        clock.advance(1.0);
        assert!(machine.attempt_reset());
    }

    #[test]
    fn test_record_trial_success_outside_half_open() {
        let (ctx, _clock) = context(1, 5.0);
        let mut machine = BreakerMachine::new(ctx);

        assert_eq!(machine.record_trial_success(), 0);
        assert_eq!(machine.opened_at(), None);
        assert_eq!(machine.state(), CircuitState::Closed);
    }
}
