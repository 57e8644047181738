//! Per-move arbitration: one agent call raced against one deadline.
//!
//! The only concurrency in the engine lives here. Each solicitation spawns a
//! disposable worker thread that runs the model call while the arbiter waits
//! on a channel in small slices, emitting thinking events. Whichever resolves
//! first wins the race; a losing (late) model result is discarded twice over:
//! the worker re-checks the [`CancelToken`] before sending, and the receiving
//! end is gone once the arbiter has returned, so a stale move has no path to
//! any state-mutating code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::agent::{Agent, Model};
use crate::events::{EventSink, MatchEvent};
use crate::game::{FailureReason, GameRules, GameState, Move};

/// Marks an in-flight agent call as discarded.
///
/// Cancellation is one-way: once set, the flag stays set and the call's
/// eventual result is dropped by the worker itself.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Mark the call as discarded.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the call has been discarded.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a raced model call came back with.
pub(crate) enum CallResult {
    /// The call resolved within the deadline.
    Resolved {
        mv: anyhow::Result<Move>,
        latency: Duration,
    },
    /// The deadline fired first; the call was cancelled.
    TimedOut,
    /// The worker vanished without answering (the call panicked).
    Died,
}

/// Run `model.propose(state)` on a worker thread under `deadline`, calling
/// `on_tick` roughly every `tick` while waiting.
pub(crate) fn call_with_deadline(
    model: Arc<dyn Model>,
    state: Option<GameState>,
    deadline: Duration,
    tick: Duration,
    mut on_tick: impl FnMut(Duration),
) -> CallResult {
    let token = CancelToken::new();
    let worker_token = token.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let started = Instant::now();
        let result = model.propose(state.as_ref());
        // A cancelled call's result must never leave the worker.
        if !worker_token.is_cancelled() {
            let _ = tx.send((result, started.elapsed()));
        }
    });

    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= deadline {
            token.cancel();
            return CallResult::TimedOut;
        }
        match rx.recv_timeout(tick.min(deadline - elapsed)) {
            Ok((mv, latency)) => return CallResult::Resolved { mv, latency },
            Err(mpsc::RecvTimeoutError::Timeout) => on_tick(started.elapsed()),
            Err(mpsc::RecvTimeoutError::Disconnected) => return CallResult::Died,
        }
    }
}

/// Outcome of one solicitation.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The move was legal and applied.
    Accepted {
        /// State after the move.
        state: GameState,
        /// How long the model took.
        latency: Duration,
    },
    /// The mover is at fault; the match ends as its forfeit.
    Fault(FailureReason),
}

/// Invokes one agent for one turn under a deadline and classifies the result.
#[derive(Clone, Copy, Debug)]
pub struct MoveArbiter {
    deadline: Duration,
    tick: Duration,
}

impl MoveArbiter {
    /// An arbiter enforcing `deadline` per move, emitting thinking events
    /// every `tick`.
    pub fn new(deadline: Duration, tick: Duration) -> MoveArbiter {
        MoveArbiter { deadline, tick }
    }

    /// The enforced per-move deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Solicit a move from `agent` for `state` and return either the applied
    /// transition or the classified fault. Never mutates `state`.
    pub fn solicit(
        &self,
        rules: &dyn GameRules,
        state: &GameState,
        agent: &Agent,
        events: &mut dyn EventSink,
    ) -> TurnOutcome {
        let side = agent.side();
        let result = call_with_deadline(
            agent.model(),
            Some(state.clone()),
            self.deadline,
            self.tick,
            |elapsed| events.emit(MatchEvent::Thinking { side, elapsed }),
        );

        match result {
            CallResult::TimedOut => {
                warn!(agent = agent.name(), deadline = ?self.deadline, "move timed out");
                TurnOutcome::Fault(FailureReason::Timeout)
            }
            CallResult::Died => {
                warn!(agent = agent.name(), "agent worker died mid-move");
                TurnOutcome::Fault(FailureReason::Crash)
            }
            CallResult::Resolved { mv: Err(error), .. } => {
                warn!(agent = agent.name(), %error, "agent call failed");
                TurnOutcome::Fault(FailureReason::Crash)
            }
            CallResult::Resolved { mv: Ok(mv), latency } => {
                if !rules.legal_move(state, &mv, side) {
                    warn!(agent = agent.name(), ?mv, "illegal move");
                    return TurnOutcome::Fault(FailureReason::InvalidMove);
                }
                TurnOutcome::Accepted {
                    state: rules.apply_move(state, &mv, side),
                    latency,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::game::{Side, TicTacToe};

    struct ConstModel(Move);

    impl Model for ConstModel {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            Ok(self.0)
        }
    }

    struct SleepyModel {
        nap: Duration,
        then: Move,
    }

    impl Model for SleepyModel {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            thread::sleep(self.nap);
            Ok(self.then)
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            anyhow::bail!("induced failure")
        }
    }

    struct PanickingModel;

    impl Model for PanickingModel {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            panic!("induced panic")
        }
    }

    fn arbiter() -> MoveArbiter {
        MoveArbiter::new(Duration::from_millis(80), Duration::from_millis(10))
    }

    #[test]
    fn a_legal_move_is_applied_with_its_latency() {
        let agent = Agent::new("ok", Side::One, Arc::new(ConstModel(Move::Cell(4))));
        let state = TicTacToe.initial_state();
        match arbiter().solicit(&TicTacToe, &state, &agent, &mut NullSink) {
            TurnOutcome::Accepted { state: next, .. } => {
                assert_eq!(next, TicTacToe.apply_move(&state, &Move::Cell(4), Side::One));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
        // The input state is untouched.
        assert_eq!(state, TicTacToe.initial_state());
    }

    #[test]
    fn an_illegal_move_is_an_invalid_move_fault() {
        let agent = Agent::new("greedy", Side::Two, Arc::new(ConstModel(Move::Cell(4))));
        let state = TicTacToe.apply_move(&TicTacToe.initial_state(), &Move::Cell(4), Side::One);
        match arbiter().solicit(&TicTacToe, &state, &agent, &mut NullSink) {
            TurnOutcome::Fault(FailureReason::InvalidMove) => {}
            other => panic!("expected invalid-move fault, got {other:?}"),
        }
    }

    #[test]
    fn a_slow_model_times_out_and_its_late_result_is_discarded() {
        let agent = Agent::new(
            "slow",
            Side::One,
            Arc::new(SleepyModel {
                nap: Duration::from_millis(200),
                then: Move::Cell(0),
            }),
        );
        let state = TicTacToe.initial_state();
        match arbiter().solicit(&TicTacToe, &state, &agent, &mut NullSink) {
            TurnOutcome::Fault(FailureReason::Timeout) => {}
            other => panic!("expected timeout fault, got {other:?}"),
        }
        // Let the abandoned worker resolve, then confirm nothing changed.
        thread::sleep(Duration::from_millis(250));
        assert_eq!(state, TicTacToe.initial_state());
    }

    #[test]
    fn an_erroring_model_is_a_crash_fault() {
        let agent = Agent::new("broken", Side::One, Arc::new(FailingModel));
        let state = TicTacToe.initial_state();
        match arbiter().solicit(&TicTacToe, &state, &agent, &mut NullSink) {
            TurnOutcome::Fault(FailureReason::Crash) => {}
            other => panic!("expected crash fault, got {other:?}"),
        }
    }

    #[test]
    fn a_panicking_model_is_a_crash_fault() {
        let agent = Agent::new("panicky", Side::One, Arc::new(PanickingModel));
        let state = TicTacToe.initial_state();
        match arbiter().solicit(&TicTacToe, &state, &agent, &mut NullSink) {
            TurnOutcome::Fault(FailureReason::Crash) => {}
            other => panic!("expected crash fault, got {other:?}"),
        }
    }

    #[test]
    fn thinking_events_carry_the_elapsed_wait() {
        let agent = Agent::new(
            "ponderer",
            Side::Two,
            Arc::new(SleepyModel {
                nap: Duration::from_millis(45),
                then: Move::Cell(1),
            }),
        );
        let state = TicTacToe.initial_state();
        let mut ticks = Vec::new();
        let mut sink = |event: MatchEvent| {
            if let MatchEvent::Thinking { side, elapsed } = event {
                ticks.push((side, elapsed));
            }
        };
        let outcome = arbiter().solicit(&TicTacToe, &state, &agent, &mut sink);
        assert!(matches!(outcome, TurnOutcome::Accepted { .. }));
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|(side, _)| *side == Side::Two));
        assert!(ticks.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn cancel_token_is_sticky() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
