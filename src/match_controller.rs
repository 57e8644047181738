//! One match end-to-end: opening draw, turn loop, termination.
//!
//! The controller is a small state machine. `Terminal` is absorbing: once an
//! outcome exists no further move is solicited, and a fault transitions there
//! directly from any turn.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::agent::Agent;
use crate::arbiter::{MoveArbiter, TurnOutcome};
use crate::events::{EventSink, MatchEvent};
use crate::game::{FailureReason, GameRules, MatchOutcome, Side};
use crate::stats::StatTracker;

enum MatchPhase {
    NotStarted,
    CoinFlip,
    InProgress(Side),
    Terminal(MatchOutcome),
}

/// Drives one match between two agents to its outcome.
pub struct MatchController<'r> {
    rules: &'r dyn GameRules,
    arbiter: MoveArbiter,
    rng: ChaCha8Rng,
}

impl<'r> MatchController<'r> {
    /// A controller for `rules` soliciting moves through `arbiter`, with an
    /// entropy-seeded opening draw.
    pub fn new(rules: &'r dyn GameRules, arbiter: MoveArbiter) -> MatchController<'r> {
        Self::with_seed(rules, arbiter, rand::random())
    }

    /// Like [`new`](Self::new) with a deterministic opening draw, for
    /// reproducible matches.
    pub fn with_seed(rules: &'r dyn GameRules, arbiter: MoveArbiter, seed: u64) -> MatchController<'r> {
        MatchController {
            rules,
            arbiter,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Run one match. `one` must play side 1 and `two` side 2.
    ///
    /// Per-turn accounting (move latencies, fault counters, coin-flip
    /// credit) is recorded into `tracker` as it happens; win/loss/draw
    /// accounting from the returned outcome is the caller's job.
    #[instrument(skip_all, fields(game = self.rules.name()))]
    pub fn run(
        &mut self,
        one: &Agent,
        two: &Agent,
        tracker: &mut StatTracker,
        events: &mut dyn EventSink,
    ) -> MatchOutcome {
        assert_eq!(one.side(), Side::One, "first agent must play side 1");
        assert_eq!(two.side(), Side::Two, "second agent must play side 2");

        let mut state = self.rules.initial_state();
        let mut phase = MatchPhase::NotStarted;
        loop {
            phase = match phase {
                MatchPhase::NotStarted => match self.rules.opening_side() {
                    Some(side) => MatchPhase::InProgress(side),
                    None => MatchPhase::CoinFlip,
                },
                MatchPhase::CoinFlip => {
                    let winner = if self.rng.gen::<bool>() {
                        Side::One
                    } else {
                        Side::Two
                    };
                    tracker.record_coin_flip(winner);
                    events.emit(MatchEvent::CoinFlip { winner });
                    info!(%winner, "coin flip");
                    MatchPhase::InProgress(winner)
                }
                MatchPhase::InProgress(side) => {
                    let agent = match side {
                        Side::One => one,
                        Side::Two => two,
                    };
                    match self.arbiter.solicit(self.rules, &state, agent, events) {
                        TurnOutcome::Accepted { state: next, latency } => {
                            tracker.record_move(side, latency);
                            state = next;
                            events.emit(MatchEvent::MoveAccepted {
                                side,
                                latency,
                                state: state.clone(),
                            });
                            match self.rules.outcome(&state) {
                                Some(outcome) => MatchPhase::Terminal(outcome),
                                None => MatchPhase::InProgress(self.rules.next_side(&state, side)),
                            }
                        }
                        TurnOutcome::Fault(reason) => {
                            match reason {
                                FailureReason::InvalidMove => tracker.record_invalid_move(side),
                                FailureReason::Timeout => tracker.record_timeout(side),
                                FailureReason::Crash => tracker.record_crash(side),
                                // Malformed agents never reach a match.
                                FailureReason::MalformedAgent => {}
                            }
                            events.emit(MatchEvent::Fault { side, reason });
                            MatchPhase::Terminal(MatchOutcome::Forfeit { side, reason })
                        }
                    }
                }
                MatchPhase::Terminal(outcome) => {
                    events.emit(MatchEvent::MatchOver { outcome });
                    info!(?outcome, "match over");
                    return outcome;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::agent::Model;
    use crate::events::NullSink;
    use crate::game::{Choice, GameState, Move, RockPaperScissors, TicTacToe};
    use crate::stats::StatRecord;

    struct FirstEmpty;

    impl Model for FirstEmpty {
        fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move> {
            let Some(GameState::Grid(board)) = state else {
                return Ok(Move::Cell(0));
            };
            let cell = board
                .iter()
                .position(Option::is_none)
                .ok_or_else(|| anyhow::anyhow!("board is full"))?;
            Ok(Move::Cell(cell as u8))
        }
    }

    struct Always(Choice);

    impl Model for Always {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            Ok(Move::Choice(self.0))
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn propose(&self, _state: Option<&GameState>) -> anyhow::Result<Move> {
            anyhow::bail!("induced failure")
        }
    }

    fn arbiter() -> MoveArbiter {
        MoveArbiter::new(Duration::from_millis(500), Duration::from_millis(50))
    }

    fn tracker() -> StatTracker {
        StatTracker::new(StatRecord::fresh("one"), StatRecord::fresh("two"))
    }

    #[test]
    fn grid_match_is_won_by_the_coin_flip_winner_under_first_empty_play() {
        // First-empty play gives the opener cells 0, 2, 4, 6: a win line.
        let one = Agent::new("one", Side::One, Arc::new(FirstEmpty));
        let two = Agent::new("two", Side::Two, Arc::new(FirstEmpty));
        let mut tracker = tracker();
        let mut opener = None;
        let mut sink = |event: MatchEvent| {
            if let MatchEvent::CoinFlip { winner } = event {
                opener = Some(winner);
            }
        };
        let mut controller = MatchController::with_seed(&TicTacToe, arbiter(), 11);
        let outcome = controller.run(&one, &two, &mut tracker, &mut sink);
        let opener = opener.expect("grid matches open with a coin flip");
        assert_eq!(outcome, MatchOutcome::Winner(opener));
        assert_eq!(tracker.record(opener).coin_flips_won, 1);
        // 4 opener moves + 3 replies were accepted.
        let moves: u32 = [Side::One, Side::Two]
            .iter()
            .map(|&s| tracker.record(s).total_moves)
            .sum();
        assert_eq!(moves, 7);
    }

    #[test]
    fn both_openers_occur_across_seeds() {
        let mut seen = [false; 2];
        for seed in 0..32 {
            let mut controller = MatchController::with_seed(&TicTacToe, arbiter(), seed);
            let one = Agent::new("one", Side::One, Arc::new(FirstEmpty));
            let two = Agent::new("two", Side::Two, Arc::new(FirstEmpty));
            let mut tracker = tracker();
            let mut opener = None;
            let mut sink = |event: MatchEvent| {
                if let MatchEvent::CoinFlip { winner } = event {
                    opener = Some(winner);
                }
            };
            controller.run(&one, &two, &mut tracker, &mut sink);
            seen[opener.unwrap().index()] = true;
        }
        assert_eq!(seen, [true, true], "the draw must reach both sides");
    }

    #[test]
    fn choice_match_opens_with_side_one_and_resolves_by_the_relation() {
        let rules = RockPaperScissors::default();
        let one = Agent::new("one", Side::One, Arc::new(Always(Choice::Rock)));
        let two = Agent::new("two", Side::Two, Arc::new(Always(Choice::Paper)));
        let mut tracker = tracker();
        let mut flips = 0;
        let mut sink = |event: MatchEvent| {
            if matches!(event, MatchEvent::CoinFlip { .. }) {
                flips += 1;
            }
        };
        let mut controller = MatchController::with_seed(&rules, arbiter(), 3);
        let outcome = controller.run(&one, &two, &mut tracker, &mut sink);
        assert_eq!(outcome, MatchOutcome::Winner(Side::Two));
        assert_eq!(flips, 0, "pre-assigned turn order has no coin flip");
        assert_eq!(tracker.record(Side::One).total_moves, 1);
        assert_eq!(tracker.record(Side::Two).total_moves, 1);
    }

    #[test]
    fn a_crash_forfeits_the_match_to_the_opponent() {
        let rules = RockPaperScissors::default();
        let one = Agent::new("one", Side::One, Arc::new(Always(Choice::Rock)));
        let two = Agent::new("two", Side::Two, Arc::new(FailingModel));
        let mut tracker = tracker();
        let mut controller = MatchController::with_seed(&rules, arbiter(), 3);
        let outcome = controller.run(&one, &two, &mut tracker, &mut NullSink);
        assert_eq!(
            outcome,
            MatchOutcome::Forfeit {
                side: Side::Two,
                reason: FailureReason::Crash
            }
        );
        assert_eq!(tracker.record(Side::Two).crashes, 1);
        // Side 1's accepted move still counted before the forfeit.
        assert_eq!(tracker.record(Side::One).total_moves, 1);
    }

    #[test]
    fn match_over_is_the_final_event() {
        let rules = RockPaperScissors::default();
        let one = Agent::new("one", Side::One, Arc::new(Always(Choice::Rock)));
        let two = Agent::new("two", Side::Two, Arc::new(Always(Choice::Rock)));
        let mut tracker = tracker();
        let mut last = None;
        let mut sink = |event: MatchEvent| last = Some(event);
        let mut controller = MatchController::with_seed(&rules, arbiter(), 3);
        let outcome = controller.run(&one, &two, &mut tracker, &mut sink);
        assert_eq!(outcome, MatchOutcome::Draw);
        assert!(matches!(
            last,
            Some(MatchEvent::MatchOver {
                outcome: MatchOutcome::Draw
            })
        ));
    }
}
