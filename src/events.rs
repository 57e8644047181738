//! The presentation boundary.
//!
//! The engine renders nothing itself: it emits [`MatchEvent`]s into an
//! [`EventSink`] supplied by the caller, and a UI (or nothing at all, see
//! [`NullSink`]) decides what to do with them.

use std::time::Duration;

use crate::game::{FailureReason, GameState, MatchOutcome, Side};

/// One observable step of a running match.
#[derive(Clone, Debug)]
pub enum MatchEvent {
    /// A match started, `number` of `total` within the tournament (1-based).
    MatchStarted {
        /// 1-based match number.
        number: usize,
        /// Total matches in the tournament.
        total: usize,
    },
    /// The opening draw picked `winner` to move first.
    CoinFlip {
        /// The side that won the draw.
        winner: Side,
    },
    /// `side` is still thinking, `elapsed` into its deadline.
    Thinking {
        /// The side whose move is being awaited.
        side: Side,
        /// Time since the move was solicited.
        elapsed: Duration,
    },
    /// A move was accepted and applied.
    MoveAccepted {
        /// The mover.
        side: Side,
        /// How long the mover took.
        latency: Duration,
        /// The state after the move.
        state: GameState,
    },
    /// A side was at fault; the match ends as its forfeit.
    Fault {
        /// The offending side.
        side: Side,
        /// What it did.
        reason: FailureReason,
    },
    /// The match reached its outcome.
    MatchOver {
        /// How it ended.
        outcome: MatchOutcome,
    },
}

/// Consumer of match events.
pub trait EventSink {
    /// Receive one event.
    fn emit(&mut self, event: MatchEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: MatchEvent) {}
}

impl<F: FnMut(MatchEvent)> EventSink for F {
    fn emit(&mut self, event: MatchEvent) {
        self(event)
    }
}
