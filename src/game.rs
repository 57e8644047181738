//! Rules, states and outcomes for the two supported games.
//!
//! Everything in this module is pure data and pure functions: no I/O, no
//! clocks, no randomness. The [`GameRules`] trait is the seam the rest of the
//! engine drives; [`TicTacToe`] and [`RockPaperScissors`] are the two
//! built-in rule sets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One of the two parties of a match. Fixed for an agent's lifetime within a
/// match.
///
/// Serialized as `1` / `2`, which is also how grid cells are marked on the
/// wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Side {
    /// Party 1 ("X" on a grid board).
    One,
    /// Party 2 ("O" on a grid board).
    Two,
}

impl Side {
    /// The other party.
    pub fn opponent(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// Zero-based index, convenient for per-side arrays.
    pub fn index(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        match side {
            Side::One => 1,
            Side::Two => 2,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = String;

    fn try_from(value: u8) -> Result<Side, String> {
        match value {
            1 => Ok(Side::One),
            2 => Ok(Side::Two),
            other => Err(format!("side must be 1 or 2, got {other}")),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A simultaneous-choice pick. Serialized lowercase (`"rock"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    /// Beats scissors.
    Rock,
    /// Beats rock.
    Paper,
    /// Beats paper.
    Scissors,
}

impl Choice {
    /// All three choices, in the fixed cycle order.
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// True if `self` wins against `other` under the fixed cyclic relation.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
                | (Choice::Paper, Choice::Rock)
        )
    }

    /// The choice that beats `self`.
    pub fn counter(self) -> Choice {
        match self {
            Choice::Rock => Choice::Paper,
            Choice::Paper => Choice::Scissors,
            Choice::Scissors => Choice::Rock,
        }
    }
}

/// A move proposed by an agent: a cell index for grid games, a pick for
/// choice games.
///
/// Untagged on the wire: a grid move is a bare integer, a choice move a bare
/// string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Move {
    /// Cell index `0..=8`, row-major.
    Cell(u8),
    /// A simultaneous-choice pick.
    Choice(Choice),
}

/// A grid board: 9 cells, row-major, each empty or marked by one side.
///
/// Serializes to the 9-element array form (`[null, 1, 2, ...]`) that external
/// agents receive.
pub type BoardState = [Option<Side>; 9];

/// State of a simultaneous-choice game between rounds and mid-round.
///
/// A side's choice slot is empty before that side has moved in the current
/// round and filled after; both slots reset when the round resolves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceState {
    /// Side 1's pick for the round in progress.
    pub player1_choice: Option<Choice>,
    /// Side 2's pick for the round in progress.
    pub player2_choice: Option<Choice>,
    /// Rounds won by side 1 so far.
    pub player1_score: u32,
    /// Rounds won by side 2 so far.
    pub player2_score: u32,
    /// Current round, starting at 1.
    pub round: u32,
}

/// The state of one game, one variant per supported game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GameState {
    /// Grid-placement game board.
    Grid(BoardState),
    /// Simultaneous-choice game state.
    Choice(ChoiceState),
}

/// Why an agent was at fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The agent answered in time but the move was not legal.
    InvalidMove,
    /// The per-move deadline elapsed before the agent answered.
    Timeout,
    /// The agent's call errored or its worker died.
    Crash,
    /// The agent failed the admission probes and never entered a match.
    MalformedAgent,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FailureReason::InvalidMove => "invalid move",
            FailureReason::Timeout => "timeout",
            FailureReason::Crash => "crash",
            FailureReason::MalformedAgent => "malformed agent",
        };
        f.write_str(text)
    }
}

/// How one match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// A side won by play.
    Winner(Side),
    /// Neither side won.
    Draw,
    /// A side lost by misbehaving rather than by play.
    Forfeit {
        /// The side that forfeited.
        side: Side,
        /// What it did.
        reason: FailureReason,
    },
}

impl MatchOutcome {
    /// The side credited with the match win, if any.
    pub fn winning_side(&self) -> Option<Side> {
        match self {
            MatchOutcome::Winner(side) => Some(*side),
            MatchOutcome::Draw => None,
            MatchOutcome::Forfeit { side, .. } => Some(side.opponent()),
        }
    }
}

/// Legality and termination logic for one game.
///
/// Implementations must be pure: the engine calls these from its single
/// orchestration thread and relies on `apply_move` never observing I/O or
/// mutating anything but the returned state.
pub trait GameRules: Send + Sync {
    /// Short human-readable game name, used in logs and events.
    fn name(&self) -> &'static str;

    /// The canonical starting state.
    fn initial_state(&self) -> GameState;

    /// The starting state with one side-1 move already applied. Used only by
    /// the admission probes.
    fn probe_state(&self) -> GameState;

    /// Shape/domain check for a move, independent of any state: the right
    /// variant for this game and within the value domain (cell `< 9`).
    fn move_in_domain(&self, mv: &Move) -> bool;

    /// Full legality of `mv` for `side` against `state`. A move or state of
    /// the wrong variant for this game is illegal, not unevaluated.
    fn legal_move(&self, state: &GameState, mv: &Move, side: Side) -> bool;

    /// Pure transition. Only called after `legal_move` passed.
    fn apply_move(&self, state: &GameState, mv: &Move, side: Side) -> GameState;

    /// `Some(outcome)` once the state is terminal, `None` while in progress.
    /// Never reports a forfeit; forfeits are decided by the match controller.
    fn outcome(&self, state: &GameState) -> Option<MatchOutcome>;

    /// The side that opens the match, or `None` when the opener is decided
    /// by a coin flip.
    fn opening_side(&self) -> Option<Side>;

    /// The side to move after `last_mover` moved, given the resulting state.
    fn next_side(&self, state: &GameState, last_mover: Side) -> Side;

    /// Reference per-move deadline for scheduled play. The tournament
    /// configuration may override it.
    fn reference_deadline(&self) -> Duration;
}

/// The 8 canonical win lines: 3 rows, 3 columns, 2 diagonals.
const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// The grid-placement game on a 3x3 board.
#[derive(Clone, Copy, Debug, Default)]
pub struct TicTacToe;

impl TicTacToe {
    /// The winning line of `board`, if any, for result highlighting.
    pub fn winning_line(board: &BoardState) -> Option<[usize; 3]> {
        WIN_LINES
            .iter()
            .copied()
            .find(|&[a, b, c]| board[a].is_some() && board[a] == board[b] && board[a] == board[c])
    }
}

impl GameRules for TicTacToe {
    fn name(&self) -> &'static str {
        "tic-tac-toe"
    }

    fn initial_state(&self) -> GameState {
        GameState::Grid([None; 9])
    }

    fn probe_state(&self) -> GameState {
        let mut board = [None; 9];
        board[4] = Some(Side::One);
        GameState::Grid(board)
    }

    fn move_in_domain(&self, mv: &Move) -> bool {
        matches!(mv, Move::Cell(cell) if *cell < 9)
    }

    fn legal_move(&self, state: &GameState, mv: &Move, _side: Side) -> bool {
        match (state, mv) {
            (GameState::Grid(board), Move::Cell(cell)) => {
                *cell < 9 && board[*cell as usize].is_none()
            }
            _ => false,
        }
    }

    fn apply_move(&self, state: &GameState, mv: &Move, side: Side) -> GameState {
        let (GameState::Grid(board), Move::Cell(cell)) = (state, mv) else {
            return state.clone();
        };
        let mut board = *board;
        board[*cell as usize] = Some(side);
        GameState::Grid(board)
    }

    fn outcome(&self, state: &GameState) -> Option<MatchOutcome> {
        let GameState::Grid(board) = state else {
            return None;
        };
        if let Some(line) = Self::winning_line(board) {
            return board[line[0]].map(MatchOutcome::Winner);
        }
        if board.iter().all(Option::is_some) {
            return Some(MatchOutcome::Draw);
        }
        None
    }

    fn opening_side(&self) -> Option<Side> {
        None // coin flip
    }

    fn next_side(&self, _state: &GameState, last_mover: Side) -> Side {
        last_mover.opponent()
    }

    fn reference_deadline(&self) -> Duration {
        Duration::from_secs(10)
    }
}

/// The simultaneous-choice game, played as a fixed number of rounds.
#[derive(Clone, Copy, Debug)]
pub struct RockPaperScissors {
    rounds_per_match: u32,
}

impl RockPaperScissors {
    /// A match of `rounds_per_match` rounds; the match winner is the side
    /// with the higher score once all rounds resolved.
    pub fn new(rounds_per_match: u32) -> Self {
        assert!(rounds_per_match >= 1, "a match needs at least one round");
        Self { rounds_per_match }
    }

    /// Rounds a match runs for.
    pub fn rounds_per_match(&self) -> u32 {
        self.rounds_per_match
    }
}

impl Default for RockPaperScissors {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GameRules for RockPaperScissors {
    fn name(&self) -> &'static str {
        "rock-paper-scissors"
    }

    fn initial_state(&self) -> GameState {
        GameState::Choice(ChoiceState {
            round: 1,
            ..ChoiceState::default()
        })
    }

    fn probe_state(&self) -> GameState {
        GameState::Choice(ChoiceState {
            player1_choice: Some(Choice::Rock),
            round: 1,
            ..ChoiceState::default()
        })
    }

    fn move_in_domain(&self, mv: &Move) -> bool {
        matches!(mv, Move::Choice(_))
    }

    fn legal_move(&self, state: &GameState, mv: &Move, side: Side) -> bool {
        match (state, mv) {
            (GameState::Choice(choices), Move::Choice(_)) => match side {
                Side::One => choices.player1_choice.is_none(),
                Side::Two => choices.player2_choice.is_none(),
            },
            _ => false,
        }
    }

    fn apply_move(&self, state: &GameState, mv: &Move, side: Side) -> GameState {
        let (GameState::Choice(choices), Move::Choice(pick)) = (state, mv) else {
            return state.clone();
        };
        let mut next = choices.clone();
        match side {
            Side::One => next.player1_choice = Some(*pick),
            Side::Two => next.player2_choice = Some(*pick),
        }
        // Both picks in: the round resolves.
        if let (Some(one), Some(two)) = (next.player1_choice, next.player2_choice) {
            if one.beats(two) {
                next.player1_score += 1;
            } else if two.beats(one) {
                next.player2_score += 1;
            }
            next.round += 1;
            next.player1_choice = None;
            next.player2_choice = None;
        }
        GameState::Choice(next)
    }

    fn outcome(&self, state: &GameState) -> Option<MatchOutcome> {
        let GameState::Choice(choices) = state else {
            return None;
        };
        if choices.round <= self.rounds_per_match {
            return None;
        }
        Some(match choices.player1_score.cmp(&choices.player2_score) {
            std::cmp::Ordering::Greater => MatchOutcome::Winner(Side::One),
            std::cmp::Ordering::Less => MatchOutcome::Winner(Side::Two),
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        })
    }

    fn opening_side(&self) -> Option<Side> {
        Some(Side::One)
    }

    fn next_side(&self, state: &GameState, _last_mover: Side) -> Side {
        match state {
            GameState::Choice(choices)
                if choices.player1_choice.is_some() && choices.player2_choice.is_none() =>
            {
                Side::Two
            }
            _ => Side::One,
        }
    }

    fn reference_deadline(&self) -> Duration {
        Duration::from_secs(5)
    }
}

#[cfg(test)]
mod grid_tests {
    use super::*;

    fn board_from(cells: [u8; 9]) -> BoardState {
        cells.map(|c| match c {
            0 => None,
            1 => Some(Side::One),
            2 => Some(Side::Two),
            _ => unreachable!(),
        })
    }

    #[test]
    fn every_win_line_is_detected_for_both_sides() {
        for line in WIN_LINES {
            for side in [Side::One, Side::Two] {
                let mut board: BoardState = [None; 9];
                for cell in line {
                    board[cell] = Some(side);
                }
                let state = GameState::Grid(board);
                assert_eq!(
                    TicTacToe.outcome(&state),
                    Some(MatchOutcome::Winner(side)),
                    "line {line:?} for side {side}"
                );
                assert_eq!(TicTacToe::winning_line(&board), Some(line));
            }
        }
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        // 1 2 1 / 1 2 2 / 2 1 1 has no three-in-a-row.
        let board = board_from([1, 2, 1, 1, 2, 2, 2, 1, 1]);
        assert_eq!(TicTacToe::winning_line(&board), None);
        assert_eq!(
            TicTacToe.outcome(&GameState::Grid(board)),
            Some(MatchOutcome::Draw)
        );
    }

    #[test]
    fn partial_board_is_in_progress() {
        let board = board_from([1, 2, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(TicTacToe.outcome(&GameState::Grid(board)), None);
    }

    #[test]
    fn last_empty_cell_is_legal_for_both_sides() {
        for hole in 0..9u8 {
            let mut cells = [0u8; 9];
            // Checkerboard fill; legality does not look at win lines.
            for (i, cell) in cells.iter_mut().enumerate() {
                *cell = if i % 2 == 0 { 1 } else { 2 };
            }
            cells[hole as usize] = 0;
            let state = GameState::Grid(board_from(cells));
            for side in [Side::One, Side::Two] {
                assert!(TicTacToe.legal_move(&state, &Move::Cell(hole), side));
            }
        }
    }

    #[test]
    fn occupied_cell_and_out_of_range_are_illegal() {
        let state = GameState::Grid(board_from([1, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert!(!TicTacToe.legal_move(&state, &Move::Cell(0), Side::Two));
        assert!(!TicTacToe.legal_move(&state, &Move::Cell(9), Side::Two));
        assert!(!TicTacToe.move_in_domain(&Move::Cell(9)));
        assert!(!TicTacToe.legal_move(&state, &Move::Choice(Choice::Rock), Side::Two));
        assert!(!TicTacToe.move_in_domain(&Move::Choice(Choice::Rock)));
    }

    #[test]
    fn apply_changes_exactly_one_cell_to_the_movers_mark() {
        let before = TicTacToe.initial_state();
        let after = TicTacToe.apply_move(&before, &Move::Cell(4), Side::Two);
        let (GameState::Grid(old), GameState::Grid(new)) = (&before, &after) else {
            panic!("not grid states");
        };
        let changed: Vec<usize> = (0..9).filter(|&i| old[i] != new[i]).collect();
        assert_eq!(changed, vec![4]);
        assert_eq!(new[4], Some(Side::Two));
    }

    #[test]
    fn alternation_is_strict() {
        let state = TicTacToe.initial_state();
        assert_eq!(TicTacToe.next_side(&state, Side::One), Side::Two);
        assert_eq!(TicTacToe.next_side(&state, Side::Two), Side::One);
        assert_eq!(TicTacToe.opening_side(), None);
    }

    #[test]
    fn board_wire_format_is_the_nine_element_array() {
        let state = GameState::Grid(board_from([1, 2, 0, 0, 0, 0, 0, 0, 0]));
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "[1,2,null,null,null,null,null,null,null]");
        assert_eq!(serde_json::from_str::<GameState>(&json).unwrap(), state);
        assert_eq!(serde_json::to_string(&Move::Cell(4)).unwrap(), "4");
    }
}
