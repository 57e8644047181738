//! The normalized decision-procedure contract and the built-in heuristics.
//!
//! Whatever a decision procedure is (a built-in tactic, hosted source code,
//! an uploaded executable or a human operator), it reaches the engine as a
//! [`Model`]. The arbiter and everything above it never branch on where a
//! model came from.

use std::sync::{Arc, Mutex};

use anyhow::bail;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::{BoardState, Choice, GameState, Move, Side};

/// A decision procedure normalized to one call shape.
///
/// `propose(None)` is the admission-probe form: a model must answer it with a
/// domain-valid move without crashing. It is never used during real play.
///
/// The engine invokes `propose` from a disposable worker thread and races it
/// against the per-move deadline, so an implementation may block; it must not
/// assume its result will be used.
pub trait Model: Send + Sync {
    /// Propose a move for `state`, or a default-shaped move for `None`.
    fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move>;
}

/// Who an agent is within a match: a display name and a fixed side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Name shown in events, logs and stats.
    pub display_name: String,
    /// The side this agent plays for the whole match.
    pub side: Side,
}

impl AgentIdentity {
    /// Key under which this agent's record is persisted.
    pub fn stat_key(&self) -> String {
        format!("model_stats_{}", self.display_name)
    }
}

/// A participant: an identity plus its model.
pub struct Agent {
    identity: AgentIdentity,
    model: Arc<dyn Model>,
}

impl Agent {
    /// Wrap `model` as the agent playing `side` under `display_name`.
    pub fn new(display_name: impl Into<String>, side: Side, model: Arc<dyn Model>) -> Agent {
        Agent {
            identity: AgentIdentity {
                display_name: display_name.into(),
                side,
            },
            model,
        }
    }

    /// The agent's identity.
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// The agent's display name.
    pub fn name(&self) -> &str {
        &self.identity.display_name
    }

    /// The side this agent plays.
    pub fn side(&self) -> Side {
        self.identity.side
    }

    /// A handle to the model, cloneable into a worker thread.
    pub fn model(&self) -> Arc<dyn Model> {
        Arc::clone(&self.model)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Built-in tactic selection, one variant family per game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tactic {
    /// A grid-placement tactic.
    Grid(GridTactic),
    /// A simultaneous-choice tactic.
    Choice(ChoiceTactic),
}

/// Built-in grid tactics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridTactic {
    /// Take the center when free, otherwise a random empty cell.
    Center,
    /// Take a random free corner, otherwise a random empty cell.
    Corners,
    /// A uniformly random empty cell.
    Random,
}

/// Built-in simultaneous-choice tactics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTactic {
    /// A uniformly random pick.
    Random,
    /// Cycle rock, paper, scissors.
    Pattern,
    /// Beat the opponent's last observed pick; random before any observation.
    Counter,
    /// Counter with probability 0.7, otherwise random.
    Adaptive,
}

const CORNERS: [u8; 4] = [0, 2, 6, 8];

/// A built-in grid-placement model.
pub struct GridModel {
    tactic: GridTactic,
    rng: Mutex<ChaCha8Rng>,
}

impl GridModel {
    /// An entropy-seeded model playing `tactic`.
    pub fn new(tactic: GridTactic) -> GridModel {
        Self::with_seed(tactic, rand::random())
    }

    /// A deterministically seeded model, for reproducible play.
    pub fn with_seed(tactic: GridTactic, seed: u64) -> GridModel {
        GridModel {
            tactic,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn pick(&self, board: &BoardState) -> anyhow::Result<u8> {
        let empty: Vec<u8> = (0..9u8)
            .filter(|&cell| board[cell as usize].is_none())
            .collect();
        if empty.is_empty() {
            bail!("no empty cell to play");
        }
        let mut rng = self.rng.lock().expect("poisoned");
        let cell = match self.tactic {
            GridTactic::Center if board[4].is_none() => 4,
            GridTactic::Corners => {
                let free: Vec<u8> = CORNERS
                    .iter()
                    .copied()
                    .filter(|&c| board[c as usize].is_none())
                    .collect();
                if free.is_empty() {
                    empty[rng.gen_range(0..empty.len())]
                } else {
                    free[rng.gen_range(0..free.len())]
                }
            }
            _ => empty[rng.gen_range(0..empty.len())],
        };
        Ok(cell)
    }
}

impl Model for GridModel {
    fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move> {
        match state {
            Some(GameState::Grid(board)) => Ok(Move::Cell(self.pick(board)?)),
            // Probe form, or a state this tactic does not understand: answer
            // with the tactic's default shape and let the gate judge it.
            _ => Ok(Move::Cell(match self.tactic {
                GridTactic::Center => 4,
                GridTactic::Corners => {
                    let mut rng = self.rng.lock().expect("poisoned");
                    CORNERS[rng.gen_range(0..CORNERS.len())]
                }
                GridTactic::Random => {
                    let mut rng = self.rng.lock().expect("poisoned");
                    rng.gen_range(0..9)
                }
            })),
        }
    }
}

struct ChoiceMemory {
    rng: ChaCha8Rng,
    last_opponent: Option<Choice>,
    own_moves: u32,
}

/// A built-in simultaneous-choice model. Remembers the opponent's last
/// visible pick across calls, which is what the counter tactics feed on.
pub struct ChoiceModel {
    tactic: ChoiceTactic,
    side: Side,
    memory: Mutex<ChoiceMemory>,
}

impl ChoiceModel {
    /// An entropy-seeded model playing `tactic` for `side`.
    pub fn new(tactic: ChoiceTactic, side: Side) -> ChoiceModel {
        Self::with_seed(tactic, side, rand::random())
    }

    /// A deterministically seeded model, for reproducible play.
    pub fn with_seed(tactic: ChoiceTactic, side: Side, seed: u64) -> ChoiceModel {
        ChoiceModel {
            tactic,
            side,
            memory: Mutex::new(ChoiceMemory {
                rng: ChaCha8Rng::seed_from_u64(seed),
                last_opponent: None,
                own_moves: 0,
            }),
        }
    }
}

fn random_choice(rng: &mut ChaCha8Rng) -> Choice {
    Choice::ALL[rng.gen_range(0..Choice::ALL.len())]
}

impl Model for ChoiceModel {
    fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move> {
        let mut memory = self.memory.lock().expect("poisoned");
        if let Some(GameState::Choice(choices)) = state {
            let seen = match self.side {
                Side::One => choices.player2_choice,
                Side::Two => choices.player1_choice,
            };
            if seen.is_some() {
                memory.last_opponent = seen;
            }
        }
        let pick = match self.tactic {
            ChoiceTactic::Random => random_choice(&mut memory.rng),
            ChoiceTactic::Pattern => Choice::ALL[memory.own_moves as usize % Choice::ALL.len()],
            ChoiceTactic::Counter => match memory.last_opponent {
                Some(seen) => seen.counter(),
                None => random_choice(&mut memory.rng),
            },
            ChoiceTactic::Adaptive => {
                let last_opponent = memory.last_opponent;
                match last_opponent {
                    Some(seen) if memory.rng.gen_bool(0.7) => seen.counter(),
                    _ => random_choice(&mut memory.rng),
                }
            }
        };
        memory.own_moves += 1;
        Ok(Move::Choice(pick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ChoiceState, GameRules, RockPaperScissors, TicTacToe};

    #[test]
    fn center_tactic_opens_in_the_center() {
        let model = GridModel::with_seed(GridTactic::Center, 7);
        let state = TicTacToe.initial_state();
        assert_eq!(model.propose(Some(&state)).unwrap(), Move::Cell(4));
        assert_eq!(model.propose(None).unwrap(), Move::Cell(4));
    }

    #[test]
    fn corner_tactic_takes_a_free_corner() {
        let model = GridModel::with_seed(GridTactic::Corners, 7);
        let state = TicTacToe.initial_state();
        let Move::Cell(cell) = model.propose(Some(&state)).unwrap() else {
            panic!("grid tactic must answer with a cell");
        };
        assert!(CORNERS.contains(&cell));
    }

    #[test]
    fn grid_tactics_always_answer_with_a_legal_cell() {
        for tactic in [GridTactic::Center, GridTactic::Corners, GridTactic::Random] {
            let model = GridModel::with_seed(tactic, 42);
            let mut state = TicTacToe.initial_state();
            let mut mover = Side::One;
            for _ in 0..9 {
                let mv = model.propose(Some(&state)).unwrap();
                assert!(TicTacToe.legal_move(&state, &mv, mover), "{tactic:?}");
                state = TicTacToe.apply_move(&state, &mv, mover);
                mover = mover.opponent();
            }
        }
    }

    #[test]
    fn grid_model_refuses_a_full_board() {
        let model = GridModel::with_seed(GridTactic::Random, 1);
        let state = GameState::Grid([Some(Side::One); 9]);
        assert!(model.propose(Some(&state)).is_err());
    }

    #[test]
    fn pattern_tactic_cycles_the_three_choices() {
        let model = ChoiceModel::with_seed(ChoiceTactic::Pattern, Side::One, 1);
        let picks: Vec<Move> = (0..4).map(|_| model.propose(None).unwrap()).collect();
        assert_eq!(
            picks,
            vec![
                Move::Choice(Choice::Rock),
                Move::Choice(Choice::Paper),
                Move::Choice(Choice::Scissors),
                Move::Choice(Choice::Rock),
            ]
        );
    }

    #[test]
    fn counter_tactic_beats_the_observed_pick() {
        let model = ChoiceModel::with_seed(ChoiceTactic::Counter, Side::Two, 1);
        let state = GameState::Choice(ChoiceState {
            player1_choice: Some(Choice::Rock),
            round: 1,
            ..ChoiceState::default()
        });
        assert_eq!(
            model.propose(Some(&state)).unwrap(),
            Move::Choice(Choice::Paper)
        );
        // The observation is remembered once the slots clear.
        let cleared = RockPaperScissors::default().initial_state();
        assert_eq!(
            model.propose(Some(&cleared)).unwrap(),
            Move::Choice(Choice::Paper)
        );
    }

    #[test]
    fn seeded_models_are_reproducible() {
        let a = ChoiceModel::with_seed(ChoiceTactic::Random, Side::One, 99);
        let b = ChoiceModel::with_seed(ChoiceTactic::Random, Side::One, 99);
        for _ in 0..10 {
            assert_eq!(a.propose(None).unwrap(), b.propose(None).unwrap());
        }
    }

    #[test]
    fn stat_key_derives_from_the_display_name() {
        let agent = Agent::new(
            "Model X",
            Side::One,
            Arc::new(GridModel::with_seed(GridTactic::Center, 0)),
        );
        assert_eq!(agent.identity().stat_key(), "model_stats_Model X");
        assert_eq!(agent.side(), Side::One);
    }
}
