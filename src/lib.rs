//! # Model Arena
//!
//! An arbitration and match orchestration engine for turn-based games between
//! independently supplied decision procedures.
//!
//! It provides:
//! - Match and tournament execution ([`TournamentScheduler`](crate::tournament::TournamentScheduler))
//! - Pluggable game rules via the [`GameRules`](crate::game::GameRules) trait,
//!   with [`TicTacToe`](crate::game::TicTacToe) and
//!   [`RockPaperScissors`](crate::game::RockPaperScissors) built in
//! - Agents from five sources (built-in heuristics, inline source text,
//!   fetched source text, uploaded executables and human operators), all
//!   normalized to one [`Model`](crate::agent::Model) contract
//! - A three-probe admission gate
//!   ([`AgentValidator`](crate::validator::AgentValidator)) and per-move
//!   deadline arbitration with true cancellation of late results
//! - Per-agent statistics persisted through a caller-supplied
//!   [`StatStore`](crate::stats::StatStore)
//!
//! Agents built from source text or uploaded artifacts each run as a separate
//! OS process; a crashing, looping or stalling agent forfeits its own match
//! and nothing else.
//!
//! # Documentation Overview
//!
//! - For tournament execution and outcome aggregation, see the
//!   [`tournament`] module.
//! - For configuring deadlines, match counts and logging, see
//!   [`ArenaConfig`](crate::configuration::ArenaConfig).
//! - For the per-move deadline race and fault classification, see the
//!   [`arbiter`] module.
//! - For supplying agents and writing external ones, see [`sources`] and the
//!   protocol notes below.
//! - For watching a match from a UI, see the [`events`] module.
//!
//! # Usage Example
//!
//! Running a five-match grid tournament between two built-in heuristics:
//!
//! ```no_run
//! use model_arena::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ArenaConfig::new()
//!         .with_match_count(MatchCount::Five)
//!         .with_verbose(false);
//!
//!     let scheduler = TournamentScheduler::new(&TicTacToe, config, MemoryStore::new());
//!     let result = scheduler.run(
//!         SideConfig::new(
//!             "Centrist",
//!             AgentSource::Heuristic(Tactic::Grid(GridTactic::Center)),
//!         ),
//!         SideConfig::new(
//!             "Chaos",
//!             AgentSource::Heuristic(Tactic::Grid(GridTactic::Random)),
//!         ),
//!         &mut NullSink,
//!     )?;
//!
//!     match result.winner {
//!         Some(side) => println!("side {side} takes the tournament"),
//!         None => println!("tournament drawn"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example Agent
//!
//! An external agent is any program that connects back to the engine over
//! loopback TCP. Here is a complete choice-game agent that always plays rock:
//!
//! ```no_run
//! use std::env;
//! use std::io::{BufRead, BufReader, Write};
//! use std::net::TcpStream;
//!
//! fn main() -> std::io::Result<()> {
//!     // The engine appends the port to connect to as the last argument.
//!     let port = env::args().last().unwrap();
//!     let stream = TcpStream::connect(format!("127.0.0.1:{port}"))?;
//!     let mut reader = BufReader::new(stream.try_clone()?);
//!     let mut stream = stream;
//!
//!     let mut line = String::new();
//!     loop {
//!         line.clear();
//!         if reader.read_line(&mut line)? == 0 {
//!             return Ok(()); // engine hung up
//!         }
//!         // `line` holds the game state (`null` during admission probes).
//!         // This agent does not read it; it always answers rock.
//!         stream.write_all(b"\"rock\"\n")?;
//!     }
//! }
//! ```
//!
//! ## Agent Requirements
//!
//! - Connect to `127.0.0.1` on the port given as the last argument, within a
//!   few seconds of being spawned
//! - Speak one line of JSON each way per move:
//!   * Engine -> Agent : the game state, either a 9-element array of
//!     `null`/`1`/`2` for the grid game or a `{"player1Choice", ...}` object
//!     for the choice game, or `null` for an admission probe
//!   * Agent -> Engine : the move, either a bare cell index `0..=8` or one of
//!     `"rock"`, `"paper"`, `"scissors"`
//! - Answer each admission probe within the probe deadline (2 seconds by
//!   default) and each real move within the per-move deadline
#![warn(missing_docs)]

pub use anyhow;

pub mod agent;
pub mod arbiter;
pub mod configuration;
pub mod events;
pub mod game;
pub mod human;
mod logger;
pub mod match_controller;
pub mod sources;
pub mod stats;
pub mod tournament;
pub mod validator;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use model_arena::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, ChoiceTactic, GridTactic, Model, Tactic};
    pub use crate::configuration::ArenaConfig;
    pub use crate::events::{EventSink, MatchEvent, NullSink};
    pub use crate::game::{
        Choice, FailureReason, GameRules, GameState, MatchOutcome, Move, RockPaperScissors, Side,
        TicTacToe,
    };
    pub use crate::human::bridge;
    pub use crate::sources::{AgentSource, FileFetcher, SourceFetcher};
    pub use crate::stats::{JsonFileStore, MemoryStore, StatRecord, StatStore};
    pub use crate::tournament::{MatchCount, SideConfig, TournamentResult, TournamentScheduler};
    pub use crate::validator::AgentValidator;
}
