//! The admission gate an agent must pass before any match.
//!
//! Three probes, each under its own deadline: a `null` state, the game's
//! starting state, and a state with one move already played. A probe only
//! checks that the answer is in the game's move domain; full legality is the
//! arbiter's business once real play starts. Any wrong shape, error or
//! deadline miss rejects the agent with a [`Rejection`] naming the probe and
//! what came back, so whoever configured the agent can fix it.

use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tracing::info;

use crate::agent::Agent;
use crate::arbiter::{call_with_deadline, CallResult};
use crate::game::{GameRules, Move};

/// Which admission probe an agent is answering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// `propose(null)`, the required probe mode.
    Null,
    /// `propose` on the game's starting state.
    Initial,
    /// `propose` on a state with one prior move applied.
    MidGame,
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Probe::Null => "null-state probe (1/3)",
            Probe::Initial => "initial-state probe (2/3)",
            Probe::MidGame => "mid-game probe (3/3)",
        };
        f.write_str(text)
    }
}

/// Why an agent was refused admission.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The probe resolved but the move is not in the game's domain.
    #[error("{probe} returned an out-of-domain move: {got}")]
    OutOfDomain {
        /// The failing probe.
        probe: Probe,
        /// What the agent answered, in wire form.
        got: String,
    },
    /// The probe call errored or its worker died.
    #[error("{probe} failed: {cause:#}")]
    Failed {
        /// The failing probe.
        probe: Probe,
        /// The underlying error.
        cause: anyhow::Error,
    },
    /// The probe did not resolve within its deadline.
    #[error("{probe} missed its {limit:?} deadline")]
    TimedOut {
        /// The failing probe.
        probe: Probe,
        /// The deadline that was missed.
        limit: Duration,
    },
}

/// Runs the probe battery against an agent.
#[derive(Clone, Copy, Debug)]
pub struct AgentValidator {
    probe_deadline: Duration,
}

impl AgentValidator {
    /// A validator allowing `probe_deadline` per probe.
    pub fn new(probe_deadline: Duration) -> AgentValidator {
        AgentValidator { probe_deadline }
    }

    /// Run all three probes in order; the first failure rejects the agent.
    pub fn admit(&self, rules: &dyn GameRules, agent: &Agent) -> Result<(), Rejection> {
        let probes = [
            (Probe::Null, None),
            (Probe::Initial, Some(rules.initial_state())),
            (Probe::MidGame, Some(rules.probe_state())),
        ];
        for (probe, state) in probes {
            self.run_probe(rules, agent, probe, state)?;
        }
        info!(agent = agent.name(), game = rules.name(), "agent admitted");
        Ok(())
    }

    fn run_probe(
        &self,
        rules: &dyn GameRules,
        agent: &Agent,
        probe: Probe,
        state: Option<crate::game::GameState>,
    ) -> Result<(), Rejection> {
        // Probes reuse the in-match deadline race; no thinking ticks needed.
        let result = call_with_deadline(
            agent.model(),
            state,
            self.probe_deadline,
            self.probe_deadline,
            |_| {},
        );
        match result {
            CallResult::TimedOut => Err(Rejection::TimedOut {
                probe,
                limit: self.probe_deadline,
            }),
            CallResult::Died => Err(Rejection::Failed {
                probe,
                cause: anyhow!("the agent's call panicked"),
            }),
            CallResult::Resolved { mv: Err(cause), .. } => Err(Rejection::Failed { probe, cause }),
            CallResult::Resolved { mv: Ok(mv), .. } => {
                if rules.move_in_domain(&mv) {
                    Ok(())
                } else {
                    Err(Rejection::OutOfDomain {
                        probe,
                        got: describe_move(&mv),
                    })
                }
            }
        }
    }
}

fn describe_move(mv: &Move) -> String {
    serde_json::to_string(mv).unwrap_or_else(|_| format!("{mv:?}"))
}
