//! Running a configured sequence of matches and aggregating the result.
//!
//! The scheduler assembles and validates both agents once, then runs the
//! matches strictly one after another with the same pair, accounting every
//! outcome into the two stat records. A forfeited match never stops the
//! tournament; the next match starts regardless. Records are loaded from the
//! [`StatStore`] before the first match and saved after the last.

use anyhow::Context;
use serde::Serialize;
use tracing::{info, instrument};

use crate::agent::Agent;
use crate::arbiter::MoveArbiter;
use crate::configuration::ArenaConfig;
use crate::events::{EventSink, MatchEvent};
use crate::game::{GameRules, MatchOutcome, Side};
use crate::logger::init_logger;
use crate::match_controller::MatchController;
use crate::sources::{self, AgentSource};
use crate::stats::{StatRecord, StatStore, StatTracker};
use crate::validator::AgentValidator;

/// How many matches a tournament runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchCount {
    /// A single match.
    #[default]
    One,
    /// A series of 5.
    Five,
    /// A series of 10.
    Ten,
    /// A series of 20.
    Twenty,
}

impl MatchCount {
    /// The number of matches.
    pub fn count(self) -> usize {
        match self {
            MatchCount::One => 1,
            MatchCount::Five => 5,
            MatchCount::Ten => 10,
            MatchCount::Twenty => 20,
        }
    }

    /// The variant for `count`, if it is one of the supported series lengths.
    pub fn from_count(count: usize) -> Option<MatchCount> {
        match count {
            1 => Some(MatchCount::One),
            5 => Some(MatchCount::Five),
            10 => Some(MatchCount::Ten),
            20 => Some(MatchCount::Twenty),
            _ => None,
        }
    }
}

/// One side of the tournament configuration surface.
#[derive(Debug)]
pub struct SideConfig {
    /// Name shown in events, logs and stats.
    pub display_name: String,
    /// Where the side's decision procedure comes from.
    pub source: AgentSource,
}

impl SideConfig {
    /// A side playing as `display_name` from `source`.
    pub fn new(display_name: impl Into<String>, source: AgentSource) -> SideConfig {
        SideConfig {
            display_name: display_name.into(),
            source,
        }
    }
}

/// The aggregated result of a whole tournament.
#[derive(Clone, Debug, Serialize)]
pub struct TournamentResult {
    /// Every match outcome, in playing order.
    pub outcomes: Vec<MatchOutcome>,
    /// The side with more match wins; `None` is a tournament draw.
    pub winner: Option<Side>,
    /// Both final stat records, side 1 first.
    pub records: [StatRecord; 2],
}

impl TournamentResult {
    /// Matches `side` won, forfeits by the opponent included.
    pub fn wins(&self, side: Side) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.winning_side() == Some(side))
            .count()
    }
}

/// Runs tournaments between two configured sides.
pub struct TournamentScheduler<'r, S> {
    rules: &'r dyn GameRules,
    config: ArenaConfig,
    store: S,
}

impl<'r, S: StatStore> TournamentScheduler<'r, S> {
    /// A scheduler for `rules`, persisting stats through `store`.
    pub fn new(rules: &'r dyn GameRules, config: ArenaConfig, store: S) -> TournamentScheduler<'r, S> {
        if config.log {
            init_logger();
        }
        TournamentScheduler {
            rules,
            config,
            store,
        }
    }

    /// Assemble both sides from their sources, then run the tournament.
    ///
    /// Assembly and admission failures return before any match starts, with
    /// the failing agent and probe named.
    pub fn run(
        &self,
        one: SideConfig,
        two: SideConfig,
        events: &mut dyn EventSink,
    ) -> anyhow::Result<TournamentResult> {
        let one = sources::assemble(one.display_name, Side::One, one.source, &self.config)?;
        let two = sources::assemble(two.display_name, Side::Two, two.source, &self.config)?;
        self.run_agents(one, two, events)
    }

    /// Run the tournament between two already-constructed agents.
    ///
    /// Both agents still pass the admission probes; `one` must play side 1
    /// and `two` side 2.
    #[instrument(skip_all, fields(game = self.rules.name(), one = one.name(), two = two.name()))]
    pub fn run_agents(
        &self,
        one: Agent,
        two: Agent,
        events: &mut dyn EventSink,
    ) -> anyhow::Result<TournamentResult> {
        anyhow::ensure!(one.side() == Side::One, "first agent must play side 1");
        anyhow::ensure!(two.side() == Side::Two, "second agent must play side 2");

        let validator = AgentValidator::new(self.config.probe_deadline);
        for agent in [&one, &two] {
            validator
                .admit(self.rules, agent)
                .map_err(|rejection| anyhow::anyhow!(rejection))
                .with_context(|| format!("agent '{}' failed admission", agent.name()))?;
        }

        let mut tracker = StatTracker::new(self.load_record(&one)?, self.load_record(&two)?);

        let deadline = self
            .config
            .move_deadline
            .unwrap_or_else(|| self.rules.reference_deadline());
        let arbiter = MoveArbiter::new(deadline, self.config.thinking_tick);
        let mut controller = MatchController::new(self.rules, arbiter);

        let total = self.config.match_count.count();
        let mut outcomes = Vec::with_capacity(total);
        for number in 1..=total {
            events.emit(MatchEvent::MatchStarted { number, total });
            info!(number, total, "match starting");
            let outcome = controller.run(&one, &two, &mut tracker, events);
            match outcome {
                MatchOutcome::Winner(side) => {
                    tracker.record_win(side);
                    tracker.record_loss(side.opponent());
                }
                MatchOutcome::Draw => {
                    tracker.record_draw(Side::One);
                    tracker.record_draw(Side::Two);
                }
                MatchOutcome::Forfeit { side, .. } => {
                    tracker.record_loss(side);
                    tracker.record_win(side.opponent());
                }
            }
            if self.config.verbose {
                print_match_line(number, total, &one, &two, &outcome);
            }
            outcomes.push(outcome);
        }

        let records = tracker.into_records();
        for (agent, record) in [(&one, &records[0]), (&two, &records[1])] {
            self.store
                .save(&agent.identity().stat_key(), record)
                .with_context(|| format!("saving stats for '{}'", agent.name()))?;
        }

        let result = TournamentResult {
            winner: tournament_winner(&outcomes),
            outcomes,
            records,
        };
        if self.config.verbose {
            print_final_standing(&result, &one, &two);
        }
        info!(winner = ?result.winner, "tournament over");
        Ok(result)
    }

    fn load_record(&self, agent: &Agent) -> anyhow::Result<StatRecord> {
        let key = agent.identity().stat_key();
        let record = self
            .store
            .load(&key)
            .with_context(|| format!("loading stats for '{}'", agent.name()))?
            .unwrap_or_else(|| StatRecord::fresh(agent.name()));
        Ok(record)
    }
}

fn tournament_winner(outcomes: &[MatchOutcome]) -> Option<Side> {
    let wins = |side| {
        outcomes
            .iter()
            .filter(|outcome| outcome.winning_side() == Some(side))
            .count()
    };
    match wins(Side::One).cmp(&wins(Side::Two)) {
        std::cmp::Ordering::Greater => Some(Side::One),
        std::cmp::Ordering::Less => Some(Side::Two),
        std::cmp::Ordering::Equal => None,
    }
}

fn print_match_line(number: usize, total: usize, one: &Agent, two: &Agent, outcome: &MatchOutcome) {
    let name_of = |side| match side {
        Side::One => one.name(),
        Side::Two => two.name(),
    };
    let text = match outcome {
        MatchOutcome::Winner(side) => format!("{} wins", name_of(*side)),
        MatchOutcome::Draw => "draw".to_owned(),
        MatchOutcome::Forfeit { side, reason } => {
            format!("\x1b[31m{} forfeits ({reason})\x1b[39m", name_of(*side))
        }
    };
    // clear line, green header, result
    println!("\x1b[2K\x1b[32mMatch {number}/{total}:\x1b[39m {text}");
}

fn print_final_standing(result: &TournamentResult, one: &Agent, two: &Agent) {
    let headline = match result.winner {
        Some(Side::One) => format!("{} wins the tournament", one.name()),
        Some(Side::Two) => format!("{} wins the tournament", two.name()),
        None => "tournament drawn".to_owned(),
    };
    println!("\x1b[32m{headline}\x1b[39m");
    for record in &result.records {
        println!("  {}: {record}", record.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_counts_cover_the_supported_series() {
        assert_eq!(MatchCount::One.count(), 1);
        assert_eq!(MatchCount::Five.count(), 5);
        assert_eq!(MatchCount::Ten.count(), 10);
        assert_eq!(MatchCount::Twenty.count(), 20);
        assert_eq!(MatchCount::from_count(5), Some(MatchCount::Five));
        assert_eq!(MatchCount::from_count(7), None);
        for count in [1, 5, 10, 20] {
            assert_eq!(MatchCount::from_count(count).unwrap().count(), count);
        }
    }

    #[test]
    fn the_tournament_winner_has_the_most_match_wins() {
        use crate::game::FailureReason;
        let outcomes = vec![
            MatchOutcome::Winner(Side::One),
            MatchOutcome::Draw,
            MatchOutcome::Forfeit {
                side: Side::Two,
                reason: FailureReason::Crash,
            },
            MatchOutcome::Winner(Side::Two),
        ];
        assert_eq!(tournament_winner(&outcomes), Some(Side::One));
        assert_eq!(
            tournament_winner(&[MatchOutcome::Winner(Side::One), MatchOutcome::Winner(Side::Two)]),
            None
        );
        assert_eq!(tournament_winner(&[MatchOutcome::Draw]), None);
    }
}
