//! Config for the engine's behaviors.
//!
//! Configuration can be created programmatically using [`ArenaConfig::new()`]
//! or by reading environment variables using [`ArenaConfig::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive and enabled by setting
//! the value to `"true"`; durations are integer milliseconds.
//!
//! - `ARENA_VERBOSE`: print match progress to stdout (default: `true`)
//! - `ARENA_LOG`: log to a timestamped file (default: `false`)
//! - `ARENA_MOVE_DEADLINE_MS`: per-move deadline override (default: the
//!   game's reference deadline)
//! - `ARENA_PROBE_DEADLINE_MS`: per-probe deadline (default: `2000`)
//! - `ARENA_MATCH_COUNT`: matches per tournament, one of `1`, `5`, `10`,
//!   `20` (default: `1`)
//! - `ARENA_DEBUG_AGENT_STDERR`: let hosted agents inherit stderr
//!   (default: `false`)

use std::time::Duration;

use crate::tournament::MatchCount;

/// Configuration for the scheduler, arbiter and agent hosting.
#[derive(Debug, Clone, Copy)]
pub struct ArenaConfig {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) move_deadline: Option<Duration>,
    pub(crate) probe_deadline: Duration,
    pub(crate) thinking_tick: Duration,
    pub(crate) match_count: MatchCount,
    pub(crate) debug_agent_stderr: bool,
}

impl ArenaConfig {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Match progress is printed to stdout.
    /// - Logging to file is disabled.
    /// - The per-move deadline is the game's reference deadline.
    /// - Admission probes get 2 seconds each.
    /// - Thinking events are emitted every 100 ms while a move is awaited.
    /// - A tournament is a single match.
    /// - Hosted agents' stderr is discarded.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            move_deadline: None,
            probe_deadline: Duration::from_secs(2),
            thinking_tick: Duration::from_millis(100),
            match_count: MatchCount::One,
            debug_agent_stderr: false,
        }
    }

    /// Create configuration from environment variables; any unset or
    /// unparsable variable falls back to its default.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }
        fn get_env_ms(var: &str) -> Option<Duration> {
            std::env::var(var)
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .map(Duration::from_millis)
        }

        let defaults = Self::new();
        Self {
            verbose: get_env_flag("ARENA_VERBOSE", defaults.verbose),
            log: get_env_flag("ARENA_LOG", defaults.log),
            move_deadline: get_env_ms("ARENA_MOVE_DEADLINE_MS"),
            probe_deadline: get_env_ms("ARENA_PROBE_DEADLINE_MS")
                .unwrap_or(defaults.probe_deadline),
            thinking_tick: defaults.thinking_tick,
            match_count: std::env::var("ARENA_MATCH_COUNT")
                .ok()
                .and_then(|val| val.parse::<usize>().ok())
                .and_then(MatchCount::from_count)
                .unwrap_or(defaults.match_count),
            debug_agent_stderr: get_env_flag("ARENA_DEBUG_AGENT_STDERR", false),
        }
    }

    /// Enable or disable stdout progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Override the per-move deadline for scheduled play. `None` uses the
    /// game's reference deadline.
    pub fn with_move_deadline(mut self, value: Option<Duration>) -> Self {
        self.move_deadline = value;
        self
    }

    /// Set the per-probe deadline for agent admission.
    pub fn with_probe_deadline(mut self, value: Duration) -> Self {
        self.probe_deadline = value;
        self
    }

    /// Set the cadence of thinking events while a move is awaited.
    pub fn with_thinking_tick(mut self, value: Duration) -> Self {
        self.thinking_tick = value;
        self
    }

    /// Set how many matches a tournament runs.
    pub fn with_match_count(mut self, value: MatchCount) -> Self {
        self.match_count = value;
        self
    }

    /// Let hosted agent processes inherit stderr (debug purposes only).
    pub fn with_debug_agent_stderr(mut self, value: bool) -> Self {
        self.debug_agent_stderr = value;
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
