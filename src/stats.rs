//! Per-agent accounting and the statistics persistence capability.
//!
//! [`StatTracker`] is pure bookkeeping: the match controller and the
//! scheduler tell it what happened and it increments counters; it never
//! decides outcomes itself. Records leave the engine through the
//! [`StatStore`] capability handed to the scheduler at construction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::game::Side;

/// Running counters for one agent across a tournament.
///
/// Counters only ever grow; `average_time` is recomputed from `total_time`
/// and `total_moves` on every recorded move, never adjusted on its own.
/// Times are milliseconds. The JSON shape is stable so that previously
/// persisted records (including ones without the coin-flip counter) load
/// cleanly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatRecord {
    /// The agent's display name.
    pub name: String,
    /// Matches won.
    pub wins: u32,
    /// Matches lost.
    pub losses: u32,
    /// Matches drawn.
    pub draws: u32,
    /// Illegal moves that forfeited a match.
    pub invalid_moves: u32,
    /// Deadline misses that forfeited a match.
    pub timeouts: u32,
    /// Crashes that forfeited a match.
    pub crashes: u32,
    /// Accepted moves.
    pub total_moves: u32,
    /// Cumulative thinking time over accepted moves, in milliseconds.
    pub total_time: f64,
    /// `total_time / total_moves`, in milliseconds.
    pub average_time: f64,
    /// Opening coin flips won.
    pub coin_flips_won: u32,
}

impl StatRecord {
    /// A zeroed record for `name`.
    pub fn fresh(name: impl Into<String>) -> StatRecord {
        StatRecord {
            name: name.into(),
            ..StatRecord::default()
        }
    }

    fn record_move(&mut self, latency: Duration) {
        self.total_moves += 1;
        self.total_time += latency.as_secs_f64() * 1000.0;
        self.average_time = self.total_time / f64::from(self.total_moves);
    }
}

impl std::fmt::Display for StatRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "win: {}, draw: {}, lose: {}, faults: {}, avg: {:.1}ms",
            self.wins,
            self.draws,
            self.losses,
            self.invalid_moves + self.timeouts + self.crashes,
            self.average_time
        )
    }
}

/// The two sides' records for one tournament.
#[derive(Debug)]
pub struct StatTracker {
    records: [StatRecord; 2],
}

impl StatTracker {
    /// Track `one` and `two`, typically loaded from a [`StatStore`].
    pub fn new(one: StatRecord, two: StatRecord) -> StatTracker {
        StatTracker { records: [one, two] }
    }

    /// The current record for `side`.
    pub fn record(&self, side: Side) -> &StatRecord {
        &self.records[side.index()]
    }

    fn record_mut(&mut self, side: Side) -> &mut StatRecord {
        &mut self.records[side.index()]
    }

    /// Count a match win for `side`.
    pub fn record_win(&mut self, side: Side) {
        self.record_mut(side).wins += 1;
    }

    /// Count a match loss for `side`.
    pub fn record_loss(&mut self, side: Side) {
        self.record_mut(side).losses += 1;
    }

    /// Count a drawn match for `side`.
    pub fn record_draw(&mut self, side: Side) {
        self.record_mut(side).draws += 1;
    }

    /// Count an illegal move by `side`.
    pub fn record_invalid_move(&mut self, side: Side) {
        self.record_mut(side).invalid_moves += 1;
    }

    /// Count a deadline miss by `side`.
    pub fn record_timeout(&mut self, side: Side) {
        self.record_mut(side).timeouts += 1;
    }

    /// Count a crash by `side`.
    pub fn record_crash(&mut self, side: Side) {
        self.record_mut(side).crashes += 1;
    }

    /// Credit `side` with an opening coin flip.
    pub fn record_coin_flip(&mut self, side: Side) {
        self.record_mut(side).coin_flips_won += 1;
    }

    /// Count an accepted move of `latency` by `side`; the average is
    /// recomputed here and nowhere else.
    pub fn record_move(&mut self, side: Side, latency: Duration) {
        self.record_mut(side).record_move(latency);
    }

    /// Both final records, side 1 first.
    pub fn into_records(self) -> [StatRecord; 2] {
        self.records
    }
}

/// Key/value persistence for stat records.
///
/// The engine only ever calls `load` at tournament start and `save` at
/// tournament end; what sits behind the key is the caller's business.
pub trait StatStore {
    /// The record stored under `key`, if any.
    fn load(&self, key: &str) -> anyhow::Result<Option<StatRecord>>;

    /// Persist `record` under `key`, replacing any previous value.
    fn save(&self, key: &str, record: &StatRecord) -> anyhow::Result<()>;
}

impl<S: StatStore + ?Sized> StatStore for &S {
    fn load(&self, key: &str) -> anyhow::Result<Option<StatRecord>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, record: &StatRecord) -> anyhow::Result<()> {
        (**self).save(key, record)
    }
}

/// In-memory store, mostly for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StatRecord>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl StatStore for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<StatRecord>> {
        Ok(self.records.lock().expect("poisoned").get(key).cloned())
    }

    fn save(&self, key: &str, record: &StatRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .expect("poisoned")
            .insert(key.to_owned(), record.clone());
        Ok(())
    }
}

/// One JSON file per key in a directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store records under `dir`, created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys come from display names; keep the file name tame.
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl StatStore for JsonFileStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<StatRecord>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading stats file {}", path.display()))?;
        let record = serde_json::from_str(&text)
            .with_context(|| format!("parsing stats file {}", path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, key: &str, record: &StatRecord) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating stats directory {}", self.dir.display()))?;
        let path = self.path_for(key);
        let text = serde_json::to_string_pretty(record).context("encoding stats record")?;
        std::fs::write(&path, text)
            .with_context(|| format!("writing stats file {}", path.display()))?;
        Ok(())
    }
}
