//! Normalizing every way an agent can be supplied into an [`Agent`].
//!
//! Five construction sources converge here: a built-in heuristic, inline
//! source text, source text fetched through a caller-supplied capability,
//! an uploaded executable artifact, and a human operator. Whatever the
//! provenance, [`assemble`] hands back an [`Agent`] and nothing downstream
//! ever asks where it came from.
//!
//! Source text is never evaluated in-process. It is written to a file and run
//! through a caller-supplied interpreter as a child process behind the
//! process-host boundary, so a crashing or looping agent can cost at most
//! its own moves.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use crate::agent::{Agent, ChoiceModel, GridModel, Tactic};
use crate::configuration::ArenaConfig;
use crate::game::Side;
use crate::human::HumanModel;

pub(crate) mod process_host;

use process_host::ProcessModel;

/// Obtains agent source text from a caller-defined location.
pub trait SourceFetcher: Send + Sync {
    /// The source text behind `locator`.
    fn fetch(&self, locator: &str) -> anyhow::Result<String>;
}

/// Reads locators as local file paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl SourceFetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> anyhow::Result<String> {
        std::fs::read_to_string(locator)
            .with_context(|| format!("could not read agent source '{locator}'"))
    }
}

/// Where one agent's decision procedure comes from.
pub enum AgentSource {
    /// A built-in tactic.
    Heuristic(Tactic),
    /// Source text supplied directly, run through `interpreter`.
    Inline {
        /// The program text.
        source: String,
        /// Interpreter command and leading arguments; the source path and
        /// the connection port are appended.
        interpreter: Vec<String>,
    },
    /// Source text obtained through a [`SourceFetcher`], run through
    /// `interpreter`.
    Fetched {
        /// Passed verbatim to the fetcher.
        locator: String,
        /// How to obtain the text.
        fetcher: Arc<dyn SourceFetcher>,
        /// Interpreter command and leading arguments.
        interpreter: Vec<String>,
    },
    /// An executable artifact, launched directly.
    Uploaded {
        /// Path to the executable.
        artifact: PathBuf,
        /// Arguments before the appended connection port.
        args: Vec<String>,
    },
    /// A human operator behind the engine half of [`crate::human::bridge`].
    Human(HumanModel),
}

impl std::fmt::Debug for AgentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentSource::Heuristic(tactic) => f.debug_tuple("Heuristic").field(tactic).finish(),
            AgentSource::Inline { .. } => f.write_str("Inline"),
            AgentSource::Fetched { locator, .. } => {
                f.debug_struct("Fetched").field("locator", locator).finish()
            }
            AgentSource::Uploaded { artifact, .. } => f
                .debug_struct("Uploaded")
                .field("artifact", artifact)
                .finish(),
            AgentSource::Human(_) => f.write_str("Human"),
        }
    }
}

static SOURCE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Build the agent playing `side` as `display_name` from `source`.
///
/// Code-text and artifact sources spawn their child process here, so a
/// broken interpreter command or a binary that never connects fails the
/// assembly rather than a match.
pub fn assemble(
    display_name: impl Into<String>,
    side: Side,
    source: AgentSource,
    config: &ArenaConfig,
) -> anyhow::Result<Agent> {
    let display_name = display_name.into();
    info!(agent = %display_name, %side, source = ?source, "assembling agent");
    let model: Arc<dyn crate::agent::Model> = match source {
        AgentSource::Heuristic(Tactic::Grid(tactic)) => Arc::new(GridModel::new(tactic)),
        AgentSource::Heuristic(Tactic::Choice(tactic)) => Arc::new(ChoiceModel::new(tactic, side)),
        AgentSource::Inline {
            source,
            interpreter,
        } => Arc::new(host_source_text(&display_name, &source, &interpreter, config)?),
        AgentSource::Fetched {
            locator,
            fetcher,
            interpreter,
        } => {
            let source = fetcher
                .fetch(&locator)
                .with_context(|| format!("fetching agent source for '{display_name}'"))?;
            Arc::new(host_source_text(&display_name, &source, &interpreter, config)?)
        }
        AgentSource::Uploaded { artifact, args } => {
            let command = artifact
                .to_str()
                .with_context(|| format!("artifact path {artifact:?} is not valid UTF-8"))?;
            Arc::new(ProcessModel::launch(command, &args, config.debug_agent_stderr)?)
        }
        AgentSource::Human(model) => Arc::new(model),
    };
    Ok(Agent::new(display_name, side, model))
}

/// Write `source` to a uniquely named file and launch it through
/// `interpreter`.
fn host_source_text(
    display_name: &str,
    source: &str,
    interpreter: &[String],
    config: &ArenaConfig,
) -> anyhow::Result<ProcessModel> {
    let Some((command, leading)) = interpreter.split_first() else {
        bail!("no interpreter command given for agent '{display_name}'");
    };

    let n = SOURCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("arena_agent_{}_{n}.src", std::process::id()));
    std::fs::write(&path, source)
        .with_context(|| format!("writing agent source to {}", path.display()))?;

    let mut args = leading.to_vec();
    args.push(
        path.to_str()
            .context("temp source path is not valid UTF-8")?
            .to_owned(),
    );
    let model = ProcessModel::launch(command, &args, config.debug_agent_stderr)
        .with_context(|| format!("hosting source for agent '{display_name}'"));
    match model {
        Ok(model) => Ok(model.with_temp_source(path)),
        Err(e) => {
            let _ = std::fs::remove_file(&path);
            Err(e)
        }
    }
}
