//! Bridging a human operator to the [`Model`] contract.
//!
//! [`bridge`] returns two halves of a prompt/reply channel pair. The engine
//! holds the [`HumanModel`] and calls `propose` like any other model; the UI
//! holds the [`OperatorConsole`], shows each prompt to the operator and sends
//! the answer back. Every prompt carries a sequence number and only a reply
//! to the prompt currently awaited is accepted, so an answer that arrives
//! after its move already timed out can never be mistaken for the answer to a
//! later prompt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use tracing::trace;

use crate::agent::Model;
use crate::game::{GameState, Move};

/// One request for a human move.
#[derive(Clone, Debug)]
pub struct MovePrompt {
    /// Sequence number to echo back in [`OperatorConsole::reply`].
    pub seq: u64,
    /// The state to move on; `None` is an admission probe.
    pub state: Option<GameState>,
}

/// The engine-side half: a [`Model`] whose `propose` blocks until the
/// operator answers.
pub struct HumanModel {
    prompts: Sender<MovePrompt>,
    replies: Mutex<Receiver<(u64, Move)>>,
    seq: AtomicU64,
}

/// The operator-side half: receives prompts, sends answers.
pub struct OperatorConsole {
    prompts: Receiver<MovePrompt>,
    replies: Sender<(u64, Move)>,
}

/// A connected [`HumanModel`] / [`OperatorConsole`] pair.
pub fn bridge() -> (HumanModel, OperatorConsole) {
    let (prompt_tx, prompt_rx) = mpsc::channel();
    let (reply_tx, reply_rx) = mpsc::channel();
    (
        HumanModel {
            prompts: prompt_tx,
            replies: Mutex::new(reply_rx),
            seq: AtomicU64::new(0),
        },
        OperatorConsole {
            prompts: prompt_rx,
            replies: reply_tx,
        },
    )
}

impl Model for HumanModel {
    fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts
            .send(MovePrompt {
                seq,
                state: state.cloned(),
            })
            .map_err(|_| anyhow!("operator console is gone"))?;

        let replies = self.replies.lock().expect("poisoned");
        loop {
            let (reply_seq, mv) = replies
                .recv()
                .map_err(|_| anyhow!("operator console is gone"))?;
            match reply_seq.cmp(&seq) {
                std::cmp::Ordering::Equal => return Ok(mv),
                std::cmp::Ordering::Less => {
                    trace!(reply_seq, awaiting = seq, "discarding stale operator reply");
                }
                // The operator moved on to a newer prompt; this wait is dead.
                std::cmp::Ordering::Greater => bail!("prompt {seq} was superseded"),
            }
        }
    }
}

impl OperatorConsole {
    /// Block until the engine asks for a move; `None` once the engine side is
    /// gone.
    pub fn prompt(&self) -> Option<MovePrompt> {
        self.prompts.recv().ok()
    }

    /// A prompt if one is already waiting, without blocking.
    pub fn try_prompt(&self) -> Option<MovePrompt> {
        self.prompts.try_recv().ok()
    }

    /// Answer the prompt numbered `seq` with `mv`. Sending after the engine
    /// side is gone is a no-op.
    pub fn reply(&self, seq: u64, mv: Move) {
        let _ = self.replies.send((seq, mv));
    }
}
