//! Hosting an external agent as a child process.
//!
//! A hosted agent is spawned with a loopback port as its last argument and
//! must connect to it promptly. From then on the protocol is one line of JSON
//! each way per move: the engine sends the game state (or `null` for an
//! admission probe), the agent answers with its move. The child is killed
//! when the model is dropped.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{info, instrument, trace, warn};

use crate::agent::Model;
use crate::game::{GameState, Move};

/// How long a freshly spawned agent gets to connect back.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Model`] backed by a child process speaking line-delimited JSON.
#[derive(Debug)]
pub(crate) struct ProcessModel {
    child: Mutex<Child>,
    conn: Mutex<BufReader<TcpStream>>,
    // A source file written for this agent alone; removed on drop.
    temp_source: Option<PathBuf>,
}

impl ProcessModel {
    /// Spawn `command args... <port>` and wait for it to connect.
    #[instrument(skip(args))]
    pub(crate) fn launch(
        command: &str,
        args: &[String],
        debug_stderr: bool,
    ) -> anyhow::Result<ProcessModel> {
        let listener =
            TcpListener::bind("127.0.0.1:0").context("could not bind the agent listener")?;
        let port = listener.local_addr()?.port();

        let mut child = Command::new(command)
            .args(args)
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if debug_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .spawn()
            .with_context(|| format!("could not spawn agent process '{command}'"))?;

        listener
            .set_nonblocking(true)
            .context("setting listener non-blocking")?;

        let deadline = Instant::now() + STARTUP_TIMEOUT;
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream
                        .set_nonblocking(false)
                        .context("setting agent stream blocking")?;
                    info!(port, "agent process connected");
                    return Ok(ProcessModel {
                        child: Mutex::new(child),
                        conn: Mutex::new(BufReader::new(stream)),
                        temp_source: None,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e).context("accepting the agent connection");
                }
            }
            if let Some(status) = child.try_wait().context("polling the agent process")? {
                bail!("agent process exited ({status}) before connecting");
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                bail!("agent process did not connect within {STARTUP_TIMEOUT:?}");
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Remove `path` when this model is dropped.
    pub(crate) fn with_temp_source(mut self, path: PathBuf) -> ProcessModel {
        self.temp_source = Some(path);
        self
    }
}

impl Model for ProcessModel {
    fn propose(&self, state: Option<&GameState>) -> anyhow::Result<Move> {
        let mut conn = self.conn.lock().expect("poisoned");

        let mut line = serde_json::to_string(&state).context("encoding state for the agent")?;
        line.push('\n');
        conn.get_mut()
            .write_all(line.as_bytes())
            .context("sending state to the agent process")?;
        trace!(sent = line.trim(), "state sent");

        let mut reply = String::new();
        let n = conn
            .read_line(&mut reply)
            .context("reading the agent's reply")?;
        if n == 0 {
            bail!("agent process closed the connection");
        }
        let reply = reply.trim();
        trace!(reply, "move received");
        serde_json::from_str(reply)
            .with_context(|| format!("agent replied with an unparsable move: {reply:?}"))
    }
}

impl Drop for ProcessModel {
    fn drop(&mut self) {
        let mut child = self.child.lock().expect("poisoned");
        if let Err(e) = child.kill() {
            warn!(error = %e, "could not kill agent process");
        }
        let _ = child.wait();
        if let Some(path) = &self.temp_source {
            let _ = std::fs::remove_file(path);
        }
    }
}
