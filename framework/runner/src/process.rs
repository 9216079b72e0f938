//! Runs each iteration as its own worker process.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use stampede_summary_model::RunOutput;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::pool::{CompletedRun, RunEvent, RunLauncher, RunSpec};
use crate::protocol::StreamProtocolParser;

/// 1-based index of the run
pub const ENV_RUN_INDEX: &str = "STAMPEDE_RUN_INDEX";
/// Draw in `[0, 1)` from the shared seeded generator
pub const ENV_RANDOM: &str = "STAMPEDE_RANDOM";
/// Total number of runs in this invocation
pub const ENV_TOTAL_RUNS: &str = "STAMPEDE_TOTAL_RUNS";
/// Flow number chosen for the run
pub const ENV_FLOW: &str = "STAMPEDE_FLOW";

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// The worker program and the arguments it is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program followed by its arguments, for display and fingerprinting.
    pub fn to_vec(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Starts a worker process for every run.
///
/// The process gets its parameters through the `STAMPEDE_*` environment variables and is always
/// left to run to completion.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: WorkerCommand,
}

impl ProcessRunner {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    fn build_command(&self, spec: &RunSpec) -> Command {
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .env(ENV_RUN_INDEX, spec.run_index.to_string())
            .env(ENV_RANDOM, spec.random.to_string())
            .env(ENV_TOTAL_RUNS, spec.total_runs.to_string())
            .env(ENV_FLOW, spec.flow.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl RunLauncher for ProcessRunner {
    fn launch(&mut self, spec: RunSpec, events: UnboundedSender<RunEvent>) {
        let command = self.build_command(&spec);
        tokio::spawn(drive_run(command, spec.run_index, events));
    }
}

async fn drive_run(mut command: Command, run_index: usize, events: UnboundedSender<RunEvent>) {
    let started = Instant::now();

    let streamed = match command.spawn() {
        Ok(child) => {
            log::trace!("Run {run_index} spawned as pid {:?}", child.id());
            stream_child(child, run_index, &events).await
        }
        Err(e) => Err(anyhow::Error::new(e).context("Failed to start worker process")),
    };
    let duration = started.elapsed();

    let completed = match streamed {
        Ok(streamed) => {
            send(&events, RunEvent::Exited {
                run_index,
                exit_code: streamed.exit_code,
            });
            let output = match streamed.read_error {
                None => streamed.parser.finish(),
                Some(e) => {
                    log::error!("Run {run_index} output was cut short: {e:?}");
                    streamed.parser.abort(format!("{e:#}"))
                }
            };
            CompletedRun {
                run_index,
                duration,
                exit_code: streamed.exit_code,
                output,
                stderr: streamed.stderr,
            }
        }
        Err(e) => {
            log::error!("Run {run_index} could not be completed: {e:?}");
            send(&events, RunEvent::Exited {
                run_index,
                exit_code: None,
            });
            CompletedRun {
                run_index,
                duration,
                exit_code: None,
                output: RunOutput::Invalid {
                    raw: String::new(),
                    error: format!("{e:#}"),
                },
                stderr: String::new(),
            }
        }
    };

    send(&events, RunEvent::Completed(completed));
}

/// What was collected from a worker that was started and waited for.
struct StreamedRun {
    exit_code: Option<i32>,
    parser: StreamProtocolParser,
    /// Set if stdout could not be read to the end, the parser holds what arrived before that
    read_error: Option<anyhow::Error>,
    stderr: String,
}

/// Read stdout through the protocol parser and collect stderr until the process exits.
async fn stream_child(
    mut child: Child,
    run_index: usize,
    events: &UnboundedSender<RunEvent>,
) -> anyhow::Result<StreamedRun> {
    let stdout = child
        .stdout
        .take()
        .context("Worker stdout was not captured")?;
    let mut stderr = child
        .stderr
        .take()
        .context("Worker stderr was not captured")?;

    let read_stdout = async move {
        let mut parser = StreamProtocolParser::new();
        let read_error = read_protocol(stdout, &mut parser, run_index, events)
            .await
            .err();
        (parser, read_error)
    };

    let read_stderr = async move {
        let mut buf = Vec::new();
        let read = stderr.read_to_end(&mut buf).await;
        let mut text = String::from_utf8_lossy(&buf).into_owned();
        if let Err(e) = read {
            log::warn!("Failed to read stderr of run {run_index}: {e:?}");
            text.push_str(&format!("\n[stderr cut short: {e}]"));
        }
        text
    };

    let ((parser, read_error), stderr) = tokio::join!(read_stdout, read_stderr);

    // Always reap the process, even if reading its output failed.
    let status = child
        .wait()
        .await
        .context("Failed to wait for worker process")?;

    Ok(StreamedRun {
        exit_code: status.code(),
        parser,
        read_error,
        stderr,
    })
}

async fn read_protocol<R: AsyncRead + Unpin>(
    mut stdout: R,
    parser: &mut StreamProtocolParser,
    run_index: usize,
    events: &UnboundedSender<RunEvent>,
) -> anyhow::Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = stdout
            .read(&mut chunk)
            .await
            .context("Failed to read worker stdout")?;
        if read == 0 {
            return Ok(());
        }

        for event in parser.feed(&chunk[..read]) {
            log::trace!("Run {run_index} reported {event:?}");
            send(events, RunEvent::Step { run_index, event });
        }
    }
}

fn send(events: &UnboundedSender<RunEvent>, event: RunEvent) {
    if events.send(event).is_err() {
        log::warn!("Run event dropped, the pool is no longer listening");
    }
}
