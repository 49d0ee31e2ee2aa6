use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::SweepError;
use crate::modelfile;

/// Bound on `ollama create`: rendering plus a model rebuild.
pub const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(120);
/// Bound on `ollama run`: deliberately generous relative to the configure
/// bound, since the engine may reload the whole model into memory before the
/// first token of output.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(360);

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    Applied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Combined stdout and stderr of the workload command.
    Completed(String),
    TimedOut,
}

/// Seam between the sweep loop and the external engine. Both operations
/// report failure as data; only the orchestrator decides what gets recorded.
pub trait TrialExecutor {
    /// Render the modelfile for this grid point and rebuild the model.
    fn configure(&mut self, num_ctx: u32, num_batch: u32) -> ConfigureOutcome;
    /// Run the fixed workload against the currently configured model.
    fn run(&mut self) -> RunOutcome;
}

/// Production executor: drives the `ollama` CLI as a black box.
pub struct OllamaExecutor {
    model: String,
    template: String,
    modelfile_path: PathBuf,
    prompt: Vec<u8>,
    num_predict: u32,
    configure_timeout: Duration,
    run_timeout: Duration,
}

impl OllamaExecutor {
    pub fn new(
        model: impl Into<String>,
        template_path: impl Into<PathBuf>,
        modelfile_path: impl Into<PathBuf>,
        prompt_path: impl Into<PathBuf>,
        num_predict: u32,
    ) -> Result<Self, SweepError> {
        let template_path = template_path.into();
        let template =
            fs::read_to_string(&template_path).map_err(|e| SweepError::io(&template_path, e))?;
        let prompt_path = prompt_path.into();
        let prompt = fs::read(&prompt_path).map_err(|e| SweepError::io(&prompt_path, e))?;
        Ok(OllamaExecutor {
            model: model.into(),
            template,
            modelfile_path: modelfile_path.into(),
            prompt,
            num_predict,
            configure_timeout: CONFIGURE_TIMEOUT,
            run_timeout: RUN_TIMEOUT,
        })
    }
}

impl TrialExecutor for OllamaExecutor {
    fn configure(&mut self, num_ctx: u32, num_batch: u32) -> ConfigureOutcome {
        let rendered = modelfile::render(&self.template, num_ctx, num_batch, self.num_predict);
        if let Err(e) = fs::write(&self.modelfile_path, rendered) {
            warn!(path = %self.modelfile_path.display(), error = %e, "failed to write modelfile");
            return ConfigureOutcome::Failed;
        }

        let mut cmd = Command::new("ollama");
        cmd.arg("create")
            .arg(&self.model)
            .arg("-f")
            .arg(&self.modelfile_path);
        match run_with_timeout(cmd, None, self.configure_timeout) {
            Ok(Some(capture)) if capture.status.success() => ConfigureOutcome::Applied,
            Ok(Some(capture)) => {
                warn!(status = ?capture.status.code(), "ollama create exited nonzero");
                ConfigureOutcome::Failed
            }
            Ok(None) => {
                warn!(timeout_secs = self.configure_timeout.as_secs(), "ollama create timed out");
                ConfigureOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "failed to invoke ollama create");
                ConfigureOutcome::Failed
            }
        }
    }

    fn run(&mut self) -> RunOutcome {
        let mut cmd = Command::new("ollama");
        cmd.arg("run").arg(&self.model).arg("--verbose");
        match run_with_timeout(cmd, Some(self.prompt.clone()), self.run_timeout) {
            Ok(Some(capture)) => RunOutcome::Completed(capture.combined()),
            Ok(None) => RunOutcome::TimedOut,
            Err(e) => {
                // Spawn failures flow through the classifier as "no output".
                warn!(error = %e, "failed to invoke ollama run");
                RunOutcome::Completed(String::new())
            }
        }
    }
}

pub(crate) struct Capture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl Capture {
    /// Stdout followed by stderr, as one lossy text blob.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

fn spawn_reader<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run a command with piped streams under a wall-clock bound. Returns
/// `Ok(None)` when the deadline passes (the child is killed), and the capture
/// otherwise. Output is drained on dedicated threads so a chatty child can
/// never deadlock against a full pipe while we poll for exit.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    stdin_payload: Option<Vec<u8>>,
    timeout: Duration,
) -> std::io::Result<Option<Capture>> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn()?;
    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            // Dropping the handle at thread exit closes the pipe.
            thread::spawn(move || {
                let _ = stdin.write_all(&payload);
            });
        }
    }
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Ok(None);
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(Some(Capture {
        stdout,
        stderr,
        status,
    }))
}
