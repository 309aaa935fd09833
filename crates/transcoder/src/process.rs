//! External process supervision
//!
//! Every external program (prober, encoder) goes through the [`ProcessRunner`]
//! capability so the pipeline can be driven by a fake in tests. The real
//! implementation, [`SystemRunner`], uses `tokio::process` and binds the
//! attached encoder run to the process-wide [`Interrupts`] state.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Error type for supervised (attached) runs
#[derive(Debug, Error)]
pub enum SuperviseError {
    /// Process exited with non-zero status
    #[error("{program} failed with exit code: {code}")]
    Failed { program: String, code: i32 },

    /// Process was terminated by a signal it did not get from us
    #[error("{program} was terminated by signal")]
    Terminated { program: String },

    /// An interrupt or termination signal arrived before or during the run
    #[error("Interrupted")]
    Interrupted,

    /// Spawn or wait failure
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A fully formed external command: program plus argument vector.
///
/// Plain data, so two builds can be compared for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Arguments as UTF-8 strings (lossy), handy for assertions and logs
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn program_lossy(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Shell-quoted command line for echoing before a run
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                let s = part.to_string_lossy();
                match shlex::try_quote(&s) {
                    Ok(quoted) => quoted.into_owned(),
                    Err(_) => s.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Output of a captured (non-attached) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Narrow capability for running external commands
pub trait ProcessRunner {
    /// Run to completion with stdout/stderr captured.
    ///
    /// `Err` only when the process could not be started or waited on; a
    /// non-zero exit is reported through [`CapturedOutput::success`].
    fn capture(&self, spec: &CommandSpec) -> impl Future<Output = io::Result<CapturedOutput>>;

    /// Run with stdin/stdout/stderr attached to the controlling terminal,
    /// blocking until the child exits or the run is interrupted.
    fn run_attached(&self, spec: &CommandSpec) -> impl Future<Output = Result<(), SuperviseError>>;

    /// Whether SIGINT/SIGTERM has been received at any point so far
    fn is_interrupted(&self) -> bool;
}

/// Process-wide interrupt state.
///
/// A single listener task flips the flag on SIGINT or SIGTERM. Attached runs
/// subscribe to it for exactly their own duration.
#[derive(Debug, Clone)]
pub struct Interrupts {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupts {
    /// Interrupt state with no signal listener attached
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Create the state and spawn the signal listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Self {
        let interrupts = Self::new();
        let tx = interrupts.tx.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            debug!("interrupt received");
            tx.send_replace(true);
        });
        interrupts
    }

    /// Mark the process as interrupted
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Scoped subscription; dropping the receiver ends it
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

/// Resolves once the subscribed flag is set
async fn interrupted(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        // sender gone: no interrupt can ever arrive
        std::future::pending::<()>().await;
    }
}

/// [`ProcessRunner`] backed by real child processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    interrupts: Interrupts,
}

impl SystemRunner {
    pub fn new(interrupts: Interrupts) -> Self {
        Self { interrupts }
    }
}

impl ProcessRunner for SystemRunner {
    fn is_interrupted(&self) -> bool {
        self.interrupts.is_interrupted()
    }

    async fn capture(&self, spec: &CommandSpec) -> io::Result<CapturedOutput> {
        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let output = cmd.output().await?;

        Ok(CapturedOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_attached(&self, spec: &CommandSpec) -> Result<(), SuperviseError> {
        let mut interrupt_rx = self.interrupts.subscribe();
        if *interrupt_rx.borrow_and_update() {
            return Err(SuperviseError::Interrupted);
        }

        echo_command(spec);

        let program = spec.program_lossy();
        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SuperviseError::Io {
            program: program.clone(),
            source,
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| SuperviseError::Io {
                    program: program.clone(),
                    source,
                })?;

                // a signal racing the exit still counts as an interruption
                if *interrupt_rx.borrow() {
                    return Err(SuperviseError::Interrupted);
                }

                if status.success() {
                    Ok(())
                } else {
                    match status.code() {
                        Some(code) => Err(SuperviseError::Failed { program, code }),
                        None => Err(SuperviseError::Terminated { program }),
                    }
                }
            }
            _ = interrupted(&mut interrupt_rx) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", program, e);
                }
                Err(SuperviseError::Interrupted)
            }
        }
    }
}

fn echo_command(spec: &CommandSpec) {
    println!("----------------");
    println!("{}", spec.command_line());
    println!();
}
