//! Headless server lifecycle
//!
//! [`ServerLifecycle`] owns at most one server process and tracks whether the
//! server answers its readiness probe:
//!
//! ```text
//! NotStarted ──► Starting ──► Ready
//!                   │
//!                   └──────► TimedOut
//! (any) ─────────────────► Error
//! ```
//!
//! Readiness is detected by polling `GET status` at a fixed interval. The
//! whole call, probes included, is bounded by the configured startup timeout
//! and can be cut short with a [`CancellationToken`].
//!
//! Every launch or termination bumps [`ServerLifecycle::generation`], so
//! state mirrored from the server can be dropped when the process changes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::A2fConfig;
use crate::endpoints::Status;
use crate::error::{A2fError, IoErrorExt, Result};
use crate::gateway::{Gateway, RequestResult};

/// Readiness of the headless server as seen by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessState {
    #[default]
    NotStarted,
    Starting,
    Ready,
    TimedOut,
    Error,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Starting => write!(f, "Starting"),
            Self::Ready => write!(f, "Ready"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Handle to a running server process
pub trait ServerProcess: Send + fmt::Debug {
    fn id(&self) -> Option<u32>;

    fn terminate(&mut self) -> io::Result<()>;
}

/// Starts the server executable
pub trait ServerLauncher: Send + Sync {
    fn launch(&self, executable: &Path) -> io::Result<Box<dyn ServerProcess>>;
}

/// Launches the server detached from the caller: its own console on
/// Windows, its own process group elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl ServerLauncher for DetachedLauncher {
    fn launch(&self, executable: &Path) -> io::Result<Box<dyn ServerProcess>> {
        let mut command = Command::new(executable);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if let Some(dir) = executable.parent() {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
            command.creation_flags(CREATE_NEW_CONSOLE);
        }

        let child = command.spawn()?;
        Ok(Box::new(ChildProcess(child)))
    }
}

#[derive(Debug)]
struct ChildProcess(std::process::Child);

impl ServerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.0.id())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.0.kill()?;
        self.0.wait()?;
        Ok(())
    }
}

/// Terminate a server started by an earlier run, given its process id.
///
/// Signals the whole process group on Unix and the process tree on Windows,
/// matching how [`DetachedLauncher`] starts the server.
pub fn terminate_pid(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    let mut command = {
        let mut command = Command::new("kill");
        command.args(["-TERM", "--", &format!("-{pid}")]);
        command
    };

    #[cfg(not(unix))]
    let mut command = {
        let mut command = Command::new("taskkill");
        command.args(["/PID", &pid.to_string(), "/T", "/F"]);
        command
    };

    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "could not terminate process {pid} ({status})"
        )))
    }
}

/// File holding the process id of a server left running by `a2f start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, pid: u32) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.with_path(dir)?;
        }
        tokio::fs::write(&self.path, format!("{pid}\n"))
            .await
            .with_path(&self.path)
    }

    /// Recorded process id, `None` when no file exists
    pub async fn read(&self) -> Result<Option<u32>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_path(&self.path),
        };
        contents
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .with_path(&self.path)
    }

    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e).with_path(&self.path),
            _ => Ok(()),
        }
    }
}

/// Readiness state machine plus the optional owned server process
pub struct ServerLifecycle {
    state: ReadinessState,
    process: Option<Box<dyn ServerProcess>>,
    launcher: Box<dyn ServerLauncher>,
    executable: PathBuf,
    poll_interval: Duration,
    startup_timeout: Duration,
    shutdown_on_drop: bool,
    generation: u64,
}

impl fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("state", &self.state)
            .field("process", &self.process)
            .field("executable", &self.executable)
            .field("poll_interval", &self.poll_interval)
            .field("startup_timeout", &self.startup_timeout)
            .finish_non_exhaustive()
    }
}

impl ServerLifecycle {
    pub fn new(config: &A2fConfig) -> Self {
        Self::with_launcher(config, DetachedLauncher)
    }

    pub fn with_launcher(config: &A2fConfig, launcher: impl ServerLauncher + 'static) -> Self {
        Self {
            state: ReadinessState::NotStarted,
            process: None,
            launcher: Box::new(launcher),
            executable: config.executable_path(),
            poll_interval: config.poll_interval(),
            startup_timeout: config.startup_timeout(),
            shutdown_on_drop: config.shutdown_on_drop,
            generation: 0,
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Whether this session started the server itself
    pub fn owns_process(&self) -> bool {
        self.process.is_some()
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Process id of the owned server, if any
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().and_then(|process| process.id())
    }

    /// Number of times this lifecycle launched or terminated a server
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// One readiness probe; true when `status` answers `"OK"`
    pub async fn probe<G: Gateway>(gateway: &G) -> bool {
        match gateway.send(&Status).await {
            RequestResult::Success(value) => value
                .as_str()
                .is_some_and(|s| s.eq_ignore_ascii_case("ok")),
            _ => false,
        }
    }

    /// Bring the server to `Ready`, starting it if necessary.
    ///
    /// A server that already answers the probe is accepted as-is, even if it
    /// was started outside this client. Otherwise the launcher script is
    /// started (once per session) and the status route is polled until it
    /// reports ready or the startup timeout elapses. The timeout counts from
    /// the first probe and a probe still pending at the deadline counts as
    /// not ready. A timeout is returned as `Ok(ReadinessState::TimedOut)`.
    ///
    /// # Errors
    /// `InstallationNotFound` if the launcher script is missing, `Launch` if
    /// it cannot be spawned, `Cancelled` if `cancel` fires while waiting.
    pub async fn ensure_ready<G: Gateway>(
        &mut self,
        gateway: &G,
        cancel: &CancellationToken,
    ) -> Result<ReadinessState> {
        let started = Instant::now();
        let deadline = started + self.startup_timeout;

        if Self::probe_before(gateway, deadline, cancel).await? {
            if self.state != ReadinessState::Ready {
                info!("audio2face running");
            }
            self.transition(ReadinessState::Ready);
            return Ok(ReadinessState::Ready);
        }

        if self.process.is_none() {
            self.launch()?;
        } else {
            debug!("server process already owned, resuming readiness wait");
        }

        self.transition(ReadinessState::Starting);
        self.wait_until_ready(gateway, started, cancel).await
    }

    /// One probe that gives up at `deadline`
    async fn probe_before<G: Gateway>(
        gateway: &G,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("readiness wait cancelled");
                Err(A2fError::Cancelled)
            }
            probed = timeout_at(deadline, Self::probe(gateway)) => match probed {
                Ok(ready) => Ok(ready),
                Err(_) => {
                    debug!("status probe still pending at deadline");
                    Ok(false)
                }
            },
        }
    }

    fn launch(&mut self) -> Result<()> {
        if !self.executable.is_file() {
            self.transition(ReadinessState::Error);
            return Err(A2fError::InstallationNotFound {
                path: self.executable.clone(),
            });
        }

        info!(executable = %self.executable.display(), "starting audio2face headless");
        match self.launcher.launch(&self.executable) {
            Ok(process) => {
                debug!(pid = ?process.id(), "server process spawned");
                self.process = Some(process);
                self.generation += 1;
                Ok(())
            }
            Err(source) => {
                self.transition(ReadinessState::Error);
                Err(A2fError::Launch {
                    path: self.executable.clone(),
                    source,
                })
            }
        }
    }

    async fn wait_until_ready<G: Gateway>(
        &mut self,
        gateway: &G,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<ReadinessState> {
        let deadline = started + self.startup_timeout;
        loop {
            if Self::probe_before(gateway, deadline, cancel).await? {
                info!(elapsed = ?started.elapsed(), "audio2face ready");
                self.transition(ReadinessState::Ready);
                return Ok(ReadinessState::Ready);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(elapsed = ?started.elapsed(), "audio2face did not become ready");
                self.transition(ReadinessState::TimedOut);
                return Ok(ReadinessState::TimedOut);
            }

            let pause = self.poll_interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("readiness wait cancelled");
                    return Err(A2fError::Cancelled);
                }
                _ = sleep(pause) => {}
            }
        }
    }

    /// Terminate the owned server process, if any.
    ///
    /// A server started outside this client is left running.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.process.take() {
            Some(mut process) => {
                let pid = process.id();
                process.terminate().map_err(|source| A2fError::Io {
                    path: self.executable.clone(),
                    source,
                })?;
                info!(?pid, "audio2face process terminated");
                self.generation += 1;
            }
            None => info!("no owned audio2face process; was it started separately?"),
        }
        self.transition(ReadinessState::NotStarted);
        Ok(())
    }

    fn transition(&mut self, next: ReadinessState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "readiness transition");
            self.state = next;
        }
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        if !self.shutdown_on_drop {
            return;
        }
        if let Some(process) = self.process.as_mut()
            && let Err(e) = process.terminate()
        {
            warn!(error = %e, "failed to terminate audio2face on drop");
        }
    }
}
