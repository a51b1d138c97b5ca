//! External encoder process management.

use std::io::{self, Read};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::VideoError;
use crate::VideoResult;

/// Size of a single stderr read.
const READ_CHUNK_SIZE: usize = 4096;

/// Interval between reap attempts once stderr is closed.
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Asynchronous output of a launched process.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessNotification {
    /// Bytes read from the diagnostic channel, in arrival order.
    Diagnostic(Bytes),

    /// The process exited. Always the last notification of a process.
    Exited(Option<i32>),
}

/// A running external process.
pub trait ProcessHandle: Send {
    /// OS process id.
    fn id(&self) -> u32;

    /// Ask the process to exit gracefully. Exit is reported later through
    /// [`ProcessNotification::Exited`].
    fn terminate(&mut self) -> VideoResult<()>;
}

/// Starts external processes.
pub trait ProcessLauncher: Send + Sync {
    /// Start `program` with `args`. Diagnostic output and the exit status
    /// are delivered on `notify`.
    fn launch(
        &self,
        program: &str,
        args: &[String],
        notify: Sender<ProcessNotification>,
    ) -> VideoResult<Box<dyn ProcessHandle>>;
}

/// Launches real OS processes with stderr captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(
        &self,
        program: &str,
        args: &[String],
        notify: Sender<ProcessNotification>,
    ) -> VideoResult<Box<dyn ProcessHandle>> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VideoError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let pid = child.id();
        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::MissingStderr);
        };

        let child = Arc::new(Mutex::new(child));
        let watched = Arc::clone(&child);
        thread::Builder::new()
            .name(format!("encoder-{pid}"))
            .spawn(move || watch_process(watched, stderr, notify))?;

        debug!(pid, "Encoder process launched");
        Ok(Box::new(SystemProcess { pid, child }))
    }
}

/// Forward stderr chunks until EOF, then report the exit status.
///
/// The child is reaped only while its lock is held, so a termination request
/// that holds the lock never signals a recycled pid.
fn watch_process(child: Arc<Mutex<Child>>, mut stderr: ChildStderr, notify: Sender<ProcessNotification>) {
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        match stderr.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                // Keep draining after the receiver is gone so the child never
                // blocks on a full pipe.
                let _ = notify.send(ProcessNotification::Diagnostic(Bytes::copy_from_slice(
                    &buf[..n],
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading encoder stderr: {}", e);
                break;
            }
        }
    }

    let code = match reap(&child) {
        Ok(status) => {
            if !status.success() {
                warn!("Encoder exited with status: {}", status);
            }
            status.code()
        }
        Err(e) => {
            error!("Error waiting for encoder: {}", e);
            Some(-1)
        }
    };

    let _ = notify.send(ProcessNotification::Exited(code));
}

/// Poll until the child has exited, releasing the lock between attempts.
fn reap(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = child.lock().try_wait()? {
            return Ok(status);
        }
        thread::sleep(REAP_INTERVAL);
    }
}

/// Handle to a process started by [`SystemLauncher`].
#[derive(Debug)]
struct SystemProcess {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle for SystemProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> VideoResult<()> {
        let mut child = self.child.lock();
        let exited = child.try_wait().map_err(|source| VideoError::Terminate {
            pid: self.pid,
            source,
        })?;
        if exited.is_some() {
            debug!(pid = self.pid, "Encoder already exited, not signalling");
            return Ok(());
        }

        request_termination(self.pid).map_err(|source| VideoError::Terminate {
            pid: self.pid,
            source,
        })
    }
}

#[cfg(unix)]
fn request_termination(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn request_termination(pid: u32) -> io::Result<()> {
    // Without /F taskkill asks the process to close instead of killing it.
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
