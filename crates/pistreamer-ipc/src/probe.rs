//! Bounded-time execution of device query tools.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

/// Time allowed for a single device query tool invocation.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const POLL_STEP: Duration = Duration::from_millis(10);

/// Run `program` and collect its output, giving up after `timeout`.
///
/// Both pipes are drained while waiting so a chatty tool cannot stall on a
/// full pipe. Returns `Ok(None)` if the tool did not finish in time; the
/// child is killed in that case.
pub fn capture_output(program: &str, args: &[&str], timeout: Duration) -> io::Result<Option<Output>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if Instant::now() >= deadline {
            warn!(program, "Device query timed out");
            let _ = child.kill();
            let _ = child.wait();
            // Readers are left detached; a grandchild may still hold the pipes.
            return Ok(None);
        }

        thread::sleep(POLL_STEP);
    };

    Ok(Some(Output {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    }))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("pipe reader panicked"))?,
        None => Ok(Vec::new()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_stderr() {
        let output = capture_output("sh", &["-c", "echo out; echo err >&2"], Duration::from_secs(5))
            .unwrap()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }

    #[test]
    fn test_output_larger_than_pipe_buffer_completes() {
        let started = Instant::now();
        let output = capture_output(
            "sh",
            &["-c", "head -c 200000 /dev/zero | tr '\\0' a"],
            Duration::from_secs(5),
        )
        .unwrap()
        .expect("tool should finish before the deadline");

        assert_eq!(output.stdout.len(), 200_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_slow_tool_times_out() {
        let started = Instant::now();
        let output = capture_output("sh", &["-c", "exec sleep 30"], Duration::from_millis(100)).unwrap();

        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
