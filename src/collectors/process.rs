//! Helpers for running local child processes (kubectl) with captured or
//! streamed output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::unbounded;
use log::debug;

/// Run a command to completion and return stdout followed by stderr.
pub fn run_capture(mut command: Command) -> Result<String> {
    let program = format!("{:?}", command.get_program());
    let output = command
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to start {}", program))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(anyhow!("{} exited with {}: {}", program, output.status, combined.trim()));
    }
    Ok(combined)
}

/// Run a command and deliver each output line to `output` on the calling
/// thread as soon as it is read.
pub fn run_streaming(mut command: Command, output: &mut dyn FnMut(&str)) -> Result<()> {
    let program = format!("{:?}", command.get_program());
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start {}", program))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("{} has no stdout", program))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("{} has no stderr", program))?;

    let (sender, receiver) = unbounded::<String>();
    let readers = [
        spawn_line_reader("stdout", Box::new(stdout), sender.clone()),
        spawn_line_reader("stderr", Box::new(stderr), sender),
    ];

    // Ends once both readers hit EOF and drop their senders.
    for line in receiver.iter() {
        output(&line);
    }

    for reader in readers {
        if let Ok(handle) = reader {
            let _ = handle.join();
        }
    }

    let status = child.wait().with_context(|| format!("Failed to wait for {}", program))?;
    if !status.success() {
        return Err(anyhow!("{} exited with {}", program, status));
    }
    Ok(())
}

fn spawn_line_reader(
    stream: &'static str,
    source: Box<dyn Read + Send>,
    sender: crossbeam::channel::Sender<String>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("ddc-{}", stream))
        .spawn(move || {
            for line in BufReader::new(source).lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("stopped reading {}: {}", stream, e);
                        break;
                    }
                }
            }
        })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_capture_success() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        assert_eq!(run_capture(cmd).unwrap().trim(), "hello");
    }

    #[test]
    fn test_run_capture_failure_includes_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = run_capture(cmd).unwrap_err().to_string();
        assert!(err.contains("broken"));
    }

    #[test]
    fn test_run_streaming_delivers_both_streams() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo one; echo two >&2; echo three"]);

        let mut lines = Vec::new();
        run_streaming(cmd, &mut |line| lines.push(line.to_string())).unwrap();

        assert_eq!(lines.len(), 3);
        let stdout_lines: Vec<_> = lines.iter().filter(|l| *l != "two").collect();
        assert_eq!(stdout_lines, vec!["one", "three"]);
        assert!(lines.contains(&"two".to_string()));
    }

    #[test]
    fn test_run_streaming_nonzero_exit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo partial; exit 1"]);

        let mut lines = Vec::new();
        assert!(run_streaming(cmd, &mut |line| lines.push(line.to_string())).is_err());
        assert_eq!(lines, vec!["partial".to_string()]);
    }
}
