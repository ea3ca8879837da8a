use std::path::Path;

use anyhow::Result;

/// Remote actions the orchestration core needs from a node backend.
///
/// The capture state machine talks to nodes only through this trait, so the
/// SSH and kubectl backends are interchangeable. Every call blocks the calling
/// thread until the remote process or copy completes.
pub trait Collector: Send + Sync {
    /// Short backend name used in error messages
    fn name(&self) -> String;

    /// Hint shown to the user when the backend cannot reach a node
    fn help_text(&self) -> String;

    /// Copy a local file to `dest` on `host`
    fn copy_to_host(&self, host: &str, source: &Path, dest: &str) -> Result<String>;

    /// Copy `source` on `host` to a local file
    fn copy_from_host(&self, host: &str, source: &str, dest: &Path) -> Result<String>;

    /// Run a command and return its combined output
    fn execute(&self, host: &str, args: &[String]) -> Result<String>;

    /// Run a command, handing every output line to `output` as it arrives.
    ///
    /// Lines of stdout and stderr each keep their own order; the interleaving
    /// between the two streams is not guaranteed.
    fn execute_and_stream(&self, host: &str, output: &mut dyn FnMut(&str), args: &[String]) -> Result<()>;

    /// Resolve a selector into concrete host identifiers
    fn discover_hosts(&self, selector: &str) -> Result<Vec<String>>;

    /// Remember a remote process so it can be killed on interruption
    fn set_host_pid(&self, _host: &str, _pid: &str) {}

    /// Best-effort termination of remote processes recorded with `set_host_pid`
    fn cleanup_remote(&self) -> Result<()> {
        Ok(())
    }
}

/// Quote arguments for a POSIX shell.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:+@,".contains(c))
            {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build an owned argument vector from string slices.
pub fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_plain_args() {
        assert_eq!(shell_join(&to_args(&["chmod", "+x", "/tmp/ddc/ddc"])), "chmod +x /tmp/ddc/ddc");
    }

    #[test]
    fn test_shell_join_quotes_spaces_and_quotes() {
        let joined = shell_join(&to_args(&["echo", "it's here", ""]));
        assert_eq!(joined, r"echo 'it'\''s here' ''");
    }
}
