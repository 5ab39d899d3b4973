//! Helper subprocess execution.
//!
//! Credential processes, web-identity token processes and MFA processes
//! are configured as single command-line strings; they run through the
//! platform shell so users can write pipelines and quoting the way they
//! would interactively.

use tokio::process::Command;

use crate::error::{Error, Result};

/// Build a command that runs `command_line` through the platform shell.
pub fn shell_command(command_line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

/// Run `command_line` and return its trimmed stdout.
///
/// A non-zero exit is an error carrying the command's stderr, since that
/// is where helpers explain themselves.
pub async fn shell_output(command_line: &str) -> Result<String> {
    let output = shell_command(command_line)
        .output()
        .await
        .map_err(|e| Error::derivation(format!("running `{}`: {}", command_line, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::derivation(format!(
            "`{}` exited with {}: {}",
            command_line,
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|e| Error::derivation(format!("`{}` produced invalid UTF-8: {}", command_line, e)))?;
    Ok(stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_output_trims() {
        let out = shell_output("echo hello").await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_shell_output_failure_carries_stderr() {
        let err = shell_output("echo oops >&2; exit 3").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("oops"));
        assert!(msg.contains("exit"));
    }
}
