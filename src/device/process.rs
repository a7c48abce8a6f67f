//! External process helpers
//!
//! Short-lived tool invocations (`adb`, `idevice_id`) are run to completion
//! with captured output. Long-lived ones (Appium, `iproxy`) are spawned in
//! the background with their output forwarded to tracing.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::common::{Error, Result};

/// Run a tool to completion and return its stdout lines
///
/// A non-zero exit status is an error carrying the tool's stderr.
pub async fn run_tool<I, S>(program: &Path, args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    tracing::info!(
        program = %program.display(),
        args = ?args,
        "Executing command"
    );

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::process_spawn(program, &e))?;

    if !output.status.success() {
        return Err(Error::process_failed(program, output.status, &output.stderr));
    }

    let lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    for line in &lines {
        tracing::debug!(program = %program.display(), "{}", line);
    }
    Ok(lines)
}

/// Spawn a long-lived process in the background
///
/// The child is killed if its handle is dropped without an explicit stop.
pub fn spawn_background<I, S>(program: &Path, args: I, envs: &[(String, String)]) -> Result<Child>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    tracing::info!(
        program = %program.display(),
        args = ?args,
        "Starting background process"
    );

    let mut child = Command::new(program)
        .args(&args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::process_spawn(program, &e))?;

    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, name.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, name));
    }

    Ok(child)
}

/// Drain a child's output stream into the log
async fn forward_output<R: AsyncRead + Unpin>(stream: R, name: String) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(process = %name, "{}", line);
    }
}

/// Stop a background process
///
/// On Unix the process first gets SIGTERM so it can release ports; it is
/// killed if it has not exited shortly after.
pub async fn stop_child(child: &mut Child) -> Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: pid belongs to a child we spawned and have not reaped
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        let graceful =
            tokio::time::timeout(std::time::Duration::from_secs(3), child.wait()).await;
        if matches!(graceful, Ok(Ok(_))) {
            return Ok(());
        }
    }

    child.kill().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_lines() {
        let lines = run_tool(Path::new("sh"), ["-c", "printf 'one\\ntwo\\n'"])
            .await
            .unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_nonzero_exit_is_error() {
        let err = run_tool(Path::new("sh"), ["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            Error::ProcessFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let err = run_tool(Path::new("/nonexistent/tool-7c2e"), ["devices"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProcessSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_background_process() {
        let mut child = spawn_background(Path::new("sleep"), ["30"], &[]).unwrap();
        stop_child(&mut child).await.unwrap();
        assert!(child.try_wait().unwrap().is_some());

        // Stopping an exited child is a no-op
        stop_child(&mut child).await.unwrap();
    }
}
