//! Upstream subprocess lifecycle: resolution against `PATH`, spawn, and the
//! graceful-shutdown timer sequence (§5 "Cancellation & shutdown").

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use lapc_core::error::{ProxyError, Result};
use tokio::process::{Child, Command};

/// Grace period after closing stdin before escalating to a forceful kill.
const STDIN_CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Grace period after a forceful-kill request before giving up waiting.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Resolve `program` against `PATH`, trying a `.cmd`/`.exe` suffix on
/// Windows the way `npx`-style launchers do. Paths containing a separator
/// are used as-is (already resolved by the caller or relative to cwd).
pub fn resolve_upstream_binary(program: &str) -> PathBuf {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let plain = dir.join(program);
            if plain.is_file() {
                return plain;
            }
            if cfg!(windows) {
                for ext in ["cmd", "exe"] {
                    let candidate = dir.join(format!("{program}.{ext}"));
                    if candidate.is_file() {
                        return candidate;
                    }
                }
            }
        }
    }
    candidate.to_path_buf()
}

/// Spawn the upstream command with piped stdin/stdout/stderr. The child is
/// killed if the returned handle is dropped without an explicit shutdown.
pub fn spawn_upstream<I, S>(program: &str, args: I) -> Result<Child>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let resolved = resolve_upstream_binary(program);
    Command::new(&resolved)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProxyError::Transport(format!("failed to spawn upstream {program:?}: {e}")))
}

/// Run the close-stdin / wait / kill / wait sequence from §5. `child.stdin`
/// must already have been taken and dropped by the caller (closing the
/// write half signals EOF to the upstream) before this is called; this
/// function only waits and escalates.
pub async fn shutdown_gracefully(child: &mut Child) -> Option<ExitStatus> {
    if let Ok(status) = tokio::time::timeout(STDIN_CLOSE_GRACE, child.wait()).await {
        return status.ok();
    }
    tracing::info!("upstream did not exit after stdin close, sending kill");
    if child.start_kill().is_err() {
        // Already gone; one more wait picks up the exit status.
        return child.wait().await.ok();
    }
    if let Ok(status) = tokio::time::timeout(KILL_GRACE, child.wait()).await {
        return status.ok();
    }
    tracing::warn!("upstream still alive after kill, waiting unconditionally");
    child.wait().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_used_as_is() {
        let resolved = resolve_upstream_binary("/usr/bin/cat");
        assert_eq!(resolved, Path::new("/usr/bin/cat"));
    }

    #[test]
    fn bare_name_resolves_against_path_when_present() {
        let resolved = resolve_upstream_binary("sh");
        assert!(resolved.is_file() || resolved == Path::new("sh"));
    }

    #[tokio::test]
    async fn spawn_and_graceful_shutdown_of_a_trivial_process() {
        let mut child = spawn_upstream("sh", ["-c", "sleep 30"]).unwrap();
        drop(child.stdin.take());
        let status = shutdown_gracefully(&mut child).await;
        assert!(status.is_some());
    }
}
