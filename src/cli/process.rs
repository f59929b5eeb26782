use std::{env, path::Path, process::Stdio};

use anyhow::{anyhow, bail, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// Terminates every other process started from the `name` executable. Returns how many were
/// stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't find current process {e}"))?;
    let mut killed = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // Forceful on Windows. On unix the daemon stores its open session on SIGTERM.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            killed += 1;
        }
    }
    Ok(killed)
}

pub fn stop_server() -> Result<usize> {
    kill_previous_servers(&to_daemon_path(env::current_exe()?))
}

/// Shuts down previous daemons and starts a new one with `daemon_args`. The daemon binary
/// detaches by itself, so this only waits for the launcher to exit.
pub fn restart_server(daemon_args: impl IntoIterator<Item = String>) -> Result<()> {
    let daemon = to_daemon_path(env::current_exe()?);
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(&daemon);
    command.args(daemon_args);
    command.stdin(Stdio::null());

    info!("Spawning {daemon:?}");
    let status = command
        .status()
        .map_err(|e| anyhow!("Failed to launch {daemon:?}: {e}"))?;
    if !status.success() {
        bail!("Daemon launcher exited with {status}");
    }
    Ok(())
}
