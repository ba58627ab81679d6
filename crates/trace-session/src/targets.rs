/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

use nix::unistd::Pid;
use procfs::process::Process;
use std::{path::PathBuf, time::Duration};
use tracing::trace;

/// How often [TargetWatch::all_exited] looks at the process table.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches the traced processes through a procfs mount, which may be a
/// relocated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWatch {
    procfs: PathBuf,
    pids: Vec<Pid>,
}

impl TargetWatch {
    pub fn new(procfs: impl Into<PathBuf>, pids: Vec<Pid>) -> Self {
        Self { procfs: procfs.into(), pids }
    }

    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }

    /// Zombies count as exited.
    pub fn is_alive(&self, pid: Pid) -> bool {
        Process::new_with_root(self.procfs.join(pid.to_string()))
            .and_then(|process| process.stat())
            .map(|stat| !matches!(stat.state, 'Z' | 'X'))
            .unwrap_or(false)
    }

    pub fn any_alive(&self) -> bool {
        self.pids.iter().any(|pid| self.is_alive(*pid))
    }

    /// Resolves once none of the pids is running. Resolves immediately for
    /// an empty watch.
    pub async fn all_exited(&self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            let _ = interval.tick().await;
            if !self.any_alive() {
                trace!("none of {:?} is running", self.pids);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn reaped_pid() -> Pid {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = Pid::from_raw(child.id() as i32);
        let _ = child.wait().expect("wait");
        pid
    }

    #[test]
    fn running_process_is_alive() {
        let watch = TargetWatch::new("/proc", vec![Pid::this()]);
        assert!(watch.is_alive(Pid::this()));
        assert!(watch.any_alive());
    }

    #[test]
    fn reaped_process_is_not_alive() {
        let pid = reaped_pid();
        let watch = TargetWatch::new("/proc", vec![pid]);
        assert!(!watch.any_alive());
    }

    #[test]
    fn pids_are_looked_up_below_the_given_procfs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let watch = TargetWatch::new(dir.path(), vec![Pid::this()]);
        assert!(!watch.any_alive());
    }

    #[tokio::test]
    async fn one_live_target_keeps_the_watch_open() {
        let watch = TargetWatch::new("/proc", vec![reaped_pid(), Pid::this()]);
        let exited = tokio::time::timeout(
            POLL_INTERVAL * 3,
            watch.all_exited(),
        )
        .await;
        assert!(exited.is_err());
    }

    #[tokio::test]
    async fn exited_targets_end_the_watch() {
        let watch = TargetWatch::new("/proc", vec![reaped_pid()]);
        tokio::time::timeout(Duration::from_secs(5), watch.all_exited())
            .await
            .expect("targets exited");
    }
}
