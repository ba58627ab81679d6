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

#![allow(dead_code)]

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, Output, Stdio},
    thread,
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// A procfs and sysfs pair in a temporary directory whose mount table
/// places tracefs at /sys/kernel/tracing.
pub struct FakeHost {
    dir: TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = Self { dir };
        fs::create_dir_all(host.procfs()).expect("procfs");
        fs::create_dir_all(host.root().join("instances")).expect("instances");
        fs::write(
            host.procfs().join("mounts"),
            "sysfs /sys sysfs rw 0 0\ntracefs /sys/kernel/tracing tracefs rw 0 0\n",
        )
        .expect("mounts");
        host.add_event("syscalls", "sys_enter_openat");
        host.add_event("syscalls", "sys_exit_openat");
        host
    }

    pub fn procfs(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn sysfs(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    /// The tracing root as seen through the overrides.
    pub fn root(&self) -> PathBuf {
        self.sysfs().join("kernel/tracing")
    }

    pub fn instance(&self, name: &str) -> PathBuf {
        self.root().join("instances").join(name)
    }

    /// The files the kernel creates in a new instance. Each holds `unset`
    /// so that a drain shows up as a write.
    pub fn populate_instance(&self, name: &str) -> PathBuf {
        let dir = self.instance(name);
        fs::create_dir_all(dir.join("options")).expect("options");
        fs::create_dir_all(dir.join("events/syscalls/sys_enter_openat"))
            .expect("events");
        for file in [
            "tracing_on",
            "set_event_pid",
            "set_ftrace_pid",
            "trace",
            "options/event-fork",
            "options/function-fork",
            "events/syscalls/enable",
            "events/syscalls/sys_enter_openat/enable",
        ] {
            fs::write(dir.join(file), "unset").expect(file);
        }
        dir
    }

    pub fn add_event(&self, system: &str, event: &str) {
        fs::create_dir_all(self.root().join("events").join(system).join(event))
            .expect("event");
    }

    /// Makes `pid` visible in the fake procfs with its current stat.
    pub fn add_process(&self, pid: u32) {
        let dir = self.procfs().join(pid.to_string());
        fs::create_dir_all(&dir).expect("pid dir");
        let _ = fs::copy(format!("/proc/{pid}/stat"), dir.join("stat"))
            .expect("stat");
    }

    pub fn overrides(&self) -> Vec<OsString> {
        vec![
            "--procfs-path".into(),
            self.procfs().into(),
            "--sysfs-path".into(),
            self.sysfs().into(),
        ]
    }
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).expect("read").trim().to_string()
}

pub fn run(binary: &str, args: &[OsString]) -> Output {
    command(binary, args).output().expect("failed to run binary")
}

fn command(binary: &str, args: &[OsString]) -> Command {
    let mut command = Command::new(binary);
    let _ = command
        .args(args)
        .env_remove("TRACER_HOOKS")
        .env_remove("TRACER_PROCFS_PATH")
        .env_remove("TRACER_SYSFS_PATH")
        .env_remove("TRACER_VERBOSE");
    command
}

pub fn spawn(binary: &str, args: &[OsString]) -> Child {
    command(binary, args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary")
}

/// Waits for `child` to exit, killing it after `limit`.
pub fn wait_for(mut child: Child, limit: Duration) -> Output {
    let started = Instant::now();
    while child.try_wait().expect("try_wait").is_none() {
        if started.elapsed() > limit {
            let _ = child.kill();
            let output = child.wait_with_output().expect("output");
            panic!("still running after {limit:?}: {}", stderr(&output));
        }
        thread::sleep(Duration::from_millis(20));
    }
    child.wait_with_output().expect("output")
}

/// Polls until `done` holds, for at most `limit`.
pub fn eventually(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn args(raw: &[&str]) -> Vec<OsString> {
    raw.iter().map(OsString::from).collect()
}
