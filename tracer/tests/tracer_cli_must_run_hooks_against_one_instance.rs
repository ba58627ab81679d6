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

mod common;

use common::*;
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use procfs::process::all_processes;
use serial_test::serial;
use std::{ffi::OsString, fs, path::Path, time::Duration};
use test_helpers::write_script;

const TRACER: &str = env!("CARGO_BIN_EXE_tracer");
const TRACE_SYSCALLS: &str = env!("CARGO_BIN_EXE_trace_syscalls");

#[test]
#[serial]
fn run_concatenates_hook_output_in_discovery_order() {
    let host = FakeHost::new();
    let _ = host.populate_instance("shared");
    let hooks = tempfile::tempdir().expect("tempdir");
    let _ = write_script(hooks.path(), "trace_syscalls.b", r#"echo "b $*""#);
    let _ = write_script(hooks.path(), "trace_syscalls.a", r#"echo "a $*""#);

    let mut cli = args(&["-r", "syscalls", "-a", "-p 1234", "-i", "shared"]);
    cli.extend(host.overrides());
    cli.push("--trace-hooks".into());
    cli.push(hooks.path().into());
    let output = run(TRACER, &cli);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        format!(
            "{}\na -p 1234 --instance shared\nb -p 1234 --instance shared\n",
            host.instance("shared").join("trace").display()
        )
    );
}

/// Every knob the session armed is back to its resting value.
fn assert_drained(instance: &Path) {
    assert_eq!(read(instance.join("tracing_on")), "0");
    assert_eq!(read(instance.join("options/event-fork")), "0");
    assert_eq!(read(instance.join("options/function-fork")), "0");
    assert_eq!(read(instance.join("set_event_pid")), "");
    assert_eq!(read(instance.join("set_ftrace_pid")), "");
    assert_eq!(
        read(instance.join("events/syscalls/sys_enter_openat/enable")),
        "0"
    );
}

/// `tracer` running the installed `trace_syscalls` against `instance`.
fn syscalls_cli(
    host: &FakeHost,
    instance: &str,
    hook_args: &str,
) -> Vec<OsString> {
    let hooks = Path::new(TRACE_SYSCALLS).parent().expect("bin dir");
    let mut cli = args(&["-r", "syscalls", "-a", hook_args, "-i", instance]);
    cli.extend(host.overrides());
    cli.push("--trace-hooks".into());
    cli.push(hooks.into());
    cli
}

#[test]
#[serial]
fn trace_syscalls_leaves_the_instance_clean() {
    let host = FakeHost::new();
    let instance = host.populate_instance("kube_e2e");
    let pid = std::process::id();
    host.add_process(pid);

    let cli = syscalls_cli(&host, "kube_e2e", &format!("-p {pid} -t 50"));
    let output = run(TRACER, &cli);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output)
        .starts_with(&instance.join("trace").display().to_string()));
    assert_drained(&instance);
    assert_eq!(read(instance.join("events/syscalls/enable")), "unset");
}

#[test]
#[serial]
fn sigusr1_to_the_hook_group_stops_and_drains() {
    let host = FakeHost::new();
    let instance = host.populate_instance("kube_sig");
    let pid = std::process::id();
    host.add_process(pid);

    let cli = syscalls_cli(&host, "kube_sig", &format!("-p {pid}"));
    let tracer = spawn(TRACER, &cli);
    let tracer_pid = i32::try_from(tracer.id()).expect("pid");

    let armed = eventually(Duration::from_secs(10), || {
        fs::read_to_string(instance.join("tracing_on"))
            .map_or(false, |on| on.trim() == "1")
    });
    assert!(armed, "tracing was never switched on");

    let hook = all_processes()
        .expect("processes")
        .filter_map(|process| process.ok()?.stat().ok())
        .find(|stat| stat.ppid == tracer_pid)
        .expect("hook process");
    killpg(Pid::from_raw(hook.pgrp), Signal::SIGUSR1).expect("killpg");

    let output = wait_for(tracer, Duration::from_secs(10));
    assert!(output.status.success(), "{}", stderr(&output));
    assert_drained(&instance);
}

#[test]
#[serial]
fn tracing_ends_once_the_targets_are_gone() {
    let host = FakeHost::new();
    let instance = host.populate_instance("kube_gone");

    // Not added to the fake procfs, so already exited as far as it knows.
    let pid = std::process::id();
    let cli = syscalls_cli(&host, "kube_gone", &format!("-p {pid}"));
    let output = wait_for(spawn(TRACER, &cli), Duration::from_secs(10));

    assert!(output.status.success(), "{}", stderr(&output));
    assert_drained(&instance);
}

#[test]
#[serial]
fn clear_removes_only_owned_instances() {
    let host = FakeHost::new();
    for name in ["kube_old1", "kube_old2", "perf"] {
        std::fs::create_dir(host.instance(name)).expect("instance");
    }

    let mut cli = args(&["--clear"]);
    cli.extend(host.overrides());
    let output = run(TRACER, &cli);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "kube_old1\nkube_old2\n");
    assert!(!host.instance("kube_old1").exists());
    assert!(!host.instance("kube_old2").exists());
    assert!(host.instance("perf").exists());
}
