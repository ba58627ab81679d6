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

//! Runs against the real tracing filesystem. Requires root.

use nix::unistd::Pid;
use std::fs;
use test_helpers::*;
use tracefs::{
    EventSet, FsKind, Ftrace, Instances, TraceFs, TraceOption, TracingRoot,
};

fn kernel_instances() -> Instances<TraceFs> {
    let root = mounted_tracefs().expect("tracefs mounted");
    Instances::new(TraceFs::new(TracingRoot::new(root, FsKind::Tracefs)))
}

#[test]
fn kernel_instance_is_created_configured_and_removed() {
    skip_if_not_root!("kernel_instance_is_created_configured_and_removed");
    skip_if_no_tracefs!("kernel_instance_is_created_configured_and_removed");

    let instances = kernel_instances();
    let ftrace = instances.ftrace();
    let instance = instances.create_anonymous().expect("create instance");
    let dir = instance.dir().to_path_buf();

    let read = |file: &str| {
        fs::read_to_string(dir.join(file)).expect("read").trim().to_string()
    };
    assert_eq!(read("tracing_on"), "0");

    let pid = Pid::this();
    ftrace.set_event_pids(&instance, &[pid]).expect("event pids");
    ftrace
        .set_option(&instance, TraceOption::EventFork, true)
        .expect("event-fork");
    ftrace
        .set_events(&instance, &EventSet::all("sched"), true)
        .expect("sched events");
    assert_eq!(read("set_event_pid"), pid.to_string());
    assert_eq!(read("options/event-fork"), "1");

    ftrace
        .set_events(&instance, &EventSet::all("sched"), false)
        .expect("sched events");
    ftrace.set_event_pids(&instance, &[]).expect("clear pids");
    ftrace
        .set_option(&instance, TraceOption::EventFork, false)
        .expect("event-fork");
    assert_eq!(read("set_event_pid"), "");

    instances.destroy(instance.name()).expect("destroy instance");
    assert!(!dir.exists());
}

#[test]
fn kernel_offers_syscall_events() {
    skip_if_not_root!("kernel_offers_syscall_events");
    skip_if_no_tracefs!("kernel_offers_syscall_events");

    let instances = kernel_instances();
    let events =
        instances.ftrace().available_events("syscalls").expect("events");
    if events.is_empty() {
        skip!("kernel built without syscall tracepoints. Skipping test.");
    }
    assert!(events.iter().any(|event| event.starts_with("sys_enter_")));
}
