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

use crate::{EventSet, InstanceName, Result, TracingRoot};
use nix::unistd::Pid;
use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

/// Boolean options found under `<instance>/options/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraceOption {
    /// Children of tasks in `set_event_pid` are added to the event filter.
    EventFork,
    /// Children of tasks in `set_ftrace_pid` are added to the function
    /// filter.
    FunctionFork,
}

impl TraceOption {
    pub fn file_name(&self) -> &'static str {
        match self {
            TraceOption::EventFork => "event-fork",
            TraceOption::FunctionFork => "function-fork",
        }
    }
}

impl Display for TraceOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A live tracefs instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    name: InstanceName,
    dir: PathBuf,
}

impl Instance {
    pub fn new(name: InstanceName, dir: PathBuf) -> Self {
        Self { name, dir }
    }

    pub fn name(&self) -> &InstanceName {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the trace data of this instance can be read from.
    pub fn trace_path(&self) -> PathBuf {
        self.dir.join("trace")
    }
}

/// The kernel tracing capability.
///
/// Every operation is scoped to one instance name, which is what allows
/// unrelated processes to share tracefs without locking.
pub trait Ftrace {
    fn root(&self) -> &TracingRoot;

    /// Creates an instance with tracing switched off.
    /// Fails with [crate::TracefsError::InstanceExists] if the name is taken.
    fn create_instance(&self, name: &InstanceName) -> Result<Instance>;

    fn find_instance(&self, name: &InstanceName) -> Result<Option<Instance>>;

    /// Removes an instance. Takes a plain name, as instances created by
    /// others do not need to satisfy [InstanceName]'s rules.
    fn destroy_instance(&self, name: &str) -> Result<()>;

    /// Names of all live instances, regardless of who created them.
    fn instance_names(&self) -> Result<Vec<String>>;

    fn set_option(
        &self,
        instance: &Instance,
        option: TraceOption,
        enabled: bool,
    ) -> Result<()>;

    /// Replaces the event PID filter. An empty slice clears it.
    fn set_event_pids(&self, instance: &Instance, pids: &[Pid]) -> Result<()>;

    /// Replaces the function PID filter. An empty slice clears it.
    fn set_function_pids(
        &self,
        instance: &Instance,
        pids: &[Pid],
    ) -> Result<()>;

    fn set_tracing_on(&self, instance: &Instance, on: bool) -> Result<()>;

    fn set_events(
        &self,
        instance: &Instance,
        events: &EventSet,
        enabled: bool,
    ) -> Result<()>;

    /// Events the kernel offers for `system`, e.g. `sys_enter_openat` for
    /// `syscalls`.
    fn available_events(&self, system: &str) -> Result<Vec<String>>;
}
