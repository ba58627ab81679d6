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

//! An in-memory [Ftrace] that records every call, for tests of code that
//! drives trace instances without a kernel.

use crate::{
    EventSet, FsKind, Ftrace, Instance, InstanceName, Result, TraceOption,
    TracefsError, TracingRoot,
};
use nix::{errno::Errno, unistd::Pid};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};

const RECORDING_ROOT: &str = "/recording/tracing";

/// Every mutating call [RecordingFtrace] received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateInstance(String),
    DestroyInstance(String),
    SetOption(String, TraceOption, bool),
    SetEventPids(String, Vec<Pid>),
    SetFunctionPids(String, Vec<Pid>),
    SetTracingOn(String, bool),
    SetEvents(String, EventSet, bool),
}

/// Operations that can be made to fail once with
/// [RecordingFtrace::fail_once].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SetOption,
    SetEventPids,
    SetFunctionPids,
    SetTracingOn,
    SetEvents,
}

/// What the kernel would hold for one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceState {
    pub tracing_on: bool,
    pub options: BTreeMap<TraceOption, bool>,
    pub event_pids: Vec<Pid>,
    pub function_pids: Vec<Pid>,
    /// The last enabled event set, `None` once it was disabled.
    pub events: Option<EventSet>,
}

impl InstanceState {
    pub fn option(&self, option: TraceOption) -> bool {
        self.options.get(&option).copied().unwrap_or(false)
    }

    /// True if nothing of a session is left behind in the instance.
    pub fn is_quiescent(&self) -> bool {
        !self.tracing_on
            && self.options.values().all(|enabled| !enabled)
            && self.event_pids.is_empty()
            && self.function_pids.is_empty()
            && self.events.is_none()
    }
}

#[derive(Debug, Default)]
struct State {
    instances: BTreeMap<String, InstanceState>,
    calls: Vec<Call>,
    create_calls: usize,
    failing_creates: usize,
    busy: BTreeSet<String>,
    fail_once: HashMap<Op, usize>,
    available: BTreeMap<String, Vec<String>>,
}

#[derive(Debug)]
pub struct RecordingFtrace {
    root: TracingRoot,
    state: Mutex<State>,
}

impl Default for RecordingFtrace {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingFtrace {
    pub fn new() -> Self {
        Self {
            root: TracingRoot::new(RECORDING_ROOT, FsKind::Default),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an instance as if somebody else created it.
    pub fn with_instance(self, name: &str) -> Self {
        let _ = self
            .state()
            .instances
            .insert(name.to_string(), InstanceState::default());
        self
    }

    pub fn with_available_events(self, system: &str, events: &[&str]) -> Self {
        let _ = self.state().available.insert(
            system.to_string(),
            events.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    /// The next `count` instance creations fail.
    pub fn fail_next_creates(&self, count: usize) {
        self.state().failing_creates = count;
    }

    /// Removing `name` fails as if a tracer still had it open.
    pub fn mark_busy(&self, name: &str) {
        let _ = self.state().busy.insert(name.to_string());
    }

    /// The next call of `op` fails.
    pub fn fail_once(&self, op: Op) {
        *self.state().fail_once.entry(op).or_default() += 1;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// How often [Ftrace::create_instance] was called, failures included.
    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn instance(&self, name: &str) -> Option<InstanceState> {
        self.state().instances.get(name).cloned()
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.instances_dir().join(name)
    }

    fn update(
        &self,
        op: Op,
        instance: &Instance,
        call: Call,
        file: &str,
        apply: impl FnOnce(&mut InstanceState),
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);

        if let Some(pending) = state.fail_once.get_mut(&op) {
            if *pending > 0 {
                *pending -= 1;
                return Err(TracefsError::FailedToWrite {
                    path: instance.dir().join(file),
                    value: String::new(),
                    source: io::Error::from(Errno::EIO),
                });
            }
        }

        let Some(instance_state) = state.instances.get_mut(&**instance.name())
        else {
            return Err(TracefsError::InstanceNotFound {
                name: instance.name().to_string(),
            });
        };

        apply(instance_state);
        Ok(())
    }
}

impl Ftrace for RecordingFtrace {
    fn root(&self) -> &TracingRoot {
        &self.root
    }

    fn create_instance(&self, name: &InstanceName) -> Result<Instance> {
        let mut state = self.state();
        state.calls.push(Call::CreateInstance(name.to_string()));
        state.create_calls += 1;

        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(TracefsError::FailedToCreateInstance {
                name: name.clone(),
                source: io::Error::from(Errno::ENOSPC),
            });
        }

        if state.instances.contains_key(&**name) {
            return Err(TracefsError::InstanceExists { name: name.clone() });
        }

        let _ = state
            .instances
            .insert(name.to_string(), InstanceState::default());
        Ok(Instance::new(name.clone(), self.dir(name)))
    }

    fn find_instance(&self, name: &InstanceName) -> Result<Option<Instance>> {
        Ok(self
            .state()
            .instances
            .contains_key(&**name)
            .then(|| Instance::new(name.clone(), self.dir(name))))
    }

    fn destroy_instance(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DestroyInstance(name.to_string()));

        if state.busy.contains(name) {
            return Err(TracefsError::FailedToDestroyInstance {
                name: name.to_string(),
                source: io::Error::from(Errno::EBUSY),
            });
        }

        match state.instances.remove(name) {
            Some(_) => Ok(()),
            None => {
                Err(TracefsError::InstanceNotFound { name: name.to_string() })
            }
        }
    }

    fn instance_names(&self) -> Result<Vec<String>> {
        Ok(self.state().instances.keys().cloned().collect())
    }

    fn set_option(
        &self,
        instance: &Instance,
        option: TraceOption,
        enabled: bool,
    ) -> Result<()> {
        let call =
            Call::SetOption(instance.name().to_string(), option, enabled);
        self.update(Op::SetOption, instance, call, option.file_name(), |s| {
            let _ = s.options.insert(option, enabled);
        })
    }

    fn set_event_pids(&self, instance: &Instance, pids: &[Pid]) -> Result<()> {
        let call =
            Call::SetEventPids(instance.name().to_string(), pids.to_vec());
        self.update(Op::SetEventPids, instance, call, "set_event_pid", |s| {
            s.event_pids = pids.to_vec()
        })
    }

    fn set_function_pids(
        &self,
        instance: &Instance,
        pids: &[Pid],
    ) -> Result<()> {
        let call =
            Call::SetFunctionPids(instance.name().to_string(), pids.to_vec());
        self.update(Op::SetFunctionPids, instance, call, "set_ftrace_pid", |s| {
            s.function_pids = pids.to_vec()
        })
    }

    fn set_tracing_on(&self, instance: &Instance, on: bool) -> Result<()> {
        let call = Call::SetTracingOn(instance.name().to_string(), on);
        self.update(Op::SetTracingOn, instance, call, "tracing_on", |s| {
            s.tracing_on = on
        })
    }

    fn set_events(
        &self,
        instance: &Instance,
        events: &EventSet,
        enabled: bool,
    ) -> Result<()> {
        let name = instance.name().to_string();
        let call = Call::SetEvents(name, events.clone(), enabled);
        self.update(Op::SetEvents, instance, call, "events", |s| {
            s.events = enabled.then(|| events.clone())
        })
    }

    fn available_events(&self, system: &str) -> Result<Vec<String>> {
        Ok(self.state().available.get(system).cloned().unwrap_or_default())
    }
}
