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

use crate::{
    EventSet, Ftrace, Instance, InstanceName, Result, TraceOption,
    TracefsError, TracingRoot,
};
use nix::unistd::Pid;
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, trace, warn};

/// [Ftrace] over the files of a mounted tracing filesystem.
#[derive(Debug, Clone)]
pub struct TraceFs {
    root: TracingRoot,
}

impl TraceFs {
    pub fn new(root: TracingRoot) -> Self {
        Self { root }
    }

    fn instance_dir(&self, name: &str) -> PathBuf {
        self.root.instances_dir().join(name)
    }

    /// tracefs files already exist; a missing one means the kernel does not
    /// offer that knob, so nothing is ever created here.
    fn write(path: &Path, value: &str) -> Result<()> {
        trace!("{} <- {value:?}", path.display());
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .and_then(|mut file| file.write_all(value.as_bytes()))
            .map_err(|source| TracefsError::FailedToWrite {
                path: path.to_path_buf(),
                value: value.to_string(),
                source,
            })
    }

    fn write_flag(path: &Path, on: bool) -> Result<()> {
        Self::write(path, if on { "1" } else { "0" })
    }

    fn write_pids(path: &Path, pids: &[Pid]) -> Result<()> {
        let value = pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::write(path, &value)
    }

    fn subdirectories(dir: &Path) -> Result<Vec<String>> {
        let read_error =
            |source| TracefsError::FailedToRead { path: dir.into(), source };

        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if !entry.file_type().map_err(read_error)?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Function tracing is an optional kernel feature. Its files are simply
/// absent when it is not built in.
fn tolerate_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(TracefsError::FailedToWrite { path, source, .. })
            if source.kind() == ErrorKind::NotFound =>
        {
            warn!("{} does not exist, skipping", path.display());
            Ok(())
        }
        other => other,
    }
}

impl Ftrace for TraceFs {
    fn root(&self) -> &TracingRoot {
        &self.root
    }

    fn create_instance(&self, name: &InstanceName) -> Result<Instance> {
        let dir = self.instance_dir(name);

        fs::create_dir(&dir).map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => {
                TracefsError::InstanceExists { name: name.clone() }
            }
            _ => TracefsError::FailedToCreateInstance {
                name: name.clone(),
                source,
            },
        })?;

        let instance = Instance::new(name.clone(), dir);
        if let Err(e) = self.set_tracing_on(&instance, false) {
            let _ = fs::remove_dir(instance.dir());
            return Err(e);
        }

        debug!("created trace instance {name}");
        Ok(instance)
    }

    fn find_instance(&self, name: &InstanceName) -> Result<Option<Instance>> {
        let dir = self.instance_dir(name);
        Ok(dir.is_dir().then(|| Instance::new(name.clone(), dir)))
    }

    fn destroy_instance(&self, name: &str) -> Result<()> {
        fs::remove_dir(self.instance_dir(name)).map_err(|source| {
            match source.kind() {
                ErrorKind::NotFound => {
                    TracefsError::InstanceNotFound { name: name.to_string() }
                }
                _ => TracefsError::FailedToDestroyInstance {
                    name: name.to_string(),
                    source,
                },
            }
        })?;

        debug!("destroyed trace instance {name}");
        Ok(())
    }

    fn instance_names(&self) -> Result<Vec<String>> {
        Self::subdirectories(&self.root.instances_dir())
    }

    fn set_option(
        &self,
        instance: &Instance,
        option: TraceOption,
        enabled: bool,
    ) -> Result<()> {
        let path = instance.dir().join("options").join(option.file_name());
        let result = Self::write_flag(&path, enabled);
        match option {
            TraceOption::FunctionFork => tolerate_missing(result),
            TraceOption::EventFork => result,
        }
    }

    fn set_event_pids(&self, instance: &Instance, pids: &[Pid]) -> Result<()> {
        Self::write_pids(&instance.dir().join("set_event_pid"), pids)
    }

    fn set_function_pids(
        &self,
        instance: &Instance,
        pids: &[Pid],
    ) -> Result<()> {
        tolerate_missing(Self::write_pids(
            &instance.dir().join("set_ftrace_pid"),
            pids,
        ))
    }

    fn set_tracing_on(&self, instance: &Instance, on: bool) -> Result<()> {
        Self::write_flag(&instance.dir().join("tracing_on"), on)
    }

    fn set_events(
        &self,
        instance: &Instance,
        events: &EventSet,
        enabled: bool,
    ) -> Result<()> {
        let events_dir = instance.dir().join("events");

        for (system, names) in events.iter() {
            let system_dir = events_dir.join(system);
            if EventSet::covers_whole_system(names) {
                Self::write_flag(&system_dir.join("enable"), enabled)?;
                continue;
            }
            for name in names {
                let path = system_dir.join(name).join("enable");
                Self::write_flag(&path, enabled)?;
            }
        }

        Ok(())
    }

    fn available_events(&self, system: &str) -> Result<Vec<String>> {
        Self::subdirectories(&self.root.events_dir().join(system))
    }
}

impl From<TracingRoot> for TraceFs {
    fn from(root: TracingRoot) -> Self {
        Self::new(root)
    }
}
