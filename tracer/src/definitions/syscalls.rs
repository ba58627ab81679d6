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

use super::{DefinitionError, Result};
use crate::{logging, Config, EXIT_ERROR, EXIT_OKAY};
use clap::{CommandFactory, Parser};
use trace_session::{describe, TraceArgs};
use tracefs::{EventSet, Ftrace};
use tracing::error;

/// Event subsystem holding the system call tracepoints.
pub const SYSTEM: &str = "syscalls";
const ENTER_PREFIX: &str = "sys_enter_";

/// Trace system calls, used by given container
#[derive(Debug, Parser)]
#[clap(name = "trace_syscalls", version, long_about = None)]
pub struct SyscallsOptions {
    #[clap(flatten)]
    pub trace: TraceArgs,

    /// Only trace these system calls, e.g. `openat` or `sys_enter_openat`.
    /// Without names every system call entry is traced.
    #[clap(short, long = "syscall", value_name = "NAME", num_args = 0..)]
    pub syscalls: Vec<String>,

    #[clap(flatten)]
    pub config: Config,
}

/// The events to enable for `names`. A name is used as is when it is an
/// event of [SYSTEM], else with the `sys_enter_` prefix.
///
/// No names select every `sys_enter_` event, or the whole of [SYSTEM] if
/// the kernel lists none.
pub fn syscall_events(
    ftrace: &impl Ftrace,
    names: &[String],
) -> Result<EventSet> {
    let available = ftrace.available_events(SYSTEM)?;
    let mut events = EventSet::new();

    if names.is_empty() {
        for event in available.iter().filter(|e| e.starts_with(ENTER_PREFIX)) {
            events.insert(SYSTEM, event.as_str());
        }
        if events.is_empty() {
            return Ok(EventSet::all(SYSTEM));
        }
        return Ok(events);
    }

    for name in names {
        let event = [name.clone(), format!("{ENTER_PREFIX}{name}")]
            .into_iter()
            .find(|candidate| available.contains(candidate))
            .ok_or_else(|| DefinitionError::UnknownSyscall {
                name: name.clone(),
            })?;
        events.insert(SYSTEM, event);
    }

    Ok(events)
}

/// Entry point of the `trace_syscalls` binary.
pub async fn run() -> i32 {
    let options = SyscallsOptions::parse();

    if options.trace.describe {
        print!("{}", describe(SyscallsOptions::command()));
        return EXIT_OKAY;
    }

    if let Err(e) = logging::init(options.config.verbose) {
        eprintln!("failed to initialize logging: {e}");
        return EXIT_ERROR;
    }

    let traced = super::execute(&options.config, &options.trace, |ftrace| {
        syscall_events(ftrace, &options.syscalls)
    })
    .await;

    match traced {
        Ok(_) => EXIT_OKAY,
        Err(e) => {
            error!("{e:?}");
            EXIT_ERROR
        }
    }
}
