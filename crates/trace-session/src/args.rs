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

use crate::TraceRequest;
use clap::{Args, Command};
use nix::unistd::Pid;
use std::time::Duration;
use tracefs::{EventSet, InstanceName};

/// Flags every trace definition understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct TraceArgs {
    /// Trace these processes and, once forked, their children.
    #[clap(short = 'p', long = "pid", value_name = "PID", num_args = 1..)]
    pub pids: Vec<i32>,

    /// Trace the children of these processes.
    #[clap(long = "parent", value_name = "PID", num_args = 1..)]
    pub parents: Vec<i32>,

    /// Trace instance to use, created if missing. Defaults to a fresh
    /// anonymous instance.
    #[clap(short, long, value_name = "NAME")]
    pub instance: Option<InstanceName>,

    /// Stop tracing after this many milliseconds. 0 waits for SIGUSR1,
    /// SIGINT or every traced process to exit.
    #[clap(short, long, value_name = "MS", default_value_t = 0)]
    pub time: u64,

    /// Print what this trace does and which arguments it takes, then exit.
    #[clap(long)]
    pub describe: bool,
}

impl TraceArgs {
    pub fn request(&self, events: EventSet) -> TraceRequest {
        TraceRequest {
            pids: self.pids.iter().copied().map(Pid::from_raw).collect(),
            parents: self.parents.iter().copied().map(Pid::from_raw).collect(),
            instance: self.instance.clone(),
            duration: Some(Duration::from_millis(self.time)),
            events,
            procfs: None,
        }
    }
}

/// The self description printed for `--describe`: the command's about
/// line followed by its argument summary.
pub fn describe(mut command: Command) -> String {
    let about = command.get_about().map(|about| about.to_string());
    let help = command.render_help().to_string();
    match about {
        Some(about) if !help.starts_with(&about) => {
            format!("{about}\n\n{help}")
        }
        _ => help,
    }
}
