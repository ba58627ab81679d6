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

//! Trace definitions shipped with the tracer. Each one is a binary that
//! turns its flags into a [trace_session::TraceRequest] and runs a
//! [trace_session::Session] until stopped.

pub use error::{DefinitionError, Result};

pub mod syscalls;

mod error;

use crate::Config;
use anyhow::Context;
use nix::unistd::Pid;
use procfs::process::Process;
use std::path::Path;
use trace_session::{Session, SessionReport, StopSignal, TraceArgs};
use tracefs::{EventSet, Instances, TraceFs, TracingRoot};
use tracing::{debug, info, warn};

/// Binds an instance, traces `events` for the processes in `trace` and
/// drains the instance again. `events` is chosen before any instance is
/// bound. Tracing also stops once every target has exited.
pub(crate) async fn execute(
    config: &Config,
    trace: &TraceArgs,
    events: impl FnOnce(&TraceFs) -> Result<EventSet>,
) -> anyhow::Result<SessionReport> {
    let root = TracingRoot::global(&config.overrides());
    let instances = Instances::new(TraceFs::new(root.clone()));

    let events = events(instances.ftrace())?;
    let mut request = trace.request(events);
    request.procfs = Some(config.procfs());
    report_targets(&config.procfs(), &request.pids);

    let mut stop = StopSignal::listen_for_os_signals()?;
    let report = Session::new(&instances, request)
        .execute(&mut stop)
        .await
        .context("trace session failed")?;

    info!(
        "trace finished ({}), data is in {}",
        report.wake,
        report.instance.trace_path().display()
    );
    Ok(report)
}

/// Tracing a pid that does not exist is allowed, it may be started later,
/// but is worth a warning.
fn report_targets(procfs: &Path, pids: &[Pid]) {
    for pid in pids {
        let process = Process::new_with_root(procfs.join(pid.to_string()))
            .and_then(|process| process.stat());
        match process {
            Ok(stat) => debug!("tracing pid {pid} ({})", stat.comm),
            Err(e) => warn!("pid {pid} is not running: {e}"),
        }
    }
}
