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

use super::{HookRegistry, HooksError, Result};
use nix::{
    sys::signal::{
        killpg, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal,
    },
    unistd::Pid,
};
use std::{
    io::{self, Write},
    os::raw::c_int,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    process::Command,
    signal::unix::{signal, SignalKind},
};
use tracefs::{Ftrace, InstanceName, Instances};
use tracing::{debug, error, info, warn};

/// Captured result of one hook invocation. A hook that could not be started
/// or waited for has no status and the reason in `stderr`.
#[derive(Debug)]
pub struct HookOutput {
    pub path: PathBuf,
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl HookOutput {
    fn failed(path: &Path, e: HooksError) -> Self {
        error!("{e}");
        Self {
            path: path.to_path_buf(),
            status: None,
            stdout: Vec::new(),
            stderr: format!("{e}\n").into_bytes(),
        }
    }

    pub fn success(&self) -> bool {
        self.status.map_or(false, |status| status.success())
    }
}

/// Which trace definition to run, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub name: String,
    /// Passed to every matching hook, before `--instance <name>`.
    pub args: Vec<String>,
    /// Trace into this instance, created if missing, instead of a fresh
    /// anonymous one.
    pub instance: Option<InstanceName>,
    /// Remove the anonymous instance once every hook exited. A named
    /// instance is always kept.
    pub remove_instance: bool,
}

extern "C" fn ignore_stop(_: c_int) {}

/// Makes `SIGUSR1` harmless to this process.
///
/// A handler that does nothing rather than `SIG_IGN`: an ignored signal
/// stays ignored across `exec`, a caught one is reset to its default, so
/// the hooks still see the signal.
pub fn install_stop_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(ignore_stop),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    // SAFETY: the handler does nothing and is therefore async-signal-safe.
    let _previous = unsafe { sigaction(Signal::SIGUSR1, &action) }
        .map_err(|e| HooksError::Signal { source: io::Error::from(e) })?;
    Ok(())
}

/// Launches hooks found in a [HookRegistry].
#[derive(Debug)]
pub struct Dispatcher {
    registry: HookRegistry,
    env: Vec<(&'static str, PathBuf)>,
}

impl Dispatcher {
    /// `env` is added to the environment of every hook.
    pub fn new(
        registry: HookRegistry,
        env: Vec<(&'static str, PathBuf)>,
    ) -> Self {
        Self { registry, env }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Asks every hook for `name` to describe itself. No instance is
    /// involved.
    pub async fn describe(&self, name: &str) -> Result<Vec<HookOutput>> {
        let args = ["--describe".to_string()];
        let mut outputs = Vec::new();
        for path in self.registry.lookup(name)? {
            outputs.push(self.invoke(path, &args).await);
        }
        Ok(outputs)
    }

    /// Runs every hook for `request.name` one after the other against one
    /// instance.
    ///
    /// The path of the instance's trace stream is written to `announce`
    /// before the first hook starts. A hook failing, including a non-zero
    /// exit, is part of its output rather than an error.
    pub async fn run<F: Ftrace>(
        &self,
        instances: &Instances<F>,
        request: &RunRequest,
        announce: &mut impl Write,
    ) -> Result<Vec<HookOutput>> {
        let hooks = self.registry.lookup(&request.name)?;

        install_stop_handler()?;
        let instance = instances.bind(request.instance.as_ref())?;

        writeln!(announce, "{}", instance.trace_path().display())
            .and_then(|()| announce.flush())
            .map_err(|source| HooksError::Announce { source })?;

        let mut args = request.args.clone();
        args.push("--instance".to_string());
        args.push(instance.name().to_string());

        let mut outputs = Vec::with_capacity(hooks.len());
        for path in hooks {
            outputs.push(self.invoke(path, &args).await);
        }

        if request.remove_instance && request.instance.is_none() {
            if let Err(e) = instances.destroy(instance.name()) {
                warn!("{e}");
            }
        }

        Ok(outputs)
    }

    /// Runs one hook in its own process group to completion. `SIGINT`
    /// received meanwhile is passed on to that group.
    async fn invoke(&self, path: &Path, args: &[String]) -> HookOutput {
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(interrupt) => interrupt,
            Err(source) => {
                let e = HooksError::Signal { source };
                return HookOutput::failed(path, e);
            }
        };

        let mut command = Command::new(path);
        let _ = command
            .args(args)
            .envs(self.env.iter().map(|(key, value)| (*key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        debug!("running {} {}", path.display(), args.join(" "));
        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let e = HooksError::FailedToSpawn { path: path.into(), source };
                return HookOutput::failed(path, e);
            }
        };

        // The child leads its own group, so its pid is the group id.
        let group =
            child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw);

        let output = child.wait_with_output();
        tokio::pin!(output);

        let output = loop {
            tokio::select! {
                output = &mut output => break output,
                Some(()) = interrupt.recv() => {
                    let Some(group) = group else { continue };
                    info!("forwarding SIGINT to process group {group}");
                    if let Err(e) = killpg(group, Signal::SIGINT) {
                        warn!("failed to forward SIGINT to {group}: {e}");
                    }
                }
            }
        };

        let output = match output {
            Ok(output) => output,
            Err(source) => {
                let e = HooksError::FailedToWait { path: path.into(), source };
                return HookOutput::failed(path, e);
            }
        };

        if output.status.success() {
            info!("{} exited with {}", path.display(), output.status);
        } else {
            warn!("{} exited with {}", path.display(), output.status);
        }

        HookOutput {
            path: path.to_path_buf(),
            status: Some(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}
