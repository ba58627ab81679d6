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

//! The tracer runs trace definitions against isolated kernel trace
//! instances.
//!
//! `tracer --run NAME` binds a trace instance, prints the path its trace data
//! can be read from, and runs every hook named `trace_NAME[.*]` in its own
//! process group with `--instance <instance>` appended to the arguments. The
//! hooks (for example `trace_syscalls`, built from this crate) drive the
//! instance through a [trace_session::Session] and clean it up when sent
//! `SIGUSR1` or `SIGINT`.

// Lint groups: https://doc.rust-lang.org/rustc/lints/groups.html
#![warn(future_incompatible, nonstandard_style, unused)]
#![warn(
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    unconditional_recursion,
    unused_comparisons,
    while_true
)]
#![warn(missing_debug_implementations,
    // TODO: missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
#![warn(clippy::unwrap_used)]

use anyhow::Context;
use clap::Parser;
use hooks::{Dispatcher, HookOutput, HookRegistry, RunRequest};
use std::{
    io::{self, Write},
    path::PathBuf,
};
use tracefs::{InstanceName, Instances, TraceFs, TracingRoot};
use tracing::{error, info, trace};

pub use config::Config;
pub use error::TracerError;

pub mod definitions;
pub mod hooks;
pub mod logging;

mod config;
mod error;

pub const EXIT_OKAY: i32 = 0;
pub const EXIT_ERROR: i32 = 1;

/// Runs trace definitions against isolated kernel trace instances.
///
/// When several actions are given only the first of get-all, describe,
/// clear and run is performed.
#[derive(Parser, Debug)]
#[clap(name = "tracer", version, long_about = None)]
pub struct TracerOptions {
    /// List the names of all trace definitions.
    #[clap(short = 'g', long)]
    pub get_all: bool,

    /// Print what the trace definition NAME does and which arguments it
    /// takes.
    #[clap(short, long, value_name = "NAME")]
    pub describe: Option<String>,

    /// Remove every trace instance the tracer created.
    #[clap(short, long)]
    pub clear: bool,

    /// Run the trace definition NAME.
    #[clap(short, long, value_name = "NAME")]
    pub run: Option<String>,

    /// Arguments for the trace definition, as one string.
    #[clap(short, long, value_name = "ARGS", allow_hyphen_values = true)]
    pub args: Option<String>,

    /// Trace into this instance, created if missing. Defaults to a fresh
    /// anonymous instance.
    #[clap(short, long, value_name = "NAME")]
    pub instance: Option<InstanceName>,

    /// Remove the anonymous instance once the trace definition exited.
    #[clap(long)]
    pub remove_instance: bool,

    /// Directory holding the trace definitions. Defaults to the directory
    /// of the tracer executable.
    #[clap(long, env = "TRACER_HOOKS", value_name = "DIR")]
    pub trace_hooks: Option<PathBuf>,

    #[clap(flatten)]
    pub config: Config,
}

impl TracerOptions {
    fn hooks_dir(&self) -> Result<PathBuf, TracerError> {
        if let Some(dir) = &self.trace_hooks {
            return Ok(dir.clone());
        }

        let exe = std::env::current_exe()
            .map_err(|source| TracerError::HooksDirUnknown { source })?;
        Ok(exe.parent().map(PathBuf::from).unwrap_or_default())
    }

    fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let registry = HookRegistry::discover(self.hooks_dir()?)?;
        Ok(Dispatcher::new(registry, self.config.env()))
    }

    fn instances(&self) -> Instances<TraceFs> {
        let root = TracingRoot::global(&self.config.overrides());
        trace!("using tracing root {}", root.path().display());
        Instances::new(TraceFs::new(root.clone()))
    }

    fn run_request(&self, name: &str) -> RunRequest {
        RunRequest {
            name: name.to_string(),
            args: self
                .args
                .as_deref()
                .map(|args| args.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            instance: self.instance.clone(),
            remove_instance: self.remove_instance,
        }
    }
}

/// Entry point of the `tracer` binary.
pub async fn run() -> i32 {
    let options = TracerOptions::parse();

    if let Err(e) = logging::init(options.config.verbose) {
        eprintln!("failed to initialize logging: {e}");
        return EXIT_ERROR;
    }

    trace!("**Logging: Verbose Mode**");

    match tracer(&options, &mut io::stdout()).await {
        Ok(()) => EXIT_OKAY,
        Err(e) => {
            error!("{e:?}");
            EXIT_ERROR
        }
    }
}

async fn tracer(
    options: &TracerOptions,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if options.get_all {
        let registry = HookRegistry::discover(options.hooks_dir()?)?;
        for name in registry.names() {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    if let Some(name) = &options.describe {
        let outputs = options.dispatcher()?.describe(name).await?;
        return emit(out, &outputs);
    }

    if options.clear {
        let report = options
            .instances()
            .reset_all()
            .context("failed to list trace instances")?;
        for name in &report.removed {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    if let Some(name) = &options.run {
        let request = options.run_request(name);
        let dispatcher = options.dispatcher()?;
        let outputs = dispatcher
            .run(&options.instances(), &request, &mut *out)
            .await
            .with_context(|| format!("failed to run '{name}'"))?;
        info!("'{name}' finished, {} hook(s) ran", outputs.len());
        return emit(out, &outputs);
    }

    Err(TracerError::NothingToDo.into())
}

/// Hook stdout goes to `out`, hook stderr to our stderr.
fn emit(out: &mut impl Write, outputs: &[HookOutput]) -> anyhow::Result<()> {
    let mut stderr = io::stderr();
    for output in outputs {
        out.write_all(&output.stdout)?;
        stderr.write_all(&output.stderr)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> TracerOptions {
        TracerOptions::try_parse_from(
            std::iter::once("tracer").chain(args.iter().copied()),
        )
        .expect("valid arguments")
    }

    #[test]
    fn hook_arguments_are_split_on_whitespace() {
        let options = parse(&["-r", "syscalls", "-a", "-p 1234  --parent 1"]);
        let request = options.run_request("syscalls");

        assert_eq!(request.args, vec!["-p", "1234", "--parent", "1"]);
        assert_eq!(request.instance, None);
        assert!(!request.remove_instance);
    }

    #[test]
    fn long_flags_match_their_short_forms() {
        let options = parse(&[
            "--run",
            "syscalls",
            "--instance",
            "kube_mine",
            "--remove-instance",
            "--trace-hooks",
            "/opt/hooks",
        ]);

        assert_eq!(options.run.as_deref(), Some("syscalls"));
        assert_eq!(options.instance.as_deref(), Some("kube_mine"));
        assert!(options.remove_instance);
        assert_eq!(
            options.hooks_dir().expect("dir"),
            PathBuf::from("/opt/hooks")
        );
    }

    #[test]
    fn hooks_default_to_the_executable_directory() {
        let options = parse(&["-g"]);
        let exe = std::env::current_exe().expect("exe");
        assert_eq!(
            options.hooks_dir().expect("dir"),
            exe.parent().expect("dir")
        );
    }

    #[tokio::test]
    async fn nothing_to_do_is_an_error() {
        let err = tracer(&parse(&[]), &mut Vec::<u8>::new())
            .await
            .expect_err("no action");
        assert!(matches!(
            err.downcast_ref::<TracerError>(),
            Some(TracerError::NothingToDo)
        ));
    }
}
