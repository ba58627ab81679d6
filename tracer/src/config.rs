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

use clap::Args;
use std::path::PathBuf;
use tracefs::{RootOverrides, PROCFS_ENV, SYSFS_ENV};

/// Settings shared by the orchestrator and every trace definition. Each
/// flag can also be given through its environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct Config {
    /// Read process information from this directory instead of /proc.
    #[clap(long, env = PROCFS_ENV, value_name = "DIR")]
    pub procfs_path: Option<PathBuf>,

    /// Read system information from this directory instead of /sys.
    #[clap(long, env = SYSFS_ENV, value_name = "DIR")]
    pub sysfs_path: Option<PathBuf>,

    /// Log at trace level.
    #[clap(short, long, env = "TRACER_VERBOSE")]
    pub verbose: bool,
}

impl Config {
    pub fn overrides(&self) -> RootOverrides {
        RootOverrides {
            procfs: self.procfs_path.clone(),
            sysfs: self.sysfs_path.clone(),
        }
    }

    /// Where process information is read from.
    pub fn procfs(&self) -> PathBuf {
        self.procfs_path.clone().unwrap_or_else(|| PathBuf::from("/proc"))
    }

    /// The overrides as environment, for child processes.
    pub fn env(&self) -> Vec<(&'static str, PathBuf)> {
        [(PROCFS_ENV, &self.procfs_path), (SYSFS_ENV, &self.sysfs_path)]
            .into_iter()
            .filter_map(|(key, value)| Some((key, value.clone()?)))
            .collect()
    }
}
