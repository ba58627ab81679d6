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

use std::{io, path::PathBuf};
use thiserror::Error;
use tracefs::TracefsError;

pub type Result<T> = std::result::Result<T, HooksError>;

#[derive(Error, Debug)]
pub enum HooksError {
    #[error("hooks directory {} is unreadable: {source}", .dir.display())]
    HooksDirUnreadable { dir: PathBuf, source: walkdir::Error },
    #[error("no trace definition named '{name}'")]
    HookNotFound { name: String },
    #[error("failed to spawn {}: {source}", .path.display())]
    FailedToSpawn { path: PathBuf, source: io::Error },
    #[error("failed to wait for {}: {source}", .path.display())]
    FailedToWait { path: PathBuf, source: io::Error },
    #[error("failed to install signal handlers: {source}")]
    Signal { source: io::Error },
    #[error(transparent)]
    Instance(#[from] TracefsError),
    #[error("failed to announce the trace path: {source}")]
    Announce { source: io::Error },
}
