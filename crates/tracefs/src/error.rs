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

use crate::InstanceName;
use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TracefsError>;

#[derive(Error, Debug)]
pub enum TracefsError {
    #[error("'{name}' is not a valid instance name: {reason}")]
    InvalidInstanceName { name: String, reason: &'static str },
    #[error("instance '{name}' already exists")]
    InstanceExists { name: InstanceName },
    #[error("instance '{name}' not found")]
    InstanceNotFound { name: String },
    #[error("instance '{name}' could not be created: {source}")]
    FailedToCreateInstance { name: InstanceName, source: io::Error },
    #[error("instance '{name}' could not be destroyed: {source}")]
    FailedToDestroyInstance { name: String, source: io::Error },
    #[error("no trace instance could be created after {} attempts", .attempts.len())]
    InstanceExhausted { attempts: Vec<TracefsError> },
    #[error("failed to write {value:?} to {}: {source}", .path.display())]
    FailedToWrite { path: PathBuf, value: String, source: io::Error },
    #[error("failed to read {}: {source}", .path.display())]
    FailedToRead { path: PathBuf, source: io::Error },
}

/// Mount resolution never aborts a session: callers log these and fall back
/// to [crate::TracingRoot::builtin_default].
#[derive(Error, Debug)]
pub enum MountError {
    #[error("failed to read mount table {}: {source}", .path.display())]
    ReadMountTable { path: PathBuf, source: io::Error },
    #[error("neither tracefs nor debugfs is mounted according to {}", .path.display())]
    NotMounted { path: PathBuf },
}
