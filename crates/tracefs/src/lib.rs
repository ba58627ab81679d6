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

//! Access to the kernel tracing filesystem (tracefs).
//!
//! The tracing filesystem is a single, process-global kernel resource. This
//! crate lets many independent processes share it by carving it up into
//! named [Instance]s. Instances created here always carry the
//! [INSTANCE_PREFIX] so they can be told apart from instances owned by
//! anybody else, and bulk-removed with [Instances::reset_all].
//!
//! * [TracingRoot] resolves where tracefs is mounted.
//! * [Ftrace] is the capability interface over an instance: options, PID
//!   filters, events and the `tracing_on` switch.
//! * [TraceFs] implements [Ftrace] with plain file I/O against a
//!   [TracingRoot].
//! * [Instances] creates, finds and removes instances on top of any [Ftrace].

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
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
#![warn(clippy::unwrap_used)]

pub use error::{MountError, Result, TracefsError};
pub use events::EventSet;
pub use ftrace::{Ftrace, Instance, TraceOption};
pub use instance_name::{
    InstanceName, INSTANCE_PREFIX, INSTANCE_SUFFIX_LEN, MAX_INSTANCE_NAME_LEN,
};
pub use instances::{Instances, ResetReport, MAX_CREATE_ATTEMPTS};
pub use mount::{
    scan_mount_table, FsKind, MountScan, RootOverrides, TracingRoot,
    PROCFS_ENV, SYSFS_ENV,
};
pub use trace_fs::TraceFs;

mod error;
mod events;
mod ftrace;
mod instance_name;
mod instances;
mod mount;
mod trace_fs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
