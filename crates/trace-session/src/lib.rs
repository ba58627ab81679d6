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

//! One trace session: bind a trace instance, restrict it to a set of
//! processes, trace until told to stop, and leave the instance clean.
//!
//! Trace definitions are small executables built on this crate. They turn
//! their [TraceArgs] into a [TraceRequest], pick an [tracefs::EventSet] and
//! hand both to a [Session], which waits on a [StopSignal] and, optionally,
//! for its targets to exit ([TargetWatch]).

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

pub use args::{describe, TraceArgs};
pub use error::{Result, SessionError};
pub use session::{Session, SessionReport, SessionState, TraceRequest};
pub use stop::{stop_channel, StopSignal, StopTrigger, WakeReason};
pub use targets::{TargetWatch, POLL_INTERVAL};

mod args;
mod error;
mod session;
mod stop;
mod targets;
