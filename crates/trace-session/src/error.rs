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

use std::io;
use thiserror::Error;
use tracefs::TracefsError;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no target selected: pass at least one pid or parent pid")]
    MissingTarget,
    #[error("failed to bind a trace instance: {source}")]
    Bind { source: TracefsError },
    #[error("failed to arm trace instance '{instance}': {source}")]
    Arm { instance: String, source: TracefsError },
    #[error("failed to start tracing in instance '{instance}': {source}")]
    Start { instance: String, source: TracefsError },
    #[error("teardown of trace instance '{instance}' incomplete: {source}")]
    Drain { instance: String, source: TracefsError },
    #[error("failed to listen for stop signals: {source}")]
    Signal { source: io::Error },
}
