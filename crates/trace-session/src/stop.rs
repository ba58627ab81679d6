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

use crate::{Result, SessionError, TargetWatch};
use nix::sys::signal::Signal;
use std::{
    fmt::{Display, Formatter},
    time::Duration,
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};
use tracing::info;

/// Why a session stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Signal(Signal),
    Deadline,
    /// None of the traced processes is running anymore.
    TargetsExited,
    /// Every [StopTrigger] is gone without a stop being requested.
    Closed,
}

impl Display for WakeReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WakeReason::Signal(signal) => write!(f, "received {signal}"),
            WakeReason::Deadline => f.write_str("deadline reached"),
            WakeReason::TargetsExited => {
                f.write_str("traced processes exited")
            }
            WakeReason::Closed => f.write_str("stop source closed"),
        }
    }
}

/// Requests a stop from anywhere.
#[derive(Debug)]
pub struct StopTrigger {
    tx: watch::Sender<Option<Signal>>,
}

impl StopTrigger {
    pub fn stop(&self, signal: Signal) {
        let _ = self.tx.send(Some(signal));
    }
}

/// The waiting side of a stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<Option<Signal>>,
}

/// A connected [StopTrigger] and [StopSignal].
pub fn stop_channel() -> (StopTrigger, StopSignal) {
    let (tx, rx) = watch::channel(None);
    (StopTrigger { tx }, StopSignal { rx })
}

impl StopSignal {
    /// A stop signal fed by `SIGUSR1` and `SIGINT` delivered to this
    /// process. Must be called from within a tokio runtime.
    pub fn listen_for_os_signals() -> Result<Self> {
        let (trigger, stop) = stop_channel();

        let mut usr1 = signal(SignalKind::user_defined1())
            .map_err(|source| SessionError::Signal { source })?;
        let mut int = signal(SignalKind::interrupt())
            .map_err(|source| SessionError::Signal { source })?;

        let _signal_listener = tokio::spawn(async move {
            let signal = tokio::select! {
                _ = usr1.recv() => Signal::SIGUSR1,
                _ = int.recv() => Signal::SIGINT,
            };
            info!("received {signal}, stopping trace");
            trigger.stop(signal);
        });

        Ok(stop)
    }

    /// Blocks until a stop is requested, `deadline` has passed or every
    /// process in `targets` has exited. A `None` deadline or watch never
    /// fires.
    pub async fn wait(
        &mut self,
        deadline: Option<Duration>,
        targets: Option<&TargetWatch>,
    ) -> WakeReason {
        let sleep = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        let exited = async move {
            match targets {
                Some(targets) => targets.all_exited().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(sleep);
        tokio::pin!(exited);

        let requested = tokio::select! {
            requested = next_stop(&mut self.rx) => requested,
            _ = &mut sleep => return WakeReason::Deadline,
            _ = &mut exited => return WakeReason::TargetsExited,
        };

        match requested {
            Some(signal) => WakeReason::Signal(signal),
            None if deadline.is_none() && targets.is_none() => {
                WakeReason::Closed
            }
            None => tokio::select! {
                _ = sleep => WakeReason::Deadline,
                _ = exited => WakeReason::TargetsExited,
            },
        }
    }
}

/// Resolves to the requested stop, or `None` once the channel closed
/// without one.
async fn next_stop(rx: &mut watch::Receiver<Option<Signal>>) -> Option<Signal> {
    loop {
        if let Some(signal) = *rx.borrow_and_update() {
            return Some(signal);
        }
        if rx.changed().await.is_err() {
            return *rx.borrow();
        }
    }
}
