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

use std::collections::BTreeMap;

/// Trace events to switch on for an instance, grouped by subsystem
/// (the directory names under `events/`, e.g. `syscalls` or `sched`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSet(BTreeMap<String, Vec<String>>);

impl EventSet {
    /// Stands for every event of a subsystem.
    pub const ALL: &'static str = "all";

    pub fn new() -> Self {
        Self::default()
    }

    /// Every event of `system`.
    pub fn all(system: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.insert(system, Self::ALL);
        set
    }

    pub fn insert(
        &mut self,
        system: impl Into<String>,
        event: impl Into<String>,
    ) {
        let events = self.0.entry(system.into()).or_default();
        let event = event.into();
        if !events.contains(&event) {
            events.push(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(system, events)` pairs in subsystem order. A system whose events
    /// contain [EventSet::ALL] is to be toggled as a whole.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(system, events)| (system.as_str(), events.as_slice()))
    }

    pub fn covers_whole_system(events: &[String]) -> bool {
        events.iter().any(|e| e == Self::ALL)
    }
}
