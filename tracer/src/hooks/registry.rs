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

use super::{HooksError, Result};
use std::{
    collections::HashSet,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File names of trace definitions start with this prefix.
pub const HOOK_PREFIX: &str = "trace_";

/// One executable trace definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub name: String,
    pub path: PathBuf,
}

/// The trace definitions found in one directory, scanned once.
///
/// `trace_syscalls`, `trace_syscalls.x86_64` and `trace_syscalls.aarch64`
/// all belong to the logical name `syscalls`.
#[derive(Debug, Clone)]
pub struct HookRegistry {
    dir: PathBuf,
    hooks: Vec<Hook>,
}

impl HookRegistry {
    /// Collects the executables in `dir` whose names carry [HOOK_PREFIX],
    /// sorted by file name.
    pub fn discover(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut hooks = Vec::new();

        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(HooksError::HooksDirUnreadable { dir, source });
                }
                Err(e) => {
                    warn!("skipping hook candidate: {e}");
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str().and_then(logical_name)
            else {
                continue;
            };

            if !entry.file_type().is_file() || !is_executable(entry.path()) {
                debug!("{} is not an executable file", entry.path().display());
                continue;
            }

            let name = name.to_string();
            hooks.push(Hook { name, path: entry.into_path() });
        }

        debug!("found {} hooks in {}", hooks.len(), dir.display());
        Ok(Self { dir, hooks })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Logical names in discovery order, each once.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.hooks
            .iter()
            .map(|hook| hook.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Every executable for `name`, which may carry [HOOK_PREFIX] or not.
    pub fn lookup(&self, name: &str) -> Result<Vec<&Path>> {
        let wanted = name.strip_prefix(HOOK_PREFIX).unwrap_or(name);
        let paths: Vec<&Path> = self
            .hooks
            .iter()
            .filter(|hook| hook.name == wanted)
            .map(|hook| hook.path.as_path())
            .collect();

        if paths.is_empty() {
            return Err(HooksError::HookNotFound { name: name.to_string() });
        }
        Ok(paths)
    }
}

/// `trace_syscalls.x86_64` -> `syscalls`
pub fn logical_name(file_name: &str) -> Option<&str> {
    let rest = file_name.strip_prefix(HOOK_PREFIX)?;
    let name = rest.split('.').next().unwrap_or(rest);
    (!name.is_empty()).then_some(name)
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
