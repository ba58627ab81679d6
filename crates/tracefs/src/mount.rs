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

use crate::MountError;
use once_cell::sync::OnceCell;
use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufRead, BufReader},
    os::unix::ffi::OsStringExt,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Environment variable naming the directory procfs is read from.
pub const PROCFS_ENV: &str = "TRACER_PROCFS_PATH";
/// Environment variable naming the directory sysfs is read from.
pub const SYSFS_ENV: &str = "TRACER_SYSFS_PATH";

const DEFAULT_PROCFS: &str = "/proc";
const DEFAULT_SYSFS: &str = "/sys";
const NATIVE_DEFAULT: &str = "/sys/kernel/tracing";
const LEGACY_DEFAULT: &str = "/sys/kernel/debug/tracing";

static GLOBAL_ROOT: OnceCell<TracingRoot> = OnceCell::new();

/// Alternative roots for the process and system information filesystems,
/// used when the tracer runs in a mount namespace that does not see the
/// host's `/proc` and `/sys` at their usual place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootOverrides {
    pub procfs: Option<PathBuf>,
    pub sysfs: Option<PathBuf>,
}

impl RootOverrides {
    pub fn is_empty(&self) -> bool {
        self.procfs.is_none() && self.sysfs.is_none()
    }

    fn mount_table(&self) -> PathBuf {
        self.procfs
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PROCFS))
            .join("mounts")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    /// A native `tracefs` mount.
    Tracefs,
    /// The `tracing` directory of a `debugfs` mount.
    Debugfs,
    /// Nothing was resolved; the well known location is assumed.
    Default,
}

/// Where the kernel tracing filesystem lives for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingRoot {
    path: PathBuf,
    kind: FsKind,
}

impl TracingRoot {
    pub fn new(path: impl Into<PathBuf>, kind: FsKind) -> Self {
        Self { path: path.into(), kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FsKind {
        self.kind
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.path.join("instances")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.path.join("events")
    }

    /// Resolves the tracing root, falling back to [Self::builtin_default]
    /// when the mount table cannot be used.
    ///
    /// Without any override the mount table is not consulted at all.
    pub fn resolve(overrides: &RootOverrides) -> Self {
        if overrides.is_empty() {
            return Self::builtin_default();
        }

        match Self::try_resolve(overrides) {
            Ok(root) => {
                debug!(
                    "tracing root resolved to {} ({:?})",
                    root.path.display(),
                    root.kind
                );
                root
            }
            Err(e) => {
                let root = Self::builtin_default();
                warn!("{e}, falling back to {}", root.path.display());
                root
            }
        }
    }

    /// Resolves the tracing root from `<procfs>/mounts`.
    pub fn try_resolve(
        overrides: &RootOverrides,
    ) -> Result<Self, MountError> {
        let table = overrides.mount_table();
        let scan = File::open(&table)
            .map(BufReader::new)
            .and_then(scan_mount_table)
            .map_err(|source| MountError::ReadMountTable {
                path: table.clone(),
                source,
            })?;

        scan.select(overrides.sysfs.as_deref(), |path| path.is_dir())
            .ok_or(MountError::NotMounted { path: table })
    }

    /// `/sys/kernel/tracing` if it is a directory, else
    /// `/sys/kernel/debug/tracing` if that one is, else
    /// `/sys/kernel/tracing`.
    pub fn builtin_default() -> Self {
        let path = [NATIVE_DEFAULT, LEGACY_DEFAULT]
            .into_iter()
            .find(|candidate| Path::new(candidate).is_dir())
            .unwrap_or(NATIVE_DEFAULT);

        Self::new(path, FsKind::Default)
    }

    /// The root for this process, resolved on first use.
    pub fn global(overrides: &RootOverrides) -> &'static Self {
        GLOBAL_ROOT.get_or_init(|| Self::resolve(overrides))
    }
}

/// The tracing related entries of a mount table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountScan {
    /// Mount point of the first `tracefs` entry.
    pub tracefs: Option<PathBuf>,
    /// Mount point of the first `debugfs` entry.
    pub debugfs: Option<PathBuf>,
}

impl MountScan {
    /// Picks the tracing root out of the scan.
    ///
    /// A native mount always wins. A debugfs mount is only used when it
    /// has a `tracing` directory, checked with `is_dir`. Paths below `/sys`
    /// are moved below `sysfs` when given.
    pub fn select(
        &self,
        sysfs: Option<&Path>,
        is_dir: impl Fn(&Path) -> bool,
    ) -> Option<TracingRoot> {
        if let Some(tracefs) = &self.tracefs {
            return Some(TracingRoot::new(
                rebase(tracefs, sysfs),
                FsKind::Tracefs,
            ));
        }

        let tracing = rebase(&self.debugfs.as_ref()?.join("tracing"), sysfs);
        if is_dir(&tracing) {
            Some(TracingRoot::new(tracing, FsKind::Debugfs))
        } else {
            None
        }
    }
}

/// Scans a mount table in `/proc/mounts` format.
///
/// Stops at the first `tracefs` entry; a `debugfs` entry seen before it is
/// still reported.
pub fn scan_mount_table(reader: impl BufRead) -> io::Result<MountScan> {
    let mut scan = MountScan::default();

    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let (Some(_device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        match fs_type {
            "tracefs" => {
                scan.tracefs = Some(unescape(mount_point));
                break;
            }
            "debugfs" if scan.debugfs.is_none() => {
                scan.debugfs = Some(unescape(mount_point));
            }
            _ => {}
        }
    }

    Ok(scan)
}

fn rebase(path: &Path, sysfs: Option<&Path>) -> PathBuf {
    let Some(sysfs) = sysfs else {
        return path.to_path_buf();
    };

    match path.strip_prefix(DEFAULT_SYSFS) {
        Ok(rest) => sysfs.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Undoes the `\ooo` octal escaping the kernel applies to whitespace and
/// backslashes in mount points.
fn unescape(field: &str) -> PathBuf {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(value) = bytes
                .get(i + 1..i + 4)
                .and_then(|digits| std::str::from_utf8(digits).ok())
                .and_then(|digits| u8::from_str_radix(digits, 8).ok())
            {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    PathBuf::from(OsString::from_vec(out))
}
