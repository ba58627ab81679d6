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

use crate::{Result, TracefsError};
use std::{
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

/// Every instance created by this crate starts with this prefix.
/// [crate::Instances::reset_all] only ever removes instances carrying it.
pub const INSTANCE_PREFIX: &str = "kube_";

/// The kernel keeps instance names short; generated names are always
/// exactly this long.
pub const MAX_INSTANCE_NAME_LEN: usize = 16;

pub const INSTANCE_SUFFIX_LEN: usize =
    MAX_INSTANCE_NAME_LEN - INSTANCE_PREFIX.len();

/// Name of a tracefs instance, i.e. the directory name under
/// `<tracing root>/instances`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceName(String);

impl InstanceName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        let invalid = |reason| TracefsError::InvalidInstanceName {
            name: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("must not be empty"));
        }

        if name.len() > MAX_INSTANCE_NAME_LEN {
            return Err(invalid("must be at most 16 bytes"));
        }

        if name == "." || name == ".." {
            return Err(invalid("must not be a relative path component"));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(
                "may only contain ascii letters, digits, '_', '-' and '.'",
            ));
        }

        Ok(Self(name))
    }

    /// A fresh name for an anonymous instance: [INSTANCE_PREFIX] followed by
    /// [INSTANCE_SUFFIX_LEN] random lowercase alphanumerics.
    pub fn random_owned() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{INSTANCE_PREFIX}{}", &suffix[..INSTANCE_SUFFIX_LEN]))
    }

    pub fn is_owned(&self) -> bool {
        Self::is_owned_name(&self.0)
    }

    pub fn is_owned_name(name: &str) -> bool {
        name.starts_with(INSTANCE_PREFIX)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for InstanceName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for InstanceName {
    type Err = TracefsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Display for InstanceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
