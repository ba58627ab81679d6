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

use crate::{
    Ftrace, Instance, InstanceName, Result, TracefsError, TracingRoot,
};
use tracing::{debug, info, warn};

/// How many random names [Instances::create_anonymous] tries.
pub const MAX_CREATE_ATTEMPTS: usize = 10;

/// Outcome of [Instances::reset_all].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// Creates, looks up and removes trace instances.
///
/// Instances are the only state shared between sessions, and nothing here
/// takes a lock: concurrent sessions stay apart because every anonymous
/// instance gets a fresh random name.
#[derive(Debug)]
pub struct Instances<F> {
    ftrace: F,
}

impl<F: Ftrace> Instances<F> {
    pub fn new(ftrace: F) -> Self {
        Self { ftrace }
    }

    pub fn ftrace(&self) -> &F {
        &self.ftrace
    }

    pub fn root(&self) -> &TracingRoot {
        self.ftrace.root()
    }

    /// Creates an instance under a generated name.
    ///
    /// Every failure, a name collision or anything else, consumes one of
    /// [MAX_CREATE_ATTEMPTS] attempts. All of them are handed back in
    /// [TracefsError::InstanceExhausted] when none succeeds.
    pub fn create_anonymous(&self) -> Result<Instance> {
        let mut attempts = Vec::with_capacity(MAX_CREATE_ATTEMPTS);

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let name = InstanceName::random_owned();
            match self.ftrace.create_instance(&name) {
                Ok(instance) => {
                    info!("created trace instance {name}");
                    return Ok(instance);
                }
                Err(e) => {
                    warn!(
                        "creating a trace instance failed \
                         (attempt {attempt}/{MAX_CREATE_ATTEMPTS}): {e}"
                    );
                    attempts.push(e);
                }
            }
        }

        Err(TracefsError::InstanceExhausted { attempts })
    }

    /// Returns the instance called `name`, creating it with tracing off if
    /// it does not exist yet.
    pub fn find_or_create(&self, name: &InstanceName) -> Result<Instance> {
        if let Some(instance) = self.ftrace.find_instance(name)? {
            debug!("using existing trace instance {name}");
            return Ok(instance);
        }

        match self.ftrace.create_instance(name) {
            Ok(instance) => {
                info!("created trace instance {name}");
                Ok(instance)
            }
            // Somebody else created it between lookup and creation.
            Err(TracefsError::InstanceExists { .. }) => self
                .ftrace
                .find_instance(name)?
                .ok_or_else(|| TracefsError::InstanceNotFound {
                    name: name.to_string(),
                }),
            Err(e) => Err(e),
        }
    }

    /// [Self::find_or_create] for `Some` name, else [Self::create_anonymous].
    pub fn bind(&self, name: Option<&InstanceName>) -> Result<Instance> {
        match name {
            Some(name) => self.find_or_create(name),
            None => self.create_anonymous(),
        }
    }

    pub fn destroy(&self, name: &str) -> Result<()> {
        self.ftrace.destroy_instance(name)?;
        info!("removed trace instance {name}");
        Ok(())
    }

    /// Names of the live instances created by this crate.
    pub fn list_owned(&self) -> Result<Vec<String>> {
        let mut names = self.ftrace.instance_names()?;
        names.retain(|name| InstanceName::is_owned_name(name));
        Ok(names)
    }

    /// Removes every instance created by this crate, leaving all others
    /// alone.
    ///
    /// Removal is best effort: an instance still in use by a running
    /// session cannot be removed and is reported in
    /// [ResetReport::failed] instead of stopping the reset. Only failing to
    /// list instances at all is an error.
    pub fn reset_all(&self) -> Result<ResetReport> {
        let mut report = ResetReport::default();

        for name in self.list_owned()? {
            match self.ftrace.destroy_instance(&name) {
                Ok(()) => {
                    debug!("removed trace instance {name}");
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!("{e}");
                    report.failed.push(name);
                }
            }
        }

        info!(
            "removed {} trace instances, {} could not be removed",
            report.removed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
