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

use crate::{Result, SessionError, StopSignal, TargetWatch, WakeReason};
use nix::unistd::Pid;
use std::{path::PathBuf, time::Duration};
use tracefs::{
    EventSet, Ftrace, Instance, InstanceName, Instances, TraceOption,
};
use tracing::{debug, info, warn};

/// Where a [Session] is in its lifetime.
///
/// ```text
/// Parsed -> Bound -> Armed -> Running -> Draining -> Done
///    \         \        \__________________/
///     `---------`--> Failed
/// ```
///
/// Once arming has begun a session always passes through `Draining`, also
/// when arming itself fails. Such a session ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Parsed,
    Bound,
    Armed,
    Running,
    Draining,
    Done,
    Failed,
}

/// What to trace and for how long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceRequest {
    pub pids: Vec<Pid>,
    pub parents: Vec<Pid>,
    /// Use or create this instance instead of an anonymous one.
    pub instance: Option<InstanceName>,
    /// Stop after this long. `None` or zero waits for a stop signal only.
    pub duration: Option<Duration>,
    /// Events enabled for the duration of the session.
    pub events: EventSet,
    /// Stop once every target and parent has exited, as seen through this
    /// procfs. `None` does not watch the targets.
    pub procfs: Option<PathBuf>,
}

impl TraceRequest {
    /// Target and parent pids in order, without duplicates.
    pub fn filter_pids(&self) -> Vec<Pid> {
        let mut pids = Vec::with_capacity(self.pids.len() + self.parents.len());
        for pid in self.pids.iter().chain(&self.parents) {
            if !pids.contains(pid) {
                pids.push(*pid);
            }
        }
        pids
    }

    fn deadline(&self) -> Option<Duration> {
        self.duration.filter(|duration| !duration.is_zero())
    }

    fn target_watch(&self) -> Option<TargetWatch> {
        let procfs = self.procfs.as_ref()?;
        Some(TargetWatch::new(procfs, self.filter_pids()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub instance: Instance,
    pub wake: WakeReason,
}

/// One trace run against one instance.
#[derive(Debug)]
pub struct Session<'a, F> {
    instances: &'a Instances<F>,
    request: TraceRequest,
    state: SessionState,
}

impl<'a, F: Ftrace> Session<'a, F> {
    pub fn new(instances: &'a Instances<F>, request: TraceRequest) -> Self {
        Self { instances, request, state: SessionState::Parsed }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &TraceRequest {
        &self.request
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs the session to completion.
    ///
    /// Setup errors up to binding an instance return right away. Anything
    /// later, including a failure to arm, first drains the instance: tracing
    /// is switched off, PID filters are cleared, fork following and the
    /// request's events are disabled.
    pub async fn execute(
        &mut self,
        stop: &mut StopSignal,
    ) -> Result<SessionReport> {
        if self.request.pids.is_empty() && self.request.parents.is_empty() {
            self.transition(SessionState::Failed);
            return Err(SessionError::MissingTarget);
        }

        let instance = match self.instances.bind(self.request.instance.as_ref())
        {
            Ok(instance) => instance,
            Err(source) => {
                self.transition(SessionState::Failed);
                return Err(SessionError::Bind { source });
            }
        };
        self.transition(SessionState::Bound);

        let outcome = self.trace(&instance, stop).await;

        self.transition(SessionState::Draining);
        let drained = self.drain(&instance);

        let result = match (outcome, drained) {
            (Ok(wake), Ok(())) => Ok(SessionReport { instance, wake }),
            (Err(e), _) => Err(e),
            (Ok(_), Err(source)) => Err(SessionError::Drain {
                instance: instance.name().to_string(),
                source,
            }),
        };

        self.transition(match result {
            Ok(_) => SessionState::Done,
            Err(_) => SessionState::Failed,
        });
        result
    }

    async fn trace(
        &mut self,
        instance: &Instance,
        stop: &mut StopSignal,
    ) -> Result<WakeReason> {
        let instances = self.instances;

        self.transition(SessionState::Armed);
        self.arm(instance).map_err(|source| SessionError::Arm {
            instance: instance.name().to_string(),
            source,
        })?;

        instances.ftrace().set_tracing_on(instance, true).map_err(
            |source| SessionError::Start {
                instance: instance.name().to_string(),
                source,
            },
        )?;
        self.transition(SessionState::Running);

        let deadline = self.request.deadline();
        info!(
            "tracing {:?} in instance {} ({})",
            self.request.filter_pids(),
            instance.name(),
            match deadline {
                Some(deadline) => format!("for {deadline:?}"),
                None => "until stopped".to_string(),
            }
        );

        let targets = self.request.target_watch();
        let wake = stop.wait(deadline, targets.as_ref()).await;
        info!("trace in instance {} ended: {wake}", instance.name());
        Ok(wake)
    }

    fn arm(&self, instance: &Instance) -> tracefs::Result<()> {
        let ftrace = self.instances.ftrace();
        let pids = self.request.filter_pids();

        ftrace.set_option(instance, TraceOption::EventFork, true)?;
        ftrace.set_option(instance, TraceOption::FunctionFork, true)?;
        ftrace.set_event_pids(instance, &pids)?;
        ftrace.set_function_pids(instance, &pids)?;
        if !self.request.events.is_empty() {
            ftrace.set_events(instance, &self.request.events, true)?;
        }

        Ok(())
    }

    /// Attempts every step, returning the first failure.
    fn drain(&self, instance: &Instance) -> tracefs::Result<()> {
        let ftrace = self.instances.ftrace();
        let events = &self.request.events;

        let steps = [
            ftrace.set_tracing_on(instance, false),
            ftrace.set_option(instance, TraceOption::EventFork, false),
            ftrace.set_option(instance, TraceOption::FunctionFork, false),
            ftrace.set_event_pids(instance, &[]),
            ftrace.set_function_pids(instance, &[]),
            if events.is_empty() {
                Ok(())
            } else {
                ftrace.set_events(instance, events, false)
            },
        ];

        let mut first = None;
        for result in steps {
            if let Err(e) = result {
                warn!("draining instance {}: {e}", instance.name());
                if first.is_none() {
                    first = Some(e);
                }
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop_channel;
    use simple_test_case::test_case;
    use std::time::Instant;
    use tracefs::testing::{Call, Op, RecordingFtrace};

    fn pids(raw: &[i32]) -> Vec<Pid> {
        raw.iter().copied().map(Pid::from_raw).collect()
    }

    fn request(raw: &[i32]) -> TraceRequest {
        TraceRequest {
            pids: pids(raw),
            duration: Some(Duration::from_millis(10)),
            ..Default::default()
        }
    }

    fn only_instance(ftrace: &RecordingFtrace) -> String {
        let names = ftrace.instance_names().expect("names");
        assert_eq!(names.len(), 1, "{names:?}");
        names.into_iter().next().expect("one instance")
    }

    #[test_case(&[12, 13], &[], &[12, 13]; "pids only")]
    #[test_case(&[], &[1], &[1]; "parents only")]
    #[test_case(&[12, 1], &[1, 7], &[12, 1, 7]; "union keeps first seen order")]
    #[test_case(&[5, 5], &[5], &[5]; "duplicates collapse")]
    fn filter_pids(targets: &[i32], parents: &[i32], expected: &[i32]) {
        let request = TraceRequest {
            pids: pids(targets),
            parents: pids(parents),
            ..Default::default()
        };
        assert_eq!(request.filter_pids(), pids(expected));
    }

    #[tokio::test]
    async fn missing_target_fails_without_creating_an_instance() {
        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, TraceRequest::default());

        let err = session.execute(&mut stop).await.expect_err("no target");

        assert!(matches!(err, SessionError::MissingTarget));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(instances.ftrace().create_calls(), 0);
        assert!(instances.ftrace().calls().is_empty());
    }

    #[tokio::test]
    async fn deadline_ends_the_session_and_clears_filters() {
        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, request(&[1234]));
        let start = Instant::now();

        let report = session.execute(&mut stop).await.expect("session");

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.wake, WakeReason::Deadline);
        assert_eq!(session.state(), SessionState::Done);
        let state = instances
            .ftrace()
            .instance(&only_instance(instances.ftrace()))
            .expect("instance");
        assert!(state.is_quiescent(), "{state:?}");
    }

    #[tokio::test]
    async fn signal_ends_the_session_and_clears_filters() {
        let instances = Instances::new(RecordingFtrace::new());
        let (trigger, mut stop) = stop_channel();
        let mut request = request(&[10]);
        request.duration = None;
        let mut session = Session::new(&instances, request);

        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.stop(nix::sys::signal::Signal::SIGUSR1);
        });
        let report = session.execute(&mut stop).await.expect("session");

        assert_eq!(
            report.wake,
            WakeReason::Signal(nix::sys::signal::Signal::SIGUSR1)
        );
        let state =
            instances.ftrace().instance(report.instance.name()).expect("state");
        assert!(state.is_quiescent(), "{state:?}");
    }

    #[tokio::test]
    async fn filters_cover_targets_and_parents_once() {
        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let mut request = request(&[5, 7]);
        request.parents = pids(&[7, 1]);
        request.events = tracefs::EventSet::all("syscalls");
        let mut session = Session::new(&instances, request);

        let report = session.execute(&mut stop).await.expect("session");

        let name = report.instance.name().to_string();
        let calls = instances.ftrace().calls();
        assert_eq!(
            calls[1..].to_vec(),
            vec![
                Call::SetOption(name.clone(), TraceOption::EventFork, true),
                Call::SetOption(name.clone(), TraceOption::FunctionFork, true),
                Call::SetEventPids(name.clone(), pids(&[5, 7, 1])),
                Call::SetFunctionPids(name.clone(), pids(&[5, 7, 1])),
                Call::SetEvents(
                    name.clone(),
                    tracefs::EventSet::all("syscalls"),
                    true
                ),
                Call::SetTracingOn(name.clone(), true),
                Call::SetTracingOn(name.clone(), false),
                Call::SetOption(name.clone(), TraceOption::EventFork, false),
                Call::SetOption(name.clone(), TraceOption::FunctionFork, false),
                Call::SetEventPids(name.clone(), vec![]),
                Call::SetFunctionPids(name.clone(), vec![]),
                Call::SetEvents(
                    name.clone(),
                    tracefs::EventSet::all("syscalls"),
                    false
                ),
            ]
        );
    }

    #[tokio::test]
    async fn arming_failure_still_drains() {
        let instances = Instances::new(RecordingFtrace::new());
        instances.ftrace().fail_once(Op::SetFunctionPids);
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, request(&[42]));

        let err = session.execute(&mut stop).await.expect_err("arm fails");

        assert!(matches!(err, SessionError::Arm { .. }), "{err}");
        assert_eq!(session.state(), SessionState::Failed);
        let name = only_instance(instances.ftrace());
        let state = instances.ftrace().instance(&name).expect("state");
        assert!(state.is_quiescent(), "{state:?}");
        assert!(!instances
            .ftrace()
            .calls()
            .contains(&Call::SetTracingOn(name, true)));
    }

    #[tokio::test]
    async fn start_failure_still_drains() {
        let instances = Instances::new(RecordingFtrace::new());
        instances.ftrace().fail_once(Op::SetTracingOn);
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, request(&[42]));

        let err = session.execute(&mut stop).await.expect_err("start fails");

        assert!(matches!(err, SessionError::Start { .. }), "{err}");
        let name = only_instance(instances.ftrace());
        let state = instances.ftrace().instance(&name).expect("state");
        assert!(state.is_quiescent(), "{state:?}");
    }

    #[tokio::test]
    async fn drain_attempts_every_step_and_reports_the_first_failure() {
        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, request(&[42]));
        // Fails arming, then the drain step that clears the same filter.
        instances.ftrace().fail_once(Op::SetEventPids);
        instances.ftrace().fail_once(Op::SetEventPids);

        let err = session.execute(&mut stop).await.expect_err("fails");
        assert!(matches!(err, SessionError::Arm { .. }), "{err}");

        let name = only_instance(instances.ftrace());
        let state = instances.ftrace().instance(&name).expect("state");
        assert!(!state.tracing_on);
        assert!(state.function_pids.is_empty());
        assert!(!state.option(TraceOption::FunctionFork));
        assert!(instances
            .ftrace()
            .calls()
            .ends_with(&[Call::SetFunctionPids(name, vec![])]));
    }

    #[tokio::test]
    async fn named_instance_is_reused() {
        let instances =
            Instances::new(RecordingFtrace::new().with_instance("shared"));
        let (_trigger, mut stop) = stop_channel();
        let mut request = request(&[1]);
        request.instance = Some(InstanceName::new("shared").expect("name"));
        let mut session = Session::new(&instances, request);

        let report = session.execute(&mut stop).await.expect("session");
        assert_eq!(&**report.instance.name(), "shared");
        assert_eq!(instances.ftrace().create_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_instances_fail_before_arming() {
        let instances = Instances::new(RecordingFtrace::new());
        instances.ftrace().fail_next_creates(tracefs::MAX_CREATE_ATTEMPTS);
        let (_trigger, mut stop) = stop_channel();
        let mut session = Session::new(&instances, request(&[1]));

        let err = session.execute(&mut stop).await.expect_err("exhausted");
        assert!(matches!(
            err,
            SessionError::Bind {
                source: tracefs::TracefsError::InstanceExhausted { .. }
            }
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn exited_targets_end_the_session_without_a_deadline() {
        let mut child =
            std::process::Command::new("true").spawn().expect("spawn true");
        let pid = i32::try_from(child.id()).expect("pid");
        let _ = child.wait().expect("wait");

        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let request = TraceRequest {
            pids: pids(&[pid]),
            procfs: Some("/proc".into()),
            ..Default::default()
        };
        let mut session = Session::new(&instances, request);

        let execute = session.execute(&mut stop);
        let report = tokio::time::timeout(Duration::from_secs(5), execute)
            .await
            .expect("session ended on its own")
            .expect("session");

        assert_eq!(report.wake, WakeReason::TargetsExited);
        assert_eq!(session.state(), SessionState::Done);
        let state = instances
            .ftrace()
            .instance(report.instance.name())
            .expect("state");
        assert!(state.is_quiescent(), "{state:?}");
    }

    #[tokio::test]
    async fn live_targets_keep_the_session_running() {
        let instances = Instances::new(RecordingFtrace::new());
        let (_trigger, mut stop) = stop_channel();
        let request = TraceRequest {
            pids: vec![Pid::this()],
            duration: Some(Duration::from_millis(300)),
            procfs: Some("/proc".into()),
            ..Default::default()
        };
        let mut session = Session::new(&instances, request);

        let report = session.execute(&mut stop).await.expect("session");
        assert_eq!(report.wake, WakeReason::Deadline);
    }
}
