// components/install_steps/src/table.rs
use deployment_model::{InstallState, InstallStep, Role};
use std::collections::BTreeSet;

/// Which machines a step runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Every,
    Brokers,
    BrokersAndNodes,
}

impl Applicability {
    pub fn matches(&self, roles: &BTreeSet<Role>) -> bool {
        match self {
            Applicability::Every => true,
            Applicability::Brokers => roles.contains(&Role::Broker),
            Applicability::BrokersAndNodes => {
                roles.contains(&Role::Broker) || roles.contains(&Role::Node)
            }
        }
    }
}

/// Everything the controller needs to know about one step
#[derive(Debug)]
pub struct StepSpec {
    pub step: InstallStep,

    /// State a host must have reached before the step may run
    pub required_state: InstallState,

    /// State recorded once the step succeeds
    pub resulting_state: InstallState,

    /// Line the provisioner prints when the step really succeeded
    pub success_marker: &'static str,

    pub parallel: bool,

    pub applies_to: Applicability,

    /// A command failure here can be fixed by re-running the deployment
    pub command_failure_recoverable: bool,

    /// A failure stops the run
    pub fatal: bool,
}

impl StepSpec {
    pub fn applies(&self, roles: &BTreeSet<Role>) -> bool {
        self.applies_to.matches(roles)
    }

    /// The host may start this step
    pub fn precondition_met(&self, state: InstallState) -> bool {
        state.satisfies(self.required_state)
    }

    /// True if the step still has to run for a host
    ///
    /// `define_hosts` and `post_deploy` leave the primary state at
    /// `completed`, so for them the recorded progress decides.
    pub fn needs_work(&self, state: InstallState, progress: Option<InstallStep>) -> bool {
        if state.is_broken() {
            return false;
        }
        if !state.satisfies(self.resulting_state) {
            return true;
        }
        state == self.resulting_state
            && self.resulting_state == InstallState::Completed
            && effective_progress(state, progress).map_or(true, |done| done < self.step)
    }

    /// Some stdout line, ignoring trailing whitespace, is exactly the marker
    pub fn marker_present(&self, stdout: &str) -> bool {
        stdout
            .lines()
            .any(|line| line.trim_end() == self.success_marker)
    }
}

pub static STEPS: [StepSpec; 6] = [
    StepSpec {
        step: InstallStep::Prepare,
        required_state: InstallState::New,
        resulting_state: InstallState::Prepared,
        success_marker: "Host preparation complete.",
        parallel: true,
        applies_to: Applicability::Every,
        command_failure_recoverable: true,
        fatal: true,
    },
    StepSpec {
        step: InstallStep::Install,
        required_state: InstallState::Prepared,
        resulting_state: InstallState::Installed,
        success_marker: "Package installation complete.",
        parallel: true,
        applies_to: Applicability::Every,
        command_failure_recoverable: true,
        fatal: true,
    },
    StepSpec {
        step: InstallStep::Configure,
        required_state: InstallState::Installed,
        resulting_state: InstallState::Completed,
        success_marker: "Host configuration complete.",
        parallel: false,
        applies_to: Applicability::Every,
        command_failure_recoverable: false,
        fatal: true,
    },
    StepSpec {
        step: InstallStep::DefineHosts,
        required_state: InstallState::Completed,
        resulting_state: InstallState::Completed,
        success_marker: "Host definitions registered.",
        parallel: false,
        applies_to: Applicability::Brokers,
        command_failure_recoverable: true,
        fatal: true,
    },
    StepSpec {
        step: InstallStep::PostDeploy,
        required_state: InstallState::Completed,
        resulting_state: InstallState::Completed,
        success_marker: "Post-deployment tasks complete.",
        parallel: false,
        applies_to: Applicability::Brokers,
        command_failure_recoverable: true,
        fatal: true,
    },
    StepSpec {
        step: InstallStep::RunDiagnostics,
        required_state: InstallState::Completed,
        resulting_state: InstallState::Validated,
        success_marker: "Diagnostics passed.",
        parallel: false,
        applies_to: Applicability::BrokersAndNodes,
        command_failure_recoverable: true,
        fatal: false,
    },
];

pub fn spec(step: InstallStep) -> &'static StepSpec {
    // STEPS is laid out in step order
    &STEPS[step as usize]
}

/// Last step a host has done, derived from its state when none was recorded
pub fn effective_progress(state: InstallState, progress: Option<InstallStep>) -> Option<InstallStep> {
    let implied = match state {
        InstallState::New | InstallState::Broken => None,
        InstallState::Prepared => Some(InstallStep::Prepare),
        InstallState::Installed => Some(InstallStep::Install),
        InstallState::Completed => Some(InstallStep::Configure),
        InstallState::Validated => Some(InstallStep::RunDiagnostics),
    };
    match (progress, implied) {
        (Some(recorded), Some(implied)) => Some(recorded.max(implied)),
        (recorded, implied) => recorded.or(implied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn table_is_in_step_order() {
        for step in InstallStep::ALL {
            assert_eq!(spec(step).step, step);
        }
    }

    #[test]
    fn only_prepare_and_install_are_parallel() {
        let parallel: Vec<InstallStep> = STEPS.iter().filter(|s| s.parallel).map(|s| s.step).collect();
        assert_eq!(parallel, vec![InstallStep::Prepare, InstallStep::Install]);
    }

    #[rstest]
    #[case(InstallStep::Prepare, InstallState::New, None, true)]
    #[case(InstallStep::Prepare, InstallState::Prepared, None, false)]
    #[case(InstallStep::Install, InstallState::Completed, None, false)]
    #[case(InstallStep::Configure, InstallState::Installed, None, true)]
    #[case(InstallStep::DefineHosts, InstallState::Completed, None, true)]
    #[case(InstallStep::DefineHosts, InstallState::Completed, Some(InstallStep::DefineHosts), false)]
    #[case(InstallStep::PostDeploy, InstallState::Completed, Some(InstallStep::DefineHosts), true)]
    #[case(InstallStep::PostDeploy, InstallState::Validated, None, false)]
    #[case(InstallStep::RunDiagnostics, InstallState::Completed, Some(InstallStep::PostDeploy), true)]
    #[case(InstallStep::RunDiagnostics, InstallState::Validated, None, false)]
    #[case(InstallStep::Prepare, InstallState::Broken, None, false)]
    fn idempotent_skip(
        #[case] step: InstallStep,
        #[case] state: InstallState,
        #[case] progress: Option<InstallStep>,
        #[case] expected: bool,
    ) {
        assert_eq!(spec(step).needs_work(state, progress), expected);
    }

    #[rstest]
    #[case(InstallStep::Install, InstallState::New, false)]
    #[case(InstallStep::Install, InstallState::Prepared, true)]
    #[case(InstallStep::Configure, InstallState::Prepared, false)]
    #[case(InstallStep::RunDiagnostics, InstallState::Completed, true)]
    #[case(InstallStep::Prepare, InstallState::Broken, false)]
    fn preconditions(#[case] step: InstallStep, #[case] state: InstallState, #[case] expected: bool) {
        assert_eq!(spec(step).precondition_met(state), expected);
    }

    #[test]
    fn marker_must_match_a_whole_line() {
        let configure = spec(InstallStep::Configure);
        assert!(configure.marker_present("applying\nHost configuration complete.  \n"));
        assert!(!configure.marker_present("Host configuration complete. (with errors)\n"));
        assert!(!configure.marker_present(""));
    }

    #[test]
    fn applicability_by_role() {
        let broker: BTreeSet<Role> = [Role::Broker, Role::MsgServer].into_iter().collect();
        let node: BTreeSet<Role> = [Role::Node].into_iter().collect();
        let db: BTreeSet<Role> = [Role::DbServer].into_iter().collect();

        assert!(spec(InstallStep::DefineHosts).applies(&broker));
        assert!(!spec(InstallStep::PostDeploy).applies(&node));
        assert!(spec(InstallStep::RunDiagnostics).applies(&node));
        assert!(!spec(InstallStep::RunDiagnostics).applies(&db));
        assert!(spec(InstallStep::Configure).applies(&db));
    }

    #[test]
    fn progress_is_implied_by_state() {
        assert_eq!(effective_progress(InstallState::New, None), None);
        assert_eq!(
            effective_progress(InstallState::Completed, None),
            Some(InstallStep::Configure)
        );
        assert_eq!(
            effective_progress(InstallState::Completed, Some(InstallStep::PostDeploy)),
            Some(InstallStep::PostDeploy)
        );
        assert_eq!(
            effective_progress(InstallState::Validated, Some(InstallStep::DefineHosts)),
            Some(InstallStep::RunDiagnostics)
        );
    }
}
