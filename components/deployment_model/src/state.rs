// components/deployment_model/src/state.rs
//! Install state lattice and install step names

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a host is in the installation sequence
///
/// Forms a chain `new < prepared < installed < completed < validated`.
/// `broken` sits outside the chain: it satisfies nothing and nothing but an
/// operator reset leads out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    #[default]
    New,
    Prepared,
    Installed,
    Completed,
    Validated,
    Broken,
}

impl InstallState {
    /// Position on the progress chain, `None` for `broken`
    pub fn rank(&self) -> Option<u8> {
        match self {
            InstallState::New => Some(0),
            InstallState::Prepared => Some(1),
            InstallState::Installed => Some(2),
            InstallState::Completed => Some(3),
            InstallState::Validated => Some(4),
            InstallState::Broken => None,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, InstallState::Broken)
    }

    /// True if this state is at or past `target`
    pub fn satisfies(&self, target: InstallState) -> bool {
        match (self.rank(), target.rank()) {
            (Some(current), Some(wanted)) => current >= wanted,
            _ => false,
        }
    }

    /// Move forward to `target`, never backwards
    ///
    /// Broken is sticky, and advancing to broken always succeeds.
    pub fn advanced_to(self, target: InstallState) -> InstallState {
        if self.is_broken() || target.is_broken() {
            return InstallState::Broken;
        }
        if self.satisfies(target) {
            self
        } else {
            target
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallState::New => "new",
            InstallState::Prepared => "prepared",
            InstallState::Installed => "installed",
            InstallState::Completed => "completed",
            InstallState::Validated => "validated",
            InstallState::Broken => "broken",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered stage applied to a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStep {
    Prepare,
    Install,
    Configure,
    DefineHosts,
    PostDeploy,
    RunDiagnostics,
}

impl InstallStep {
    pub const ALL: [InstallStep; 6] = [
        InstallStep::Prepare,
        InstallStep::Install,
        InstallStep::Configure,
        InstallStep::DefineHosts,
        InstallStep::PostDeploy,
        InstallStep::RunDiagnostics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStep::Prepare => "prepare",
            InstallStep::Install => "install",
            InstallStep::Configure => "configure",
            InstallStep::DefineHosts => "define_hosts",
            InstallStep::PostDeploy => "post_deploy",
            InstallStep::RunDiagnostics => "run_diagnostics",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstallStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstallStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown install step '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(InstallState::New, InstallState::New, true)]
    #[case(InstallState::New, InstallState::Prepared, false)]
    #[case(InstallState::Completed, InstallState::Installed, true)]
    #[case(InstallState::Validated, InstallState::Completed, true)]
    #[case(InstallState::Installed, InstallState::Completed, false)]
    #[case(InstallState::Broken, InstallState::New, false)]
    #[case(InstallState::Completed, InstallState::Broken, false)]
    fn satisfies_follows_the_chain(
        #[case] state: InstallState,
        #[case] target: InstallState,
        #[case] expected: bool,
    ) {
        assert_eq!(state.satisfies(target), expected);
    }

    #[test]
    fn advancing_never_regresses() {
        assert_eq!(
            InstallState::Completed.advanced_to(InstallState::Prepared),
            InstallState::Completed
        );
        assert_eq!(
            InstallState::Prepared.advanced_to(InstallState::Installed),
            InstallState::Installed
        );
    }

    #[test]
    fn broken_is_sticky() {
        assert_eq!(
            InstallState::Broken.advanced_to(InstallState::Validated),
            InstallState::Broken
        );
        assert_eq!(
            InstallState::Installed.advanced_to(InstallState::Broken),
            InstallState::Broken
        );
    }

    #[test]
    fn step_names_round_trip() {
        for step in InstallStep::ALL {
            assert_eq!(step.as_str().parse::<InstallStep>().unwrap(), step);
        }
    }

    #[test]
    fn steps_are_ordered() {
        assert!(InstallStep::Prepare < InstallStep::Configure);
        assert!(InstallStep::PostDeploy < InstallStep::RunDiagnostics);
    }
}
