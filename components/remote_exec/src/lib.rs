// components/remote_exec/src/lib.rs
//! Run a command on a managed machine
//!
//! A machine reached as `localhost` runs the command as a local subprocess,
//! anything else goes through `ssh`. There are no retries. Connection
//! trouble is reported as [`ExecError::Connection`], separate from a
//! command that ran and exited non-zero.

mod error;
mod params;
mod shell;

pub use error::ExecError;
pub use params::ParamBag;
pub use shell::{quote, ShellExecutor};

use async_trait::async_trait;

/// Where a command is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub ssh_target: String,
    pub user: String,
}

impl ExecTarget {
    pub fn new(ssh_target: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            ssh_target: ssh_target.into(),
            user: user.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.ssh_target == "localhost"
    }

    pub fn needs_sudo(&self) -> bool {
        self.user != "root"
    }

    /// `user@host` form used on the ssh command line
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.ssh_target)
    }
}

/// A command plus the parameters it runs with
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub command: String,
    pub params: ParamBag,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>, params: ParamBag) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }
}

/// Everything the command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Fails when remote execution is impossible before anything is tried
    async fn check_available(&self) -> Result<(), ExecError> {
        Ok(())
    }

    async fn execute(
        &self,
        target: &ExecTarget,
        request: &ExecRequest,
    ) -> Result<CommandOutput, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_root_users_need_sudo() {
        assert!(!ExecTarget::new("10.0.0.1", "root").needs_sudo());
        assert!(ExecTarget::new("10.0.0.1", "deploy").needs_sudo());
    }

    #[test]
    fn destination_joins_user_and_target() {
        let target = ExecTarget::new("node1.example.com", "admin");
        assert_eq!(target.destination(), "admin@node1.example.com");
        assert!(!target.is_local());
        assert!(ExecTarget::new("localhost", "root").is_local());
    }
}
