use crate::{CommandOutput, ExecError, ExecRequest, ExecTarget, Executor};
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// ssh reserves this exit status for its own failures
const SSH_FAILURE_EXIT: i32 = 255;

/// Quote a value for safe use as one shell word
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Executes through `sh -c` locally and through the system ssh client otherwise
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    ssh_program: String,
    connect_timeout_secs: u64,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    fn command_line(target: &ExecTarget, request: &ExecRequest, redact: bool) -> String {
        let rendered = if redact {
            request.params.render_redacted(&request.command)
        } else {
            request.params.render(&request.command)
        };
        if target.needs_sudo() {
            format!("sudo {}", rendered)
        } else {
            rendered
        }
    }

    fn build(&self, target: &ExecTarget, line: String) -> (String, Command) {
        if target.is_local() {
            let mut command = Command::new("sh");
            command.arg("-c").arg(line);
            ("sh".to_string(), command)
        } else {
            let mut command = Command::new(&self.ssh_program);
            command
                .arg("-o")
                .arg("BatchMode=yes")
                .arg("-o")
                .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
                .arg(target.destination())
                .arg(line);
            (self.ssh_program.clone(), command)
        }
    }
}

fn interpret(target: &ExecTarget, output: Output) -> Result<CommandOutput, ExecError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code().ok_or_else(|| ExecError::Terminated {
        target: target.ssh_target.clone(),
    })?;

    if !target.is_local() && exit_code == SSH_FAILURE_EXIT {
        return Err(ExecError::connection(
            &target.ssh_target,
            stderr.trim().to_string(),
        ));
    }

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn check_available(&self) -> Result<(), ExecError> {
        which::which(&self.ssh_program)
            .map(|_| ())
            .map_err(|_| ExecError::SshUnavailable)
    }

    async fn execute(
        &self,
        target: &ExecTarget,
        request: &ExecRequest,
    ) -> Result<CommandOutput, ExecError> {
        debug!(
            "Running on {}: {}",
            target.ssh_target,
            Self::command_line(target, request, true)
        );
        let (program, mut command) = self.build(target, Self::command_line(target, request, false));
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::spawn(program, e))?;

        let result = interpret(target, output)?;
        debug!("{} exited with {}", target.ssh_target, result.exit_code);
        Ok(result)
    }
}
