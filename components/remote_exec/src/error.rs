use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    /// The command never ran: host unreachable or authentication rejected
    #[error("could not connect to {target}: {detail}")]
    Connection { target: String, detail: String },

    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command on {target} was terminated by a signal")]
    Terminated { target: String },

    #[error("the ssh client could not be found")]
    SshUnavailable,
}

impl ExecError {
    pub fn connection(target: impl Into<String>, detail: impl Into<String>) -> Self {
        ExecError::Connection {
            target: target.into(),
            detail: detail.into(),
        }
    }

    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        ExecError::Spawn {
            program: program.into(),
            source,
        }
    }

    /// True when nothing was executed on the target
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            ExecError::Connection { .. } | ExecError::Spawn { .. } | ExecError::SshUnavailable
        )
    }
}
