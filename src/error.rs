use std::process::ExitCode;

/// Errors that cause gtd to exit with a specific code.
///
/// The health-check and redispatch commands have a documented exit-code
/// contract (scripted drivers branch on it), so every failure that is not an
/// explicit outcome code maps to exit 1.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit {code}): {message}")]
    ToolFailed {
        tool: String,
        code: i32,
        message: String,
    },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("deacon is paused{}", fmt_reason(.reason))]
    Paused { reason: String },

    /// Outcome code for a result already reported on stdout. main() exits
    /// with the code without printing an error line.
    #[error("exit status {code}")]
    Status { code: u8 },
}

impl ExitError {
    pub const fn status(code: u8) -> Self {
        Self::Status { code }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Status { code } => ExitCode::from(*code),
            Self::Config(_)
            | Self::ToolNotFound { .. }
            | Self::ToolFailed { .. }
            | Self::Timeout { .. }
            | Self::Paused { .. } => ExitCode::FAILURE,
        }
    }

    /// True for the silent outcome variant (already reported on stdout).
    pub const fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

fn fmt_reason(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {reason}")
    }
}
