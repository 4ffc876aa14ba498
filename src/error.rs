//! Run-level error type.
//!
//! Only failures that stop a whole run end up here. Per-task fetch failures and
//! malformed provider records are carried as data by the fetch/reconcile stages.

/// Bad CLI input, missing credentials, local filesystem problems.
pub const EXIT_CONFIG: u8 = 2;
/// The provider refused our credentials.
pub const EXIT_AUTH: u8 = 3;
/// Provider or data problems (including a run that produced nothing).
pub const EXIT_DATA: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(EXIT_AUTH, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EXIT_DATA, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
