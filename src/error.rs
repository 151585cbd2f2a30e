use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse subtitle file: {0}")]
    Parse(String),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Invalid oracle response: {0}")]
    OracleResponseInvalid(String),

    #[error("Assembly invariant violated: {0}")]
    AssemblyInvariantViolation(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist output file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl SplitError {
    /// Oracle failures are retried per batch; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SplitError::OracleUnavailable(_) | SplitError::OracleResponseInvalid(_)
        )
    }

    /// Errors caused by the input file rather than the engine.
    pub fn is_input_invalid(&self) -> bool {
        matches!(
            self,
            SplitError::FileNotFound(_) | SplitError::UnsupportedFormat(_) | SplitError::Parse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
