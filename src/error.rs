use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to parse instruction: {0}")]
    ParseError(#[from] ParseError),

    #[error("Invariant violated: {0}")]
    InvariantFailure(#[from] InvariantFailure),

    #[error("Cache level {level} is out of range (hierarchy has {cache_count} levels)")]
    OutOfRange { level: u32, cache_count: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Report write error: {0}")]
    ReportError(#[from] csv::Error),
}

/// Errors raised while decoding instruction-file records.
/// These are recoverable during the load phase: the offending
/// record is reported and skipped.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("argument '{0}' is missing the '$' prefix")]
    MissingPrefix(String),

    #[error("argument '{0}' is not a decimal number")]
    NotDecimal(String),

    #[error("instruction stream ended inside a '{0}' record")]
    TruncatedRecord(&'static str),
}

/// Fatal protocol violations. Any of these terminates the run.
#[derive(Error, Debug)]
pub enum InvariantFailure {
    #[error("'con' issued twice")]
    Reconfigured,

    #[error("'{command}' issued before 'con'")]
    NotConfigured { command: &'static str },

    #[error("'{command}' issued for level {level} after 'inc'")]
    ReshapedAfterInit { command: &'static str, level: u32 },

    #[error("'inc' issued for level {level} before 'scd'")]
    InitBeforeDimension { level: u32 },

    #[error("cannot enqueue '{command}' once the system is initialized")]
    TaskAfterInit { command: &'static str },

    #[error("'{command}' issued after 'ins'")]
    ConfiguredAfterRun { command: &'static str },

    #[error("'ins' issued twice")]
    Reinitialized,

    #[error("system not ready: {0}")]
    SystemNotReady(String),

    #[error("policy number {0} is unrecognized (expected 1 or 2)")]
    UnknownPolicy(u32),

    #[error("at least 1 cache level is required")]
    NoCacheLevels,

    #[error("cache level {level}: {reason}")]
    BadGeometry { level: u32, reason: String },

    #[error("allocation failed again after evicting the LRU way")]
    AllocAfterEvict,

    #[error("trace indentation underflow")]
    TraceUnderflow,
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
