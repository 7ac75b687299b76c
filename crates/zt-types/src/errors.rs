use thiserror::Error;

/// Main error type for the zoomtune system
#[derive(Error, Debug)]
pub enum ZtError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trial log error: {0}")]
    Log(#[from] LogError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Domain error: input {value} is outside the rescaler range [{low}, {high}]")]
    Domain { value: f64, low: f64, high: f64 },

    #[error("Trainable error in run {run_id}: {message}")]
    Trainable { run_id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

/// Errors raised while turning declarations into rescalers or strategies.
/// Always fatal to the configuration that produced them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("The given parameter kind \"{kind}\" is not supported")]
    UnknownKind { kind: String },

    #[error("The given scaling \"{scaling}\" is not supported for kind {kind}")]
    UnknownScaling { kind: String, scaling: String },

    #[error("Parameter {name}: log scaling requires bounds {requirement}, got [{low}, {high}]")]
    InvalidLogBounds {
        name: String,
        low: f64,
        high: f64,
        requirement: &'static str,
    },

    #[error("Parameter {name}: increment must be positive and finite, got {increment}")]
    InvalidIncrement { name: String, increment: f64 },

    #[error("Parameter {name}: bounds must be finite, got [{low}, {high}]")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("Parameter {name}: integer bounds must be whole numbers, got [{low}, {high}]")]
    NonIntegralBounds { name: String, low: f64, high: f64 },

    #[error("Parameter {name}: discrete candidate list is empty")]
    EmptyCandidates { name: String },

    #[error("Parameter {name}: kind {kind} expects {expected}")]
    RangeMismatch {
        name: String,
        kind: String,
        expected: String,
    },

    #[error("Duplicate parameter name: {name}")]
    DuplicateName { name: String },

    #[error("{name} is not an existing search strategy")]
    UnknownStrategy { name: String },

    #[error("Exactly one search strategy must be selected, got {count}")]
    StrategyCount { count: usize },

    #[error("Invalid options for strategy {strategy}: {message}")]
    InvalidStrategyOptions { strategy: String, message: String },

    #[error("Trainable command is empty")]
    EmptyCommand,
}

/// Trial log errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogError {
    #[error("Sample width mismatch: expected {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Trial {idx} does not exist, log holds {rows} trials")]
    RowOutOfRange { idx: usize, rows: usize },

    #[error("Trial log is empty")]
    Empty,

    #[error("Score for trial {idx} was already recorded")]
    AlreadyScored { idx: usize },

    #[error("Parameter actual, unscaled, score and scored columns must have the same amount of entries: {actual}, {unscaled}, {scores}, {scored}")]
    LengthMismatch {
        actual: usize,
        unscaled: usize,
        scores: usize,
        scored: usize,
    },

    #[error("Score for trial {idx} must be finite, got {score}")]
    NonFiniteScore { idx: usize, score: f64 },

    #[error("Cannot select {requested} elite trials from {available} logged trials")]
    InsufficientTrials { requested: usize, available: usize },

    #[error("Trial log columns {found:?} do not match parameters {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Search strategy errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("No unique sample found after {attempts} draws; the search space looks exhausted")]
    Saturated { attempts: usize },

    #[error("Strategy has no parameters to sample")]
    EmptySpace,
}

/// Result type alias for zoomtune operations
pub type ZtResult<T> = Result<T, ZtError>;
