use thiserror::Error;

/// Which half of the zero-cross wait gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossPhase {
    /// Waiting for the sample to fall below the midpoint.
    Falling,
    /// Waiting for the sample to rise back above the midpoint.
    Rising,
}

impl core::fmt::Display for CrossPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CrossPhase::Falling => f.write_str("falling"),
            CrossPhase::Rising => f.write_str("rising"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeldError {
    #[error("zero-cross timeout waiting for {phase} half; mains signal absent or midpoint drifted")]
    ZeroCrossTimeout { phase: CrossPhase },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing switch")]
    MissingSwitch,
    #[error("missing sample source")]
    MissingSampler,
    #[error("missing power meter")]
    MissingMeter,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
