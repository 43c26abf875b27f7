//! Domain error types.

/// Top-level error type for alphalab.
#[derive(Debug, thiserror::Error)]
pub enum AlphaLabError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown engine: {name}")]
    UnknownEngine { name: String },

    #[error("unknown estimator: {name}")]
    UnknownEstimator { name: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: no reading from {bars} bars (needs at least {minimum})")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("output error: {reason}")]
    Output { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AlphaLabError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AlphaLabError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        AlphaLabError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&AlphaLabError> for std::process::ExitCode {
    fn from(err: &AlphaLabError) -> Self {
        let code: u8 = match err {
            AlphaLabError::Io(_) | AlphaLabError::Output { .. } => 1,
            AlphaLabError::ConfigParse { .. }
            | AlphaLabError::ConfigMissing { .. }
            | AlphaLabError::ConfigInvalid { .. } => 2,
            AlphaLabError::Data { .. } => 3,
            AlphaLabError::UnknownEngine { .. } | AlphaLabError::UnknownEstimator { .. } => 4,
            AlphaLabError::NoData { .. } | AlphaLabError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
