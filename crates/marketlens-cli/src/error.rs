use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] marketlens_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(#[from] marketlens_core::ConfigError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Config(_) => 7,
            Self::Io(_) => 10,
        }
    }
}

/// Exit code for a rendered envelope that carries errors.
pub const ENVELOPE_ERRORS_EXIT: u8 = 3;
