use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }
}

/// Configuration problems are the caller's fault; anything else happened while running.
impl From<loadprobe_core::Error> for RunError {
    fn from(err: loadprobe_core::Error) -> Self {
        use loadprobe_core::Error as CoreError;

        match err {
            CoreError::InvalidConcurrency
            | CoreError::InvalidRequests
            | CoreError::EmptyEndpoints
            | CoreError::InvalidWeights
            | CoreError::InvalidBaseUrl { .. }
            | CoreError::InvalidStages
            | CoreError::InvalidShape(_) => Self::InvalidInput(anyhow::Error::new(err)),
            CoreError::Join(_) => Self::RuntimeError(anyhow::Error::new(err)),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
