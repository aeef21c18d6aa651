#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Invalid CLI/profile input (bad flags, invalid durations, bad base URL, unreadable profile).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, task failures).
    RuntimeError = 40,

    /// The run was interrupted by the user; a partial report was printed.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_run(interrupted: bool, thresholds_failed: bool) -> Self {
        match (interrupted, thresholds_failed) {
            (true, _) => Self::Interrupted,
            (false, true) => Self::ThresholdsFailed,
            (false, false) => Self::Success,
        }
    }
}
