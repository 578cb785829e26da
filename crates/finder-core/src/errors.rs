use std::fmt;

/// Fatal configuration problem detected at startup. Mapped to a distinct
/// exit code by the CLI; never silently defaulted.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}
