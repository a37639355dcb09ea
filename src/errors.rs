use std::fmt::Display;

#[derive(Debug)]
pub enum TryciError {
    IoError(std::io::Error),
    DirectoryWalking(walkdir::Error),
    Regex(regex::Error),
    Json(serde_json::Error),
    ConfigError(String),
    UserError(String),
    InvalidArgument(String),
    RuntimeError(String),
}

impl std::error::Error for TryciError {}

impl Display for TryciError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryciError::IoError(io_error) => write!(f, "{}", io_error),
            TryciError::DirectoryWalking(error) => write!(f, "{}", error),
            TryciError::Regex(error) => write!(f, "{}", error),
            TryciError::Json(error) => write!(f, "{}", error),
            TryciError::ConfigError(error) => write!(f, "Invalid configuration: {}", error),
            TryciError::UserError(error) => write!(f, "{}", error),
            TryciError::InvalidArgument(error) => write!(f, "{}", error),
            TryciError::RuntimeError(error) => write!(f, "{}", error),
        }
    }
}

impl From<std::io::Error> for TryciError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<walkdir::Error> for TryciError {
    fn from(value: walkdir::Error) -> Self {
        Self::DirectoryWalking(value)
    }
}

impl From<regex::Error> for TryciError {
    fn from(value: regex::Error) -> Self {
        Self::Regex(value)
    }
}

impl From<serde_json::Error> for TryciError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
