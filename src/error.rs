use std::error::Error;
use std::fmt;
use std::io;
use std::net::AddrParseError;

use crate::config::parser::ConfigError;

/// Failures that abort startup or stop the event loop. Per-connection
/// problems never surface here; they are answered with error responses.
#[derive(Debug)]
pub enum FatalError {
    Config(ConfigError),
    Io(io::Error),
    BadAddress(AddrParseError),
    Startup(String),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::Config(e) => write!(f, "{}", e),
            FatalError::Io(e) => write!(f, "{}", e),
            FatalError::BadAddress(e) => write!(f, "invalid listen address: {}", e),
            FatalError::Startup(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for FatalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FatalError::Config(e) => Some(e),
            FatalError::Io(e) => Some(e),
            FatalError::BadAddress(e) => Some(e),
            FatalError::Startup(_) => None,
        }
    }
}

impl From<ConfigError> for FatalError {
    fn from(e: ConfigError) -> Self {
        FatalError::Config(e)
    }
}

impl From<io::Error> for FatalError {
    fn from(e: io::Error) -> Self {
        FatalError::Io(e)
    }
}

impl From<AddrParseError> for FatalError {
    fn from(e: AddrParseError) -> Self {
        FatalError::BadAddress(e)
    }
}

impl From<String> for FatalError {
    fn from(msg: String) -> Self {
        FatalError::Startup(msg)
    }
}

impl From<&str> for FatalError {
    fn from(msg: &str) -> Self {
        FatalError::Startup(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FatalError>;
