//! CLI error types.

use std::fmt;

use hypernode_market::MarketError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// The marketplace rejected the operation.
    Market(MarketError),
    /// Invalid configuration file.
    Config(String),
    /// Ledger snapshot could not be read or written.
    Ledger(String),
    /// Output formatting error.
    Format(String),
    /// Requested record does not exist.
    NotFound(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Ledger(msg) => write!(f, "ledger error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Market(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<MarketError> for CliError {
    fn from(err: MarketError) -> Self {
        Self::Market(err)
    }
}
