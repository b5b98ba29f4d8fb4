use miette::Diagnostic;
use thiserror::Error;

use crate::nav::errors::NavError;

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(gatehouse::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(gatehouse::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gatehouse::serde))]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Nav(#[from] NavError),

    #[error("Upstream client error: {0}")]
    #[diagnostic(code(gatehouse::upstream))]
    Upstream(String),

    #[error("{0}")]
    #[diagnostic(code(gatehouse::other))]
    Other(String),
}

impl From<reqwest::Error> for GateError {
    fn from(value: reqwest::Error) -> Self {
        GateError::Upstream(value.to_string())
    }
}
