use stampede_core::ConfigError;
use std::any::Any;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A single iteration that ended abnormally. Logged, never propagated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IterationError {
    #[error("Iteration panicked: {0}")]
    Panicked(String),
}

impl IterationError {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        };
        IterationError::Panicked(msg)
    }
}
