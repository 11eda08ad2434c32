use std::error::Error as StdError;

use thiserror::Error;

use crate::{application::render::EmailError, infra::error::InfraError};

/// Error surfaced by the command-line entry points.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Messages of this error and every source below it, outermost first.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = StdError::source(self);
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_errors_keep_their_stage_message() {
        let error = AppError::from(EmailError::template_not_found("welcome"));
        assert!(error.to_string().starts_with("resolve_template:"));
    }

    #[test]
    fn messages_walk_the_source_chain() {
        let io = std::io::Error::other("disk gone");
        let error = AppError::from(InfraError::from(io));
        let messages = error.messages();
        assert_eq!(messages[0], "io error: disk gone");
        assert!(messages.len() >= 2);
    }
}
