use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{jobs::QueueError, render::RenderError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{failed} of {total} conversion jobs did not complete")]
    JobsFailed { failed: usize, total: usize },
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

    /// The error message followed by every message in its source chain.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if messages.last() != Some(&message) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }

    /// Process exit code for the CLI: 2 for bad input, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_) | AppError::Domain(DomainError::Validation { .. }) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_walk_the_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AppError::from(InfraError::from(io));

        assert_eq!(
            err.messages(),
            vec!["io error: no such file".to_string(), "no such file".to_string()]
        );
    }

    #[test]
    fn validation_errors_exit_with_two() {
        assert_eq!(AppError::validation("bad kind").exit_code(), 2);
        assert_eq!(
            AppError::from(DomainError::validation("content is empty")).exit_code(),
            2
        );
        assert_eq!(AppError::unexpected("boom").exit_code(), 1);
        assert_eq!(
            AppError::JobsFailed {
                failed: 1,
                total: 2
            }
            .exit_code(),
            1
        );
    }
}
