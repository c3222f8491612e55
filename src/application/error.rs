use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{import::ImportError, repos::StoreError},
    infra::{error::InfraError, snapshot::SnapshotError},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("translation `{key}` not found for language `{language}`")]
    MissingTranslation { key: String, language: String },
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

    /// Process exit code for the command line.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::MissingTranslation { .. } => 1,
            AppError::Validation(_) => 2,
            AppError::Infra(_)
            | AppError::Store(_)
            | AppError::Snapshot(_)
            | AppError::Import(_)
            | AppError::Unexpected(_) => 3,
        }
    }

    /// This error followed by every source in its chain.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}
