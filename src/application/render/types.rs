use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::types::JobKind;

use super::service::{gotenberg::GotenbergError, pandoc::PandocError};

/// Input handed to a renderer for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub kind: JobKind,
    /// Markdown source as submitted.
    pub content: String,
    /// Display title; may be empty.
    pub title: String,
}

impl RenderRequest {
    pub fn new(kind: JobKind, content: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            title: title.into(),
        }
    }

    /// Title for document metadata, falling back to a neutral default.
    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            "Document"
        } else {
            trimmed
        }
    }
}

/// Bytes produced by a renderer together with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Bytes,
    pub content_type: String,
}

impl RenderedDocument {
    pub fn new(bytes: impl Into<Bytes>, kind: JobKind) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: kind.content_type().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error(transparent)]
    Gotenberg(#[from] GotenbergError),
    #[error(transparent)]
    Pandoc(#[from] PandocError),
}

impl RenderError {
    pub fn markdown(message: impl Into<String>) -> Self {
        Self::Markdown {
            message: message.into(),
        }
    }
}

/// The external collaborator that turns markdown into a finished document.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError>;
}
