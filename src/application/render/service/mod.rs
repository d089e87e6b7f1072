mod config;
pub(crate) mod gotenberg;
mod markdown;
pub(crate) mod pandoc;

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use tracing::debug;

use crate::{
    application::render::types::{
        DocumentRenderer, RenderError, RenderRequest, RenderedDocument,
    },
    config::RenderSettings,
    domain::types::JobKind,
};

use self::{gotenberg::GotenbergClient, markdown::MarkdownRenderer, pandoc::PandocConverter};

pub use self::{gotenberg::GotenbergError, pandoc::PandocError};

/// Connection details for the external converters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gotenberg_url: Url,
    pub pandoc_path: PathBuf,
    pub http_timeout: Duration,
}

impl From<&RenderSettings> for EngineConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            gotenberg_url: settings.gotenberg_url.clone(),
            pandoc_path: settings.pandoc_path.clone(),
            http_timeout: settings.http_timeout,
        }
    }
}

/// Default renderer: HTML and LaTeX locally, PDF through Gotenberg, DOCX through pandoc.
pub struct ConversionEngine {
    markdown: MarkdownRenderer,
    gotenberg: GotenbergClient,
    pandoc: PandocConverter,
}

impl ConversionEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, RenderError> {
        Ok(Self {
            markdown: MarkdownRenderer::new(),
            gotenberg: GotenbergClient::new(&config.gotenberg_url, config.http_timeout)?,
            pandoc: PandocConverter::new(config.pandoc_path.clone()),
        })
    }
}

#[async_trait]
impl DocumentRenderer for ConversionEngine {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        debug!(
            target = "application::render::engine",
            op = "engine::render",
            kind = %request.kind,
            content_bytes = request.content.len(),
            "Dispatching render request"
        );

        let title = request.display_title();
        let bytes: Bytes = match request.kind {
            JobKind::Html => self
                .markdown
                .html_document(&request.content, title)?
                .into_bytes()
                .into(),
            JobKind::Latex => self
                .markdown
                .latex_document(&request.content, &request.title)
                .into_bytes()
                .into(),
            JobKind::Pdf => {
                let html = self.markdown.html_document(&request.content, title)?;
                self.gotenberg.html_to_pdf(html).await?
            }
            JobKind::Docx => {
                self.pandoc
                    .markdown_to_docx(&request.content, &request.title)
                    .await?
            }
        };

        Ok(RenderedDocument::new(bytes, request.kind))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn engine(gotenberg_url: &str) -> ConversionEngine {
        ConversionEngine::new(&EngineConfig {
            gotenberg_url: Url::parse(gotenberg_url).expect("url"),
            pandoc_path: PathBuf::from("/nonexistent/pandoc"),
            http_timeout: Duration::from_secs(5),
        })
        .expect("engine")
    }

    #[tokio::test]
    async fn html_is_rendered_locally() {
        let document = engine("http://127.0.0.1:9")
            .render(&RenderRequest::new(JobKind::Html, "# Hello", ""))
            .await
            .expect("html");
        assert_eq!(document.content_type, "text/html");
        let html = String::from_utf8(document.bytes.to_vec()).expect("utf8");
        assert!(html.contains("<title>Document</title>"));
        assert!(html.contains("<h1>Hello</h1>"));
    }

    #[tokio::test]
    async fn latex_is_rendered_locally() {
        let document = engine("http://127.0.0.1:9")
            .render(&RenderRequest::new(JobKind::Latex, "# Hello", "Notes"))
            .await
            .expect("latex");
        assert_eq!(document.content_type, "application/x-tex");
        let latex = String::from_utf8(document.bytes.to_vec()).expect("utf8");
        assert!(latex.contains("\\section{Hello}"));
    }

    #[tokio::test]
    async fn pdf_goes_through_gotenberg() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST").path("/forms/chromium/convert/html");
            then.status(200).body("%PDF-1.7 engine");
        });

        let document = engine(&server.base_url())
            .render(&RenderRequest::new(JobKind::Pdf, "# Hello", "Greeting"))
            .await
            .expect("pdf");

        mock.assert();
        assert_eq!(document.content_type, "application/pdf");
        assert_eq!(&document.bytes[..], b"%PDF-1.7 engine");
    }

    #[tokio::test]
    async fn docx_reports_missing_pandoc() {
        let err = engine("http://127.0.0.1:9")
            .render(&RenderRequest::new(JobKind::Docx, "# Hello", ""))
            .await
            .expect_err("pandoc is missing");
        assert!(matches!(err, RenderError::Pandoc(PandocError::NotFound(_))));
    }
}
