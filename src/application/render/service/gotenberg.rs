use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{
    Client, Url,
    multipart::{Form, Part},
};
use thiserror::Error;
use tracing::{info, warn};

const CONVERT_HTML_PATH: &str = "forms/chromium/convert/html";
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum GotenbergError {
    #[error("invalid gotenberg URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("gotenberg request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gotenberg conversion failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gotenberg returned an empty document")]
    Empty,
}

/// Client for the Chromium HTML to PDF route of a Gotenberg server.
#[derive(Debug, Clone)]
pub struct GotenbergClient {
    client: Client,
    endpoint: Url,
}

impl GotenbergClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, GotenbergError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(CONVERT_HTML_PATH)?;
        let client = Client::builder()
            .user_agent(concat!("docflux/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Uploads `html` as `index.html` and returns the PDF bytes.
    pub async fn html_to_pdf(&self, html: String) -> Result<Bytes, GotenbergError> {
        let started_at = Instant::now();
        let html_bytes = html.len();
        let part = Part::text(html)
            .file_name("index.html")
            .mime_str("text/html")?;
        let form = Form::new().part("files", part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .inspect_err(|err| {
                warn!(
                    target = "application::render::gotenberg",
                    op = "gotenberg::html_to_pdf",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "send",
                    error = %err,
                    "Gotenberg request could not be sent"
                );
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            warn!(
                target = "application::render::gotenberg",
                op = "gotenberg::html_to_pdf",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                status = status.as_u16(),
                error_code = "status",
                "Gotenberg rejected the conversion"
            );
            return Err(GotenbergError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let pdf = response.bytes().await?;
        if pdf.is_empty() {
            return Err(GotenbergError::Empty);
        }

        info!(
            target = "application::render::gotenberg",
            op = "gotenberg::html_to_pdf",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            html_bytes,
            pdf_bytes = pdf.len(),
            "Gotenberg produced PDF"
        );
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn client(server: &MockServer) -> GotenbergClient {
        let base = Url::parse(&server.base_url()).expect("mock url");
        GotenbergClient::new(&base, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let base = Url::parse("http://gotenberg.local/proxy").expect("url");
        let client = GotenbergClient::new(&base, Duration::from_secs(1)).expect("client");
        assert_eq!(
            client.endpoint().as_str(),
            "http://gotenberg.local/proxy/forms/chromium/convert/html"
        );
    }

    #[tokio::test]
    async fn posts_index_html_and_returns_pdf() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/forms/chromium/convert/html")
                .header_exists("content-type");
            then.status(200)
                .header("content-type", "application/pdf")
                .body("%PDF-1.7 fake");
        });

        let pdf = client(&server)
            .html_to_pdf("<html><body><h1>Hello</h1></body></html>".to_string())
            .await
            .expect("pdf bytes");

        mock.assert();
        assert_eq!(&pdf[..], b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST");
            then.status(503).body("chromium unavailable");
        });

        let err = client(&server)
            .html_to_pdf("<p>x</p>".to_string())
            .await
            .expect_err("503 must fail");
        match err {
            GotenbergError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "chromium unavailable");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
