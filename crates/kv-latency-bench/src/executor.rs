// Numan Thabit 2025
//! Single-request HTTP execution against the measure endpoints.

use std::{error::Error as _, fmt::Write as _, time::Duration};

use anyhow::{Context, Result};
use reqwest::{header::AUTHORIZATION, redirect::Policy, Client, Response};
use thiserror::Error;
use url::Url;

/// Hard ceiling for one request, connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which measure endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Write,
    Read,
}

impl RequestKind {
    pub fn path(self) -> &'static str {
        match self {
            RequestKind::Write => "measure/put/",
            RequestKind::Read => "measure/get/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

/// Issues one request per call and hands back the raw response text.
#[allow(async_fn_in_trait)]
pub trait MeasureExecutor {
    async fn execute(&self, kind: RequestKind, token: &str) -> Result<String, RequestError>;
}

/// reqwest-backed executor; one client is shared by every request of a run.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    put_url: String,
    get_url: String,
}

impl HttpExecutor {
    pub fn new(base_url: &Url) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &Url, timeout: Duration) -> Result<Self> {
        // 3xx answers are returned as-is; following them would issue a second request.
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .tcp_nodelay(true)
            .build()
            .context("failed to construct measure client")?;
        Ok(Self {
            client,
            put_url: endpoint_url(base_url, RequestKind::Write),
            get_url: endpoint_url(base_url, RequestKind::Read),
        })
    }

    pub fn url_for(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Write => &self.put_url,
            RequestKind::Read => &self.get_url,
        }
    }
}

impl MeasureExecutor for HttpExecutor {
    async fn execute(&self, kind: RequestKind, token: &str) -> Result<String, RequestError> {
        // The service only accepts GET, writes included.
        let response = self
            .client
            .get(self.url_for(kind))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(classify)?;
        render_response(response).await
    }
}

/// Joins the base URL and the endpoint path for `kind`.
pub fn endpoint_url(base_url: &Url, kind: RequestKind) -> String {
    format!("{}/{}", base_url.as_str().trim_end_matches('/'), kind.path())
}

async fn render_response(response: Response) -> Result<String, RequestError> {
    let mut raw = String::new();
    let _ = write!(raw, "{:?} {}\r\n", response.version(), response.status());
    for (name, value) in response.headers() {
        let _ = write!(
            raw,
            "{}: {}\r\n",
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes())
        );
    }
    raw.push_str("\r\n");
    let body = response.text().await.map_err(classify)?;
    raw.push_str(&body);
    Ok(raw)
}

fn classify(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::Timeout;
    }
    let mut cause = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let _ = write!(cause, ": {inner}");
        source = inner.source();
    }
    RequestError::Transport(cause)
}
