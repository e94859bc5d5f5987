//! HTTP transport for the GitHub Markdown "raw" endpoint.
//!
//! The response is flattened back into a CGI-style blob (`Status:` line,
//! header lines, blank line, body) and handed to the render pipeline, which
//! applies its own header rules to it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderName},
};
use url::Url;

use crate::{
    application::render::{MarkdownRemote, RemoteError},
    config::RemoteSettings,
};

use super::error::InfraError;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/x-markdown";

// HTTP/2 delivers header names lowercased; these are restored to the
// spelling the server documents.
const CANONICAL_HEADER_NAMES: &[&str] = &[
    "X-RateLimit-Limit",
    "X-RateLimit-Remaining",
    "X-RateLimit-Reset",
    "X-RateLimit-Used",
    "X-RateLimit-Resource",
    "X-GitHub-Request-Id",
    "X-GitHub-Media-Type",
    "ETag",
    "WWW-Authenticate",
];

#[derive(Clone)]
enum Credentials {
    Anonymous,
    Basic { username: String, token: String },
    Bearer { token: String },
}

impl Credentials {
    fn from_settings(settings: &RemoteSettings) -> Self {
        match (&settings.username, &settings.token) {
            (Some(username), Some(token)) => Credentials::Basic {
                username: username.clone(),
                token: token.clone(),
            },
            (None, Some(token)) => Credentials::Bearer {
                token: token.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }
}

/// Posts Markdown source to the configured endpoint.
pub struct GitHubMarkdownClient {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    timeout: Duration,
}

impl GitHubMarkdownClient {
    pub fn new(settings: &RemoteSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(format!("failed to build client: {err}")))?;

        Ok(Self {
            client,
            endpoint: settings.api_url.clone(),
            credentials: Credentials::from_settings(settings),
            timeout: settings.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::transport(err.to_string())
        }
    }
}

#[async_trait]
impl MarkdownRemote for GitHubMarkdownClient {
    async fn render_raw(&self, source: Bytes) -> Result<Bytes, RemoteError> {
        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)
            .body(source);

        let request = match &self.credentials {
            Credentials::Anonymous => request,
            Credentials::Basic { username, token } => request.basic_auth(username, Some(token)),
            Credentials::Bearer { token } => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| self.classify(err))?;

        Ok(raw_response(status, &headers, &body))
    }
}

/// Serialise a response as `Status: <code> <reason>`, header lines, a blank line, then the body.
pub fn raw_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Bytes {
    let mut raw = BytesMut::with_capacity(body.len() + 64 * (headers.len() + 1));

    raw.put_slice(b"Status: ");
    raw.put_slice(status.as_str().as_bytes());
    if let Some(reason) = status.canonical_reason() {
        raw.put_u8(b' ');
        raw.put_slice(reason.as_bytes());
    }
    raw.put_slice(b"\r\n");

    for (name, value) in headers {
        raw.put_slice(canonical_header_name(name).as_bytes());
        raw.put_slice(b": ");
        raw.put_slice(value.as_bytes());
        raw.put_slice(b"\r\n");
    }

    raw.put_slice(b"\r\n");
    raw.put_slice(body);
    raw.freeze()
}

fn canonical_header_name(name: &HeaderName) -> String {
    let name = name.as_str();
    if let Some(known) = CANONICAL_HEADER_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
    {
        return (*known).to_string();
    }

    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
