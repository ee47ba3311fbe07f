use crate::config::HttpConfig;
use crate::error::TransportError;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Outbound request built by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Skip TLS certificate verification for this request
    pub insecure: bool,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Any HTTP response, successful status or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for sending provider requests over HTTP
///
/// Implementations return `Ok` for every response that was received,
/// whatever its status. Only failures to get a response at all are errors.
pub trait HttpTransport: Send + Sync {
    fn post<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;
}

/// reqwest-backed transport with a request timeout
pub struct ReqwestTransport {
    client: Client,
    insecure_client: Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ClientBuild` if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let build = |insecure: bool| {
            Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| TransportError::ClientBuild(e.to_string()))
        };

        Ok(Self {
            client: build(false)?,
            insecure_client: build(true)?,
        })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        Self::new(Duration::from_secs(config.timeout_seconds))
    }
}

impl HttpTransport for ReqwestTransport {
    fn post<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let client = if request.insecure {
                &self.insecure_client
            } else {
                &self.client
            };

            let mut builder = client.post(&request.url).body(request.body.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;

            Ok(HttpResponse::new(status, body.to_vec()))
        })
    }
}
