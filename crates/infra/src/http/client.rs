use std::time::Duration;

use deskbot_domain::DeskbotError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// Thin HTTP client with configured timeout and default headers.
///
/// Deliberately performs no transport-level retries: the only automatic
/// recovery in the system is the single refresh-and-retry the booking
/// gateway runs on an authorization failure.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, DeskbotError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// # Errors
    /// Transport failures are mapped into `DeskbotError` by shape (timeout
    /// and connect errors become `Network`). Non-2xx statuses are NOT an
    /// error here; callers inspect the status themselves.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, DeskbotError> {
        let request = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            DeskbotError::from(infra)
        })?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                let infra: InfraError = err.into();
                Err(DeskbotError::from(infra))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30) }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpClient, DeskbotError> {
        let client =
            ReqwestClient::builder().timeout(self.timeout).no_proxy().build().map_err(|err| {
                let infra: InfraError = err.into();
                DeskbotError::from(infra)
            })?;

        Ok(HttpClient { client })
    }
}
