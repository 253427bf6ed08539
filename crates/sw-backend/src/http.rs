use std::time::Duration;

use reqwest::{Client, Response};

use crate::provider::ProviderError;

/// Build an HTTP client with appropriate timeouts and connection limits.
pub(crate) fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()
}

/// Turn a non-success response into [`ProviderError::Api`].
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api(format!("{status}: {body}")))
}
