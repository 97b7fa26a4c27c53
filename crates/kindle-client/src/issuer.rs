use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use kindle_crypto::keys::entropy_from_hex;
use kindle_types::api::IssuedEntropy;

use crate::error::ClientError;

/// Anything that can hand out one entropy value per call.
pub trait EntropyIssuer: Send + Sync {
    fn fetch_entropy(&self) -> impl Future<Output = Result<IssuedEntropy, ClientError>> + Send;
}

/// Issuer reached over HTTP at `GET {base_url}/entropy/fresh`.
pub struct HttpIssuer {
    client: Client,
    url: String,
    token: String,
}

impl HttpIssuer {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::EntropyUnavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/entropy/fresh", base_url.trim_end_matches('/')),
            token: token.into(),
        })
    }
}

impl EntropyIssuer for HttpIssuer {
    async fn fetch_entropy(&self) -> Result<IssuedEntropy, ClientError> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::EntropyUnavailable(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::EntropyUnavailable(format!("issuer returned {}", status)));
        }

        let issued: IssuedEntropy = resp
            .json()
            .await
            .map_err(|e| ClientError::EntropyUnavailable(format!("bad issuer response: {}", e)))?;

        entropy_from_hex(&issued.entropy_hex)
            .map_err(|e| ClientError::EntropyUnavailable(format!("unusable entropy from issuer: {}", e)))?;

        debug!("Fetched {} entropy from issuer", issued.source);
        Ok(issued)
    }
}
