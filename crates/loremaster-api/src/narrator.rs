//! HTTP client for the external narrator service.

use std::time::Duration;

use async_trait::async_trait;
use loremaster_resolution::domain::narrator::{
    Narration, NarrationRequest, Narrator, NarratorError,
};
use reqwest::Client;

use crate::error::AppError;

/// Posts the scene snapshot as JSON and decodes a `Narration` from the reply.
#[derive(Debug, Clone)]
pub struct HttpNarrator {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpNarrator {
    /// Creates a client for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("narrator client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Narrator for HttpNarrator {
    async fn narrate(&self, request: &NarrationRequest) -> Result<Narration, NarratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NarratorError::Rejected(format!("{status}: {detail}")));
        }

        response.json::<Narration>().await.map_err(|e| {
            if e.is_timeout() {
                NarratorError::Timeout(self.timeout)
            } else {
                NarratorError::Malformed(e.to_string())
            }
        })
    }
}

impl HttpNarrator {
    fn classify(&self, err: &reqwest::Error) -> NarratorError {
        if err.is_timeout() {
            NarratorError::Timeout(self.timeout)
        } else {
            NarratorError::Transport(err.to_string())
        }
    }
}

/// Stand-in used when no narrator endpoint is configured.
///
/// Every call fails as a transport error, so resolutions stay retryable
/// until an endpoint is provided.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredNarrator;

#[async_trait]
impl Narrator for UnconfiguredNarrator {
    async fn narrate(&self, _request: &NarrationRequest) -> Result<Narration, NarratorError> {
        Err(NarratorError::Transport("no narrator endpoint configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request() -> NarrationRequest {
        NarrationRequest {
            scene_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            scene_number: 1,
            attempt: 1,
            intro_text: "Rain on the rooftops.".into(),
            participants: vec![],
            actions: vec![],
            rolls: vec![],
        }
    }

    #[tokio::test]
    async fn test_unconfigured_narrator_fails_as_transport() {
        let result = UnconfiguredNarrator.narrate(&request()).await;

        assert!(matches!(result, Err(NarratorError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_transport_error() {
        // Arrange: port 9 on loopback is the discard port and is closed in CI.
        let narrator =
            HttpNarrator::new("http://127.0.0.1:9/narrate", Duration::from_secs(2)).unwrap();

        // Act
        let result = narrator.narrate(&request()).await;

        // Assert
        assert!(matches!(
            result,
            Err(NarratorError::Transport(_) | NarratorError::Timeout(_))
        ));
    }
}
