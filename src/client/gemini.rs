//! Gemini-powered analysis client

use crate::client::{parse_extraction, AnalysisClient, ExtractionRequest};
use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::gemini::GeminiClient;
use crate::models::ExtractionData;
use crate::Result;
use async_trait::async_trait;
use tracing::warn;

pub struct GeminiAnalysisClient {
    client: GeminiClient,
}

impl GeminiAnalysisClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(config)?,
        })
    }

    pub fn requests_sent(&self) -> u64 {
        self.client.requests_sent()
    }
}

#[async_trait]
impl AnalysisClient for GeminiAnalysisClient {
    async fn analyze(&self, request: &ExtractionRequest) -> Result<ExtractionData> {
        if !self.client.has_credential() {
            return Err(AnalysisError::MissingCredential);
        }
        request.check()?;

        let text = self
            .client
            .generate_structured(
                &request.document,
                &request.prompt,
                request.schema.response_schema(),
            )
            .await?;

        parse_extraction(&text, &request.schema).map_err(|e| {
            warn!(
                digest = %request.document.digest,
                error = %e,
                "Gemini response rejected"
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::request;

    #[tokio::test]
    async fn test_missing_credential_makes_no_request() {
        let mut config = GeminiConfig::new("");
        config.base_url = "http://127.0.0.1:1".to_string();
        let client = GeminiAnalysisClient::new(config).unwrap();

        let err = client.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential));
        assert_eq!(client.requests_sent(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_makes_no_request() {
        let mut config = GeminiConfig::new("key");
        config.base_url = "http://127.0.0.1:1".to_string();
        let client = GeminiAnalysisClient::new(config).unwrap();

        let mut req = request();
        req.document.data_base64.clear();
        assert!(matches!(
            client.analyze(&req).await,
            Err(AnalysisError::ValidationFailure(_))
        ));
        assert_eq!(client.requests_sent(), 0);
    }
}
