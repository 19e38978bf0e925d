use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use readaloud_types::SynthesisInput;

use crate::error::SessionError;

/// Engine selector sent with every synthesis request.
pub const SYNTHESIS_ENGINE: &str = "edge";

/// Exchanges raw synthesis input for audio bytes. Non-success statuses and
/// transport failures are both terminal for the calling session; retry is
/// upstream policy.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SynthesisBackend: Send + Sync {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Bytes, SessionError>;
}

pub struct HttpSynthesisBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSynthesisBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SynthesisBackend for HttpSynthesisBackend {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Bytes, SessionError> {
        let mut body = serde_json::to_value(input)
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        if let Some(object) = body.as_object_mut() {
            object.insert(
                "engine".to_string(),
                serde_json::Value::String(SYNTHESIS_ENGINE.to_string()),
            );
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::BackendStatus(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))
    }
}
