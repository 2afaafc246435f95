use crate::error::PipelineError;
use crate::source::ConnxtClient;
use serde::Deserialize;

/// CoNNXT access token; valid for about an hour, so one is taken per day run.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

pub trait TokenSource {
    async fn acquire_token(&self) -> Result<BearerToken, PipelineError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenSource for ConnxtClient {
    async fn acquire_token(&self) -> Result<BearerToken, PipelineError> {
        let url = format!("{}/connect/token", self.base_url());
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id()),
        ];
        let response = self
            .http()
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|err| PipelineError::Auth(err.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PipelineError::Auth(format!("{status} {text}")));
        }

        let payload: TokenResponse = serde_json::from_str(&text)
            .map_err(|err| PipelineError::Auth(format!("undecodable token response: {err}")))?;
        let token = payload
            .access_token
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PipelineError::Auth("no access token acquired".to_string()))?;

        tracing::info!("acquired CoNNXT access token");
        Ok(BearerToken::new(token))
    }
}
