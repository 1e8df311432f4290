// src/api.rs

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest_eventsource::EventSource;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PlaygroundError, Result};
use crate::types::{ApiEnvelope, ChatCompletionResponse, GroupInfo};

pub const CHAT_COMPLETIONS_PATH: &str = "/pg/chat/completions";
pub const USER_MODELS_PATH: &str = "/api/user/models";
pub const USER_GROUPS_PATH: &str = "/api/user/self/groups";
pub const USER_ID_HEADER: &str = "new-api-user";

/// Thin client for the gateway endpoints the playground talks to.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: None,
            access_token: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(value) = self
            .user_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            headers.insert(USER_ID_HEADER, value);
        }
        if let Some(value) = self
            .access_token
            .as_deref()
            .and_then(|token| HeaderValue::from_str(&format!("Bearer {token}")).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Single-shot chat completion. Non-2xx responses become
    /// [`PlaygroundError::Api`] carrying the response body.
    pub async fn chat_completion(&self, payload: &Value) -> Result<(Value, ChatCompletionResponse)> {
        let response = self
            .http
            .post(self.url(CHAT_COMPLETIONS_PATH))
            .headers(self.headers())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response body".to_string());
            return Err(PlaygroundError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await?;
        let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())?;
        Ok((raw, parsed))
    }

    /// Opens a Server-Sent-Events stream with `payload` as the POST body.
    pub fn chat_stream(&self, payload: &Value) -> Result<EventSource> {
        let request = self
            .http
            .post(self.url(CHAT_COMPLETIONS_PATH))
            .headers(self.headers())
            .json(payload);

        EventSource::new(request).map_err(|e| PlaygroundError::StreamSetup(e.to_string()))
    }

    async fn get_envelope<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .headers(self.headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaygroundError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(PlaygroundError::Discovery(envelope.message)),
        }
    }

    pub async fn fetch_models(&self) -> Result<Vec<String>> {
        self.get_envelope(USER_MODELS_PATH).await
    }

    pub async fn fetch_groups(&self) -> Result<BTreeMap<String, GroupInfo>> {
        self.get_envelope(USER_GROUPS_PATH).await
    }
}
