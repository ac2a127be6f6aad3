//! Generic custom-endpoint adapter.
//!
//! POSTs the whole content as JSON. The endpoint may answer with
//! `{"url": ..., "id": ...}`; otherwise the canonical URL stands in.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use super::parse_credentials;
use crate::error::check_response;
use crate::{ConnectionTest, Content, PlatformType, PublishError, PublishReceipt, Publisher};

/// Credential blob for a custom endpoint destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCredentials {
    pub url: String,
    #[serde(default, alias = "bearer_token")]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointReply {
    url: Option<String>,
    id: Option<Value>,
}

/// Publishes content to an arbitrary HTTP endpoint.
pub struct WebhookPublisher {
    http: Client,
    credentials: Option<WebhookCredentials>,
}

impl WebhookPublisher {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            credentials: None,
        }
    }

    fn validate(creds: &WebhookCredentials) -> Result<Url, PublishError> {
        let url = Url::parse(&creds.url)
            .map_err(|e| PublishError::Authentication(format!("invalid endpoint URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(PublishError::Authentication(format!(
                "unsupported endpoint scheme: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    fn platform(&self) -> PlatformType {
        PlatformType::Webhook
    }

    async fn authenticate(&mut self, credentials: &Value) -> Result<(), PublishError> {
        let creds: WebhookCredentials = parse_credentials(credentials)?;
        Self::validate(&creds)?;
        self.credentials = Some(creds);
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| PublishError::Authentication("not authenticated".to_string()))?;

        let mut request = self.http.post(&creds.url).json(&json!({ "content": content }));
        if let Some(token) = &creds.bearer_token {
            request = request.bearer_auth(token);
        }
        for (name, value) in &creds.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = check_response(request.send().await?).await?;
        let text = response.text().await?;
        let reply: EndpointReply = serde_json::from_str(&text).unwrap_or_default();

        let url = reply
            .url
            .or_else(|| content.canonical_url.clone())
            .unwrap_or_else(|| creds.url.clone());
        let platform_post_id = match reply.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => content.id.clone(),
        };

        Ok(PublishReceipt {
            url,
            platform_post_id,
        })
    }

    async fn test_connection(&self, credentials: &Value) -> ConnectionTest {
        let creds = match parse_credentials::<WebhookCredentials>(credentials) {
            Ok(creds) => creds,
            Err(e) => return ConnectionTest::failed(&e),
        };
        let url = match Self::validate(&creds) {
            Ok(url) => url,
            Err(e) => return ConnectionTest::failed(&e),
        };

        // HEAD only: a connection check must not trigger a publish on the far side.
        match self.http.head(url.clone()).send().await {
            Ok(response) => ConnectionTest::ok(
                format!("endpoint reachable ({})", response.status()),
                json!({ "endpoint": url.as_str(), "status": response.status().as_u16() }),
            ),
            Err(e) => ConnectionTest::failed(&PublishError::from(e)),
        }
    }
}
