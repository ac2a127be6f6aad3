//! Mastodon adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{base_url, compose_status, parse_credentials};
use crate::error::check_response;
use crate::{ConnectionTest, Content, PlatformType, PublishError, PublishReceipt, Publisher};

/// Default status length limit on stock Mastodon instances.
pub const MASTODON_STATUS_LIMIT: usize = 500;

fn default_visibility() -> String {
    "public".to_string()
}

/// Credential blob for a Mastodon destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MastodonCredentials {
    /// Instance base URL, e.g. `https://mastodon.social`.
    #[serde(alias = "instance_url")]
    pub instance_url: String,
    #[serde(alias = "access_token")]
    pub access_token: String,
    /// public, unlisted, private, or direct.
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// Override for instances with a raised character limit.
    #[serde(default, alias = "character_limit")]
    pub character_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
    acct: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    url: Option<String>,
    uri: String,
}

/// Publishes content as a Mastodon status.
pub struct MastodonPublisher {
    http: Client,
    credentials: Option<MastodonCredentials>,
}

impl MastodonPublisher {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            credentials: None,
        }
    }

    async fn verify_credentials(&self, creds: &MastodonCredentials) -> Result<Account, PublishError> {
        let url = format!(
            "{}/api/v1/accounts/verify_credentials",
            base_url(&creds.instance_url)
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&creds.access_token)
            .send()
            .await?;
        let account: Account = check_response(response).await?.json().await?;
        debug!(account_id = %account.id, acct = %account.acct, "verified Mastodon credentials");
        Ok(account)
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn platform(&self) -> PlatformType {
        PlatformType::Mastodon
    }

    async fn authenticate(&mut self, credentials: &Value) -> Result<(), PublishError> {
        let creds: MastodonCredentials = parse_credentials(credentials)?;
        self.verify_credentials(&creds).await?;
        self.credentials = Some(creds);
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| PublishError::Authentication("not authenticated".to_string()))?;

        let limit = creds.character_limit.unwrap_or(MASTODON_STATUS_LIMIT);
        let text = compose_status(content, limit)?;

        let url = format!("{}/api/v1/statuses", base_url(&creds.instance_url));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&creds.access_token)
            // Retried attempts of the same content must not double-post.
            .header("Idempotency-Key", format!("pressroom-{}", content.id))
            .json(&json!({
                "status": text,
                "visibility": creds.visibility,
            }))
            .send()
            .await?;

        let status: Status = check_response(response).await?.json().await?;
        Ok(PublishReceipt {
            url: status.url.unwrap_or(status.uri),
            platform_post_id: status.id,
        })
    }

    async fn test_connection(&self, credentials: &Value) -> ConnectionTest {
        let result = match parse_credentials::<MastodonCredentials>(credentials) {
            Ok(creds) => self.verify_credentials(&creds).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(account) => ConnectionTest::ok(
                format!("connected as @{}", account.acct),
                json!({ "accountId": account.id, "acct": account.acct }),
            ),
            Err(e) => ConnectionTest::failed(&e),
        }
    }
}
