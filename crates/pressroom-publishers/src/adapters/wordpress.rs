//! WordPress adapter (REST API with application passwords).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{base_url, parse_credentials};
use crate::error::check_response;
use crate::{ConnectionTest, Content, PlatformType, PublishError, PublishReceipt, Publisher};

fn default_post_status() -> String {
    "publish".to_string()
}

/// Credential blob for a WordPress destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPressCredentials {
    #[serde(alias = "site_url")]
    pub site_url: String,
    pub username: String,
    #[serde(alias = "application_password")]
    pub application_password: String,
    /// Post status to create with: publish, draft, pending, private.
    #[serde(default = "default_post_status", alias = "post_status")]
    pub post_status: String,
}

impl WordPressCredentials {
    fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.application_password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/wp-json/wp/v2/{}", base_url(&self.site_url), route)
    }
}

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: u64,
    link: String,
}

/// Publishes content as a WordPress post.
pub struct WordPressPublisher {
    http: Client,
    credentials: Option<WordPressCredentials>,
}

impl WordPressPublisher {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            credentials: None,
        }
    }

    async fn current_user(&self, creds: &WordPressCredentials) -> Result<User, PublishError> {
        let response = self
            .http
            .get(creds.endpoint("users/me"))
            .header("Authorization", creds.authorization())
            .send()
            .await?;
        let user: User = check_response(response).await?.json().await?;
        debug!(user_id = user.id, name = %user.name, "verified WordPress credentials");
        Ok(user)
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    fn platform(&self) -> PlatformType {
        PlatformType::WordPress
    }

    async fn authenticate(&mut self, credentials: &Value) -> Result<(), PublishError> {
        let creds: WordPressCredentials = parse_credentials(credentials)?;
        self.current_user(&creds).await?;
        self.credentials = Some(creds);
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| PublishError::Authentication("not authenticated".to_string()))?;

        if content.title.trim().is_empty() {
            return Err(PublishError::Validation("post title is empty".to_string()));
        }

        let mut body = json!({
            "title": content.title,
            "content": content.body,
            "status": creds.post_status,
        });
        if let Some(excerpt) = &content.excerpt {
            body["excerpt"] = Value::String(excerpt.clone());
        }

        let response = self
            .http
            .post(creds.endpoint("posts"))
            .header("Authorization", creds.authorization())
            .json(&body)
            .send()
            .await?;

        let post: Post = check_response(response).await?.json().await?;
        Ok(PublishReceipt {
            url: post.link,
            platform_post_id: post.id.to_string(),
        })
    }

    async fn test_connection(&self, credentials: &Value) -> ConnectionTest {
        let result = match parse_credentials::<WordPressCredentials>(credentials) {
            Ok(creds) => self.current_user(&creds).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(user) => ConnectionTest::ok(
                format!("connected as {}", user.name),
                json!({ "userId": user.id, "name": user.name }),
            ),
            Err(e) => ConnectionTest::failed(&e),
        }
    }
}
