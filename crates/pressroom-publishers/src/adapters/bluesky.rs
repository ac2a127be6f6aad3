//! Bluesky adapter (ATProto XRPC).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{base_url, compose_status, parse_credentials};
use crate::{ConnectionTest, Content, PlatformType, PublishError, PublishReceipt, Publisher};

/// Bluesky's post length limit (graphemes; approximated by chars).
pub const BLUESKY_POST_LIMIT: usize = 300;

const POST_COLLECTION: &str = "app.bsky.feed.post";

fn default_service() -> String {
    "https://bsky.social".to_string()
}

/// Credential blob for a Bluesky destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueskyCredentials {
    /// PDS URL.
    #[serde(default = "default_service")]
    pub service: String,
    /// Handle or DID.
    pub identifier: String,
    #[serde(alias = "app_password")]
    pub app_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    did: String,
    handle: String,
    access_jwt: String,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

/// Publishes content as a Bluesky post.
pub struct BlueskyPublisher {
    http: Client,
    service: String,
    session: Option<Session>,
}

impl BlueskyPublisher {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            service: default_service(),
            session: None,
        }
    }

    async fn create_session(&self, creds: &BlueskyCredentials) -> Result<Session, PublishError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            identifier: &'a str,
            password: &'a str,
        }

        let url = format!(
            "{}/xrpc/com.atproto.server.createSession",
            base_url(&creds.service)
        );

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                identifier: &creds.identifier,
                password: &creds.app_password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // createSession answers bad passwords with 401, bad identifiers with 400.
            if status.is_client_error() && status.as_u16() != 429 {
                return Err(PublishError::Authentication(format!(
                    "login failed ({}): {}",
                    status, text
                )));
            }
            return Err(PublishError::from_status(status, &text));
        }

        let session: Session = response.json().await?;
        debug!(did = %session.did, handle = %session.handle, "authenticated with PDS");
        Ok(session)
    }
}

/// Map an AT URI (`at://did/collection/rkey`) to a bsky.app permalink.
fn post_permalink(handle: &str, uri: &str) -> Result<String, PublishError> {
    let rkey = uri
        .strip_prefix("at://")
        .and_then(|rest| rest.rsplit('/').next())
        .filter(|rkey| !rkey.is_empty())
        .ok_or_else(|| PublishError::Permanent(format!("unexpected record URI: {}", uri)))?;
    Ok(format!("https://bsky.app/profile/{}/post/{}", handle, rkey))
}

fn is_token_error(body: &str) -> bool {
    body.contains("ExpiredToken") || body.contains("InvalidToken")
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    fn platform(&self) -> PlatformType {
        PlatformType::Bluesky
    }

    async fn authenticate(&mut self, credentials: &Value) -> Result<(), PublishError> {
        let creds: BlueskyCredentials = parse_credentials(credentials)?;
        let session = self.create_session(&creds).await?;
        self.service = creds.service;
        self.session = Some(session);
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<PublishReceipt, PublishError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| PublishError::Authentication("not authenticated".to_string()))?;

        let text = compose_status(content, BLUESKY_POST_LIMIT)?;
        let body = json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": {
                "$type": POST_COLLECTION,
                "text": text,
                "createdAt": Utc::now().to_rfc3339(),
            },
        });

        let url = format!("{}/xrpc/com.atproto.repo.createRecord", base_url(&self.service));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&session.access_jwt)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if is_token_error(&text) {
                return Err(PublishError::Authentication(text));
            }
            return Err(PublishError::from_status(status, &text));
        }

        let created: CreateRecordResponse = response.json().await?;
        let url = post_permalink(&session.handle, &created.uri)?;
        Ok(PublishReceipt {
            url,
            platform_post_id: created.uri,
        })
    }

    async fn test_connection(&self, credentials: &Value) -> ConnectionTest {
        let result = match parse_credentials::<BlueskyCredentials>(credentials) {
            Ok(creds) => self.create_session(&creds).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(session) => ConnectionTest::ok(
                format!("connected as @{}", session.handle),
                json!({ "did": session.did, "handle": session.handle }),
            ),
            Err(e) => ConnectionTest::failed(&e),
        }
    }
}
