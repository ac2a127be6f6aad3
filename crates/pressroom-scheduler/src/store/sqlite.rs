//! SQLite-backed store.
//!
//! One database file holds schedules, the content and destination catalog,
//! webhook subscriptions and the webhook delivery log. Timestamps are stored as
//! fixed-width RFC 3339 strings (microseconds, `Z`) so that string comparison
//! in SQL matches time order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use tracing::info;

use pressroom_publishers::{Content, Destination};
use pressroom_webhooks::{
    DeliveryLog, DeliveryStatus, SubscriptionSource, WebhookDelivery, WebhookError, WebhookEvent,
    WebhookSubscription,
};

use super::{Catalog, ScheduleStore};
use crate::{Schedule, ScheduleStatus, ScheduleUpdate, StatusCounts, StoreError};

const SCHEDULE_COLUMNS: &str = "id, content_id, campaign_id, destination_id, publish_at, status, \
     attempts, last_attempt_at, error, published_at, published_url, next_attempt_at, claim_id, \
     claimed_at, created_at, updated_at";

const DELIVERY_COLUMNS: &str =
    "id, webhook_id, event, payload, status, status_code, response, attempts, created_at, delivered_at";

/// SQLite-backed schedule store and catalog.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // Enable WAL mode so several processes can poll one file
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "schedule database initialized");
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                content_id TEXT NOT NULL,
                campaign_id TEXT,
                destination_id TEXT NOT NULL,
                publish_at TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                error TEXT,
                published_at TEXT,
                published_url TEXT,
                next_attempt_at TEXT,
                claim_id TEXT,
                claimed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules(status, publish_at);
            CREATE INDEX IF NOT EXISTS idx_schedules_updated ON schedules(updated_at);

            CREATE TABLE IF NOT EXISTS contents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                campaign_id TEXT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                excerpt TEXT,
                canonical_url TEXT,
                tags TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS destinations (
                id TEXT PRIMARY KEY,
                platform TEXT NOT NULL,
                config TEXT NOT NULL DEFAULT '{}',
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS webhook_subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                url TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                events TEXT NOT NULL DEFAULT '[]',
                secret TEXT,
                retry_count INTEGER NOT NULL DEFAULT 3,
                retry_delay_ms INTEGER NOT NULL DEFAULT 1000
            );
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON webhook_subscriptions(user_id);

            CREATE TABLE IF NOT EXISTS webhook_deliveries (
                id TEXT PRIMARY KEY,
                webhook_id TEXT NOT NULL,
                event TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                status_code INTEGER,
                response TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                delivered_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_deliveries_created ON webhook_deliveries(created_at);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // =========================================================================
    // Catalog writes (used by imports; the scheduler only reads)
    // =========================================================================

    pub fn upsert_content(&self, content: &Content) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&content.tags)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO contents
             (id, user_id, campaign_id, title, body, excerpt, canonical_url, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                content.id,
                content.user_id,
                content.campaign_id,
                content.title,
                content.body,
                content.excerpt,
                content.canonical_url,
                tags,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_destination(&self, destination: &Destination) -> Result<(), StoreError> {
        let config = serde_json::to_string(&destination.config)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO destinations (id, platform, config, active)
             VALUES (?1, ?2, ?3, ?4)",
            params![destination.id, destination.platform, config, destination.active],
        )?;
        Ok(())
    }

    pub fn upsert_subscription(&self, subscription: &WebhookSubscription) -> Result<(), StoreError> {
        let events = serde_json::to_string(&subscription.events)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO webhook_subscriptions
             (id, user_id, url, enabled, events, secret, retry_count, retry_delay_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                subscription.id,
                subscription.user_id,
                subscription.url,
                subscription.enabled,
                events,
                subscription.secret,
                subscription.retry_count,
                subscription.retry_delay_ms as i64,
            ],
        )?;
        Ok(())
    }

    fn query_schedules(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Schedule>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, schedule_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl ScheduleStore for SqliteStore {
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO schedules ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            SCHEDULE_COLUMNS
        );
        self.conn()?.execute(
            &sql,
            params![
                schedule.id,
                schedule.content_id,
                schedule.campaign_id,
                schedule.destination_id,
                ts(schedule.publish_at),
                schedule.status.as_str(),
                schedule.attempts,
                schedule.last_attempt_at.map(ts),
                schedule.error,
                schedule.published_at.map(ts),
                schedule.published_url,
                schedule.next_attempt_at.map(ts),
                schedule.claim_id,
                schedule.claimed_at.map(ts),
                ts(schedule.created_at),
                ts(schedule.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Schedule>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM schedules WHERE id = ?1", SCHEDULE_COLUMNS);
        let schedule = conn
            .query_row(&sql, params![id], schedule_from_row)
            .optional()?;
        Ok(schedule)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        let sql = format!(
            "SELECT {} FROM schedules
             WHERE status = ?1 AND publish_at <= ?2
               AND (next_attempt_at IS NULL OR next_attempt_at <= ?2)
             ORDER BY publish_at ASC, id ASC",
            SCHEDULE_COLUMNS
        );
        self.query_schedules(&sql, params![ScheduleStatus::Pending.as_str(), ts(now)])
    }

    async fn transition(
        &self,
        id: &str,
        from: ScheduleStatus,
        claim_id: Option<&str>,
        update: &ScheduleUpdate,
    ) -> Result<bool, StoreError> {
        let claim = update.claim.as_ref();
        let changed = self.conn()?.execute(
            "UPDATE schedules SET
                status = ?1,
                attempts = COALESCE(?2, attempts),
                last_attempt_at = COALESCE(?3, last_attempt_at),
                error = CASE WHEN ?4 THEN ?5 ELSE error END,
                published_at = COALESCE(?6, published_at),
                published_url = COALESCE(?7, published_url),
                next_attempt_at = CASE WHEN ?8 THEN ?9 ELSE next_attempt_at END,
                claim_id = CASE WHEN ?10 THEN ?11 ELSE claim_id END,
                claimed_at = CASE WHEN ?10 THEN ?12 ELSE claimed_at END,
                updated_at = ?13
             WHERE id = ?14 AND status = ?15 AND (?16 IS NULL OR claim_id = ?16)",
            params![
                update.status.as_str(),
                update.attempts,
                update.last_attempt_at.map(ts),
                update.error.is_some(),
                update.error.clone().flatten(),
                update.published_at.map(ts),
                update.published_url,
                update.next_attempt_at.is_some(),
                update.next_attempt_at.flatten().map(ts),
                claim.is_some(),
                claim.and_then(|c| c.as_ref()).map(|c| c.id.clone()),
                claim.and_then(|c| c.as_ref()).map(|c| ts(c.at)),
                ts(update.at),
                id,
                from.as_str(),
                claim_id,
            ],
        )?;
        Ok(changed == 1)
    }

    async fn find_stuck(&self, claimed_before: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        let sql = format!(
            "SELECT {} FROM schedules
             WHERE status = ?1 AND (claimed_at IS NULL OR claimed_at < ?2)",
            SCHEDULE_COLUMNS
        );
        self.query_schedules(
            &sql,
            params![ScheduleStatus::Publishing.as_str(), ts(claimed_before)],
        )
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM schedules GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            counts.add(status.parse()?, n.max(0) as u64);
        }
        Ok(counts)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Schedule>, StoreError> {
        let sql = format!(
            "SELECT {} FROM schedules ORDER BY updated_at DESC LIMIT ?1",
            SCHEDULE_COLUMNS
        );
        self.query_schedules(&sql, params![limit as i64])
    }
}

#[async_trait]
impl Catalog for SqliteStore {
    async fn content(&self, id: &str) -> Result<Option<Content>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, user_id, campaign_id, title, body, excerpt, canonical_url, tags
                 FROM contents WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        Content {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            campaign_id: row.get(2)?,
                            title: row.get(3)?,
                            body: row.get(4)?,
                            excerpt: row.get(5)?,
                            canonical_url: row.get(6)?,
                            tags: Vec::new(),
                        },
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((mut content, tags)) = row else {
            return Ok(None);
        };
        content.tags = serde_json::from_str(&tags)?;
        Ok(Some(content))
    }

    async fn destination(&self, id: &str) -> Result<Option<Destination>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, platform, config, active FROM destinations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, platform, config, active)) = row else {
            return Ok(None);
        };
        Ok(Some(Destination {
            id,
            platform,
            config: serde_json::from_str(&config)?,
            active,
        }))
    }
}

#[async_trait]
impl SubscriptionSource for SqliteStore {
    async fn subscriptions_for(&self, user_id: &str) -> Result<Vec<WebhookSubscription>, WebhookError> {
        self.load_subscriptions(user_id)
            .map_err(|e| WebhookError::Source(e.to_string()))
    }
}

#[async_trait]
impl DeliveryLog for SqliteStore {
    async fn record(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        self.write_delivery(delivery)
            .map_err(|e| WebhookError::Log(e.to_string()))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<WebhookDelivery>, WebhookError> {
        self.recent_deliveries(limit)
            .map_err(|e| WebhookError::Log(e.to_string()))
    }
}

impl SqliteStore {
    fn load_subscriptions(&self, user_id: &str) -> Result<Vec<WebhookSubscription>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, url, enabled, events, secret, retry_count, retry_delay_ms
             FROM webhook_subscriptions WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                WebhookSubscription {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    url: row.get(2)?,
                    enabled: row.get(3)?,
                    events: Vec::new(),
                    secret: row.get(5)?,
                    retry_count: row.get(6)?,
                    retry_delay_ms: row.get::<_, i64>(7)?.max(0) as u64,
                },
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut subscriptions = Vec::new();
        for row in rows {
            let (mut subscription, events) = row?;
            subscription.events = serde_json::from_str(&events)?;
            subscriptions.push(subscription);
        }
        Ok(subscriptions)
    }

    fn write_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO webhook_deliveries
             (id, webhook_id, event, payload, status, status_code, response, attempts, created_at, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                status_code = excluded.status_code,
                response = excluded.response,
                attempts = excluded.attempts,
                delivered_at = excluded.delivered_at",
            params![
                delivery.id,
                delivery.webhook_id,
                delivery.event.as_str(),
                delivery.payload,
                delivery.status.as_str(),
                delivery.status_code,
                delivery.response,
                delivery.attempts,
                ts(delivery.created_at),
                delivery.delivered_at.map(ts),
            ],
        )?;
        Ok(())
    }

    fn recent_deliveries(&self, limit: usize) -> Result<Vec<WebhookDelivery>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM webhook_deliveries ORDER BY created_at DESC LIMIT ?1",
            DELIVERY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], delivery_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    let status: String = row.get(5)?;
    Ok(Schedule {
        id: row.get(0)?,
        content_id: row.get(1)?,
        campaign_id: row.get(2)?,
        destination_id: row.get(3)?,
        publish_at: get_ts(row, 4)?,
        status: status.parse().map_err(|e| conversion_error(5, e))?,
        attempts: row.get(6)?,
        last_attempt_at: get_opt_ts(row, 7)?,
        error: row.get(8)?,
        published_at: get_opt_ts(row, 9)?,
        published_url: row.get(10)?,
        next_attempt_at: get_opt_ts(row, 11)?,
        claim_id: row.get(12)?,
        claimed_at: get_opt_ts(row, 13)?,
        created_at: get_ts(row, 14)?,
        updated_at: get_ts(row, 15)?,
    })
}

fn delivery_from_row(row: &Row<'_>) -> rusqlite::Result<WebhookDelivery> {
    let event: String = row.get(2)?;
    let status: String = row.get(4)?;
    Ok(WebhookDelivery {
        id: row.get(0)?,
        webhook_id: row.get(1)?,
        event: serde_json::from_value::<WebhookEvent>(Value::String(event))
            .map_err(|e| conversion_error(2, e))?,
        payload: row.get(3)?,
        status: serde_json::from_value::<DeliveryStatus>(Value::String(status))
            .map_err(|e| conversion_error(4, e))?,
        status_code: row.get(5)?,
        response: row.get(6)?,
        attempts: row.get(7)?,
        created_at: get_ts(row, 8)?,
        delivered_at: get_opt_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewSchedule;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn schedule_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let schedule = NewSchedule::now("c1", "d1").with_campaign("k1").into_schedule();
        store.insert(&schedule).await.unwrap();

        let loaded = store.get(&schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, schedule.id);
        assert_eq!(loaded.campaign_id.as_deref(), Some("k1"));
        assert_eq!(loaded.status, ScheduleStatus::Pending);
        assert_eq!(
            loaded.publish_at.timestamp_micros(),
            schedule.publish_at.timestamp_micros()
        );
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_due_skips_future_and_gated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let early = NewSchedule::at("c", "d", now - ChronoDuration::minutes(10)).into_schedule();
        let late = NewSchedule::at("c", "d", now - ChronoDuration::minutes(1)).into_schedule();
        let future = NewSchedule::at("c", "d", now + ChronoDuration::minutes(1)).into_schedule();
        let mut gated = NewSchedule::at("c", "d", now - ChronoDuration::minutes(20)).into_schedule();
        gated.next_attempt_at = Some(now + ChronoDuration::minutes(5));
        for s in [&late, &future, &gated, &early] {
            store.insert(s).await.unwrap();
        }

        let ids: Vec<String> = store
            .find_due(now)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn transition_is_conditional() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let schedule = NewSchedule::now("c", "d").into_schedule();
        store.insert(&schedule).await.unwrap();

        let claim = ScheduleUpdate::claim("tok", now);
        assert!(store.transition(&schedule.id, ScheduleStatus::Pending, None, &claim).await.unwrap());
        assert!(!store.transition(&schedule.id, ScheduleStatus::Pending, None, &claim).await.unwrap());

        let retry = ScheduleUpdate::retry_later(1, "timeout", Some(now + ChronoDuration::minutes(1)), now);
        assert!(!store
            .transition(&schedule.id, ScheduleStatus::Publishing, Some("other"), &retry)
            .await
            .unwrap());
        assert!(store
            .transition(&schedule.id, ScheduleStatus::Publishing, Some("tok"), &retry)
            .await
            .unwrap());

        let loaded = store.get(&schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Pending);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.error.as_deref(), Some("timeout"));
        assert!(loaded.claim_id.is_none());
        assert!(loaded.claimed_at.is_none());
        assert!(loaded.next_attempt_at.is_some());
    }

    #[tokio::test]
    async fn stuck_and_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let a = NewSchedule::now("c", "d").into_schedule();
        let b = NewSchedule::now("c", "d").into_schedule();
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let old = now - ChronoDuration::hours(1);
        store
            .transition(&a.id, ScheduleStatus::Pending, None, &ScheduleUpdate::claim("x", old))
            .await
            .unwrap();

        let stuck = store.find_stuck(now - ChronoDuration::minutes(15)).await.unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].id, a.id);

        let counts = store.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.publishing, 1);
        assert_eq!(counts.total, 2);
    }

    #[tokio::test]
    async fn catalog_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let content = Content {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            campaign_id: None,
            title: "Hello".to_string(),
            body: "Body".to_string(),
            excerpt: Some("Teaser".to_string()),
            canonical_url: None,
            tags: vec!["rust".to_string()],
        };
        let destination = Destination {
            id: "d1".to_string(),
            platform: "mastodon".to_string(),
            config: json!({"instanceUrl": "https://m.example", "accessToken": "t"}),
            active: false,
        };
        store.upsert_content(&content).unwrap();
        store.upsert_destination(&destination).unwrap();

        assert_eq!(store.content("c1").await.unwrap(), Some(content));
        assert_eq!(store.destination("d1").await.unwrap(), Some(destination));
        assert_eq!(store.destination("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscriptions_and_deliveries() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sub = WebhookSubscription::new(
            "w1",
            "u1",
            "https://hooks.example/x",
            vec![WebhookEvent::PublishFailed],
        )
        .with_secret("s3cret");
        store.upsert_subscription(&sub).unwrap();

        assert_eq!(store.subscriptions_for("u1").await.unwrap(), vec![sub.clone()]);
        assert!(store.subscriptions_for("u2").await.unwrap().is_empty());

        let mut delivery =
            WebhookDelivery::pending(&sub, WebhookEvent::PublishFailed, "{}".to_string());
        store.record(&delivery).await.unwrap();
        delivery.status = DeliveryStatus::Failed;
        delivery.status_code = Some(503);
        delivery.attempts = 3;
        store.record(&delivery).await.unwrap();

        let recent = DeliveryLog::recent(&store, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, DeliveryStatus::Failed);
        assert_eq!(recent[0].status_code, Some(503));
        assert_eq!(recent[0].attempts, 3);
    }
}
