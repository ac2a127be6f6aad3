//! Endpoint-specific payload shaping.
//!
//! Automation relays (Zapier, Make, n8n, Pipedream) map fields far more easily
//! from flat top-level keys than from nested objects, so payloads bound for
//! them additionally carry a flattened `parent_child` view.

use reqwest::Url;
use serde_json::{Map, Value};

use crate::WebhookPayload;

/// Hosts (and their subdomains) that get flattened payloads.
pub const KNOWN_RELAY_HOSTS: &[&str] = &[
    "zapier.com",
    "make.com",
    "integromat.com",
    "n8n.cloud",
    "pipedream.net",
];

/// Turns a payload into the JSON body sent to a particular endpoint.
pub trait PayloadFormatter: Send + Sync {
    fn format(&self, endpoint: &str, payload: &WebhookPayload) -> Value;
}

/// Sends the payload exactly as modelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormatter;

impl PayloadFormatter for StandardFormatter {
    fn format(&self, _endpoint: &str, payload: &WebhookPayload) -> Value {
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }
}

/// Adds a flattened key view for endpoints on known relay hosts.
#[derive(Debug, Clone)]
pub struct RelayFormatter {
    relay_hosts: Vec<String>,
}

impl Default for RelayFormatter {
    fn default() -> Self {
        Self {
            relay_hosts: KNOWN_RELAY_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl RelayFormatter {
    pub fn new(relay_hosts: Vec<String>) -> Self {
        Self { relay_hosts }
    }

    /// Whether `endpoint` belongs to a relay that prefers flat payloads.
    pub fn prefers_flat(&self, endpoint: &str) -> bool {
        let Ok(url) = Url::parse(endpoint) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.relay_hosts
            .iter()
            .any(|relay| host == *relay || host.ends_with(&format!(".{}", relay)))
    }
}

impl PayloadFormatter for RelayFormatter {
    fn format(&self, endpoint: &str, payload: &WebhookPayload) -> Value {
        let mut value = StandardFormatter.format(endpoint, payload);
        if !self.prefers_flat(endpoint) {
            return value;
        }

        let mut flat = Map::new();
        for section in ["data", "metadata"] {
            if let Some(nested) = value.get(section) {
                flatten_into(section, nested, &mut flat);
            }
        }

        if let Value::Object(ref mut map) = value {
            for (key, field) in flat {
                map.entry(key).or_insert(field);
            }
        }
        value
    }
}

/// Flatten `value` into `out` using `_`-joined keys under `prefix`.
///
/// Arrays of scalars become a comma-separated string; arrays containing
/// objects are indexed (`tags_0`, `tags_1`).
pub fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{}_{}", prefix, key), nested, out);
            }
        }
        Value::Array(items) if items.iter().all(is_scalar) => {
            let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(",");
            out.insert(prefix.to_string(), Value::String(joined));
        }
        Value::Array(items) => {
            for (idx, nested) in items.iter().enumerate() {
                flatten_into(&format!("{}_{}", prefix, idx), nested, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventData, EventMetadata, WebhookEvent};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn payload() -> WebhookPayload {
        WebhookPayload {
            event: WebhookEvent::PublishSuccess,
            timestamp: "2026-03-01T12:00:00Z".parse().unwrap(),
            data: EventData::new("s1", "schedule")
                .field("publishedUrl", "https://bsky.app/profile/a/post/b")
                .field("tags", json!(["rust", "cms"]))
                .field("destination", json!({ "id": "d1", "platform": "bluesky" })),
            metadata: EventMetadata {
                user_id: Some("u1".to_string()),
                platform: Some("bluesky".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn relay_hosts_match_subdomains_only() {
        let formatter = RelayFormatter::default();
        assert!(formatter.prefers_flat("https://hooks.zapier.com/hooks/catch/1/abc"));
        assert!(formatter.prefers_flat("https://hook.eu1.make.com/xyz"));
        assert!(formatter.prefers_flat("https://ZAPIER.com/x"));
        assert!(!formatter.prefers_flat("https://notzapier.com/hook"));
        assert!(!formatter.prefers_flat("https://example.com/zapier.com"));
        assert!(!formatter.prefers_flat("not a url"));
    }

    #[test]
    fn standard_endpoints_get_nested_payload() {
        let value = RelayFormatter::default().format("https://example.com/hook", &payload());
        assert!(value.get("data_id").is_none());
        assert_eq!(value["data"]["destination"]["platform"], "bluesky");
    }

    #[test]
    fn relay_endpoints_get_flat_view() {
        let value = RelayFormatter::default().format("https://hooks.zapier.com/x", &payload());

        assert_eq!(value["data_id"], "s1");
        assert_eq!(value["data_type"], "schedule");
        assert_eq!(value["data_tags"], "rust,cms");
        assert_eq!(value["data_destination_platform"], "bluesky");
        assert_eq!(value["metadata_userId"], "u1");
        // Nested view is kept alongside.
        assert_eq!(value["data"]["id"], "s1");
        assert_eq!(value["event"], "publish.success");
    }

    #[test]
    fn flatten_indexes_object_arrays() {
        let mut out = Map::new();
        flatten_into("items", &json!([{ "a": 1 }, { "a": 2 }]), &mut out);
        assert_eq!(Value::Object(out), json!({ "items_0_a": 1, "items_1_a": 2 }));
    }

    proptest! {
        #[test]
        fn flattened_values_are_never_nested(keys in proptest::collection::vec("[a-z]{1,6}", 1..6)) {
            let mut nested = json!("leaf");
            for key in keys.iter().rev() {
                nested = json!({ key.clone(): nested });
            }
            let mut out = Map::new();
            flatten_into("root", &nested, &mut out);

            prop_assert_eq!(out.len(), 1);
            let expected_key = format!("root_{}", keys.join("_"));
            prop_assert_eq!(out.get(&expected_key), Some(&json!("leaf")));
        }
    }
}
