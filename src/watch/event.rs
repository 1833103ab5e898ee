use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::serde_json::{self, Value};
use tracing::debug;

/// A change notification for the watched `ConfigMap`
#[derive(Debug, Clone)]
pub enum ConfigMapEvent {
    Added(ConfigMap),
    Modified(ConfigMap),
    Deleted(ConfigMap),
    /// Anything else the server sends (bookmarks, in-band errors, future kinds)
    Other(String),
}

impl ConfigMapEvent {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "Added",
            Self::Modified(_) => "Modified",
            Self::Deleted(_) => "Deleted",
            Self::Other(_) => "Other",
        }
    }
}

/// Decode one line of a watch response body
///
/// Unknown event types become `Other`. Lines that are not a watch event at all,
/// and add/modify/delete events whose object is not a `ConfigMap`, yield `None`.
#[must_use]
pub fn decode_line(line: &str) -> Option<ConfigMapEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("skipping undecodable watch line: {}", e);
            return None;
        }
    };
    let Some(kind) = raw.get("type").and_then(Value::as_str).map(str::to_owned) else {
        debug!("skipping watch line without a type");
        return None;
    };
    let object = raw.get_mut("object").map(Value::take).unwrap_or_default();

    let wrap: fn(ConfigMap) -> ConfigMapEvent = match kind.as_str() {
        "ADDED" => ConfigMapEvent::Added,
        "MODIFIED" => ConfigMapEvent::Modified,
        "DELETED" => ConfigMapEvent::Deleted,
        "BOOKMARK" => {
            let version = object
                .pointer("/metadata/resourceVersion")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Some(ConfigMapEvent::Other(format!("bookmark at {version}")));
        }
        "ERROR" => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Some(ConfigMapEvent::Other(format!("error event: {message}")));
        }
        other => return Some(ConfigMapEvent::Other(format!("unknown event type {other}"))),
    };

    match serde_json::from_value::<ConfigMap>(object) {
        Ok(cm) => Some(wrap(cm)),
        Err(e) => {
            debug!("skipping {} event without a ConfigMap payload: {}", kind, e);
            None
        }
    }
}
