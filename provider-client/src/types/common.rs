use serde::{Deserialize, Serialize};

/// Set of key-value pairs that can be attached to an object. Useful for storing
/// additional information about the object in a structured format, and querying
/// for objects via the API or the dashboard.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Metadata(serde_json::Value);

impl From<serde_json::Value> for Metadata {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}
