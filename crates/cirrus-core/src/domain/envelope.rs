//! Envelope - worker 間で受け渡す JSON message の形
//!
//! The message itself stays a `serde_json::Value` so templates and JSONPath
//! destinations can address any part of it. This module holds the typed views
//! the protocol needs: `cumulus_meta`, remote pointers and the per-step
//! `cumulus_message` settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{CirrusError, Result};

/// Serialized size (bytes) at or above which an envelope is moved to blob storage.
pub const MAX_NON_REMOTE_PAYLOAD_SIZE: usize = 10_000;

/// Routing metadata carried under `cumulus_meta`.
///
/// Unknown keys are ignored here; they stay in the raw message untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulusMeta {
    /// How step config is located: `local` or `sfn`.
    #[serde(default)]
    pub message_source: Option<String>,

    /// Which execution context drives the worker: `sfn`, `stdin`, anything else is inline.
    #[serde(default)]
    pub event_source: Option<String>,

    #[serde(default)]
    pub task: Option<String>,

    #[serde(default)]
    pub state_machine: Option<String>,

    #[serde(default)]
    pub execution_name: Option<String>,

    #[serde(default)]
    pub system_bucket: Option<String>,
}

impl CumulusMeta {
    pub fn from_message(message: &Value) -> Result<Self> {
        let meta = message
            .get("cumulus_meta")
            .ok_or_else(|| CirrusError::Configuration("message has no cumulus_meta".into()))?;
        Ok(serde_json::from_value(meta.clone())?)
    }

    /// Source used for context selection; falls back to `message_source`.
    pub fn source(&self) -> Option<&str> {
        self.event_source
            .as_deref()
            .or(self.message_source.as_deref())
    }
}

/// Location of a value that was moved out of the message.
///
/// Serialized as `{"bucket": ..., "key": ...}`; the capitalized `Bucket`/`Key`
/// spelling is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePointer {
    #[serde(alias = "Bucket")]
    pub bucket: String,
    #[serde(alias = "Key")]
    pub key: String,
}

impl RemotePointer {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Interpret `value` as a pointer.
    ///
    /// Only an object made of exactly a bucket and a key counts; business
    /// payloads that merely contain such fields are left alone.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != 2 {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Whole-envelope pointer stored under `replace`.
    pub fn from_message(message: &Value) -> Option<Self> {
        message.get("replace").and_then(Self::from_value)
    }

    /// Pointer written in place of `payload`: exactly `{"Bucket", "Key"}`.
    ///
    /// Lowercase `{bucket, key}` payloads are file locations owned by the
    /// workflow and are never dereferenced.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let obj = payload.as_object()?;
        if obj.len() != 2 {
            return None;
        }
        let bucket = obj.get("Bucket")?.as_str()?;
        let key = obj.get("Key")?.as_str()?;
        Some(Self::new(bucket, key))
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "bucket": self.bucket, "key": self.key })
    }
}

/// One `{source, destination}` pair from `cumulus_message.outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapping {
    pub source: String,
    pub destination: String,
}

/// The `cumulus_message` block of a step's config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Template selecting the task input; defaults to the envelope payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputMapping>>,
}

/// What a task sees after the message has been interpreted for its step.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedEvent {
    pub payload: Value,
    pub config: Value,
    pub message_config: Option<MessageConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cumulus_meta_reads_known_fields() {
        let msg = json!({
            "cumulus_meta": {
                "message_source": "sfn",
                "state_machine": "arn:sm",
                "execution_name": "exec-1",
                "workflow_start_time": 12
            }
        });
        let meta = CumulusMeta::from_message(&msg).unwrap();
        assert_eq!(meta.message_source.as_deref(), Some("sfn"));
        assert_eq!(meta.execution_name.as_deref(), Some("exec-1"));
        assert_eq!(meta.source(), Some("sfn"));
    }

    #[test]
    fn cumulus_meta_is_required() {
        let err = CumulusMeta::from_message(&json!({"payload": {}})).unwrap_err();
        assert!(matches!(err, CirrusError::Configuration(_)));
    }

    #[test]
    fn pointer_requires_exactly_bucket_and_key() {
        assert_eq!(
            RemotePointer::from_value(&json!({"Bucket": "b", "Key": "k"})),
            Some(RemotePointer::new("b", "k"))
        );
        assert_eq!(
            RemotePointer::from_value(&json!({"bucket": "b", "key": "k"})),
            Some(RemotePointer::new("b", "k"))
        );
        assert_eq!(
            RemotePointer::from_value(&json!({"bucket": "b", "key": "k", "size": 3})),
            None
        );
        assert_eq!(RemotePointer::from_value(&json!("b/k")), None);
    }

    #[test]
    fn payload_pointer_must_be_capitalized() {
        assert_eq!(
            RemotePointer::from_payload(&json!({"Bucket": "b", "Key": "k"})),
            Some(RemotePointer::new("b", "k"))
        );
        assert_eq!(
            RemotePointer::from_payload(&json!({"bucket": "granules", "key": "g1.hdf"})),
            None
        );
        assert_eq!(
            RemotePointer::from_payload(&json!({"Bucket": "b", "Key": 3})),
            None
        );
    }

    #[test]
    fn message_config_defaults_to_nothing() {
        let mc: MessageConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(mc, MessageConfig::default());

        let mc: MessageConfig = serde_json::from_value(json!({
            "input": "{{$.payload.granules}}",
            "outputs": [{"source": "{{$}}", "destination": "{{$.payload}}"}]
        }))
        .unwrap();
        assert_eq!(mc.outputs.unwrap().len(), 1);
    }
}
