//! MessageAdapter - envelope の読み込み・設定解決・出力組み立て
//!
//! 処理は全て `Result` を返す逐次ステップで、どこかで失敗すれば残りは実行されない。
//!
//! ```text
//! load_remote → load_config → nested_from_config → (task) → create_next → store_remote
//! ```

pub mod step;

use chrono::TimeDelta;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::domain::{
    CirrusError, CumulusMeta, Invocation, MessageConfig, NestedEvent, RemotePointer, Result,
};
use crate::ports::{BlobError, HistoryEvent};
use crate::services::Services;
use crate::template::{JsonPath, resolve_object, resolve_path_str};

pub use self::step::{current_task_name, execution_arn, mapped_task_name};

#[derive(Clone)]
pub struct MessageAdapter {
    services: Services,
}

impl MessageAdapter {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Return the full envelope, fetching it when `event` is only a `replace` pointer.
    pub async fn load_remote(&self, event: Value) -> Result<Value> {
        match RemotePointer::from_message(&event) {
            Some(pointer) => self.fetch_pointer(&pointer).await,
            None => Ok(event),
        }
    }

    /// Fetch and parse the JSON document a pointer refers to.
    ///
    /// A missing object surfaces as [`CirrusError::Blob`]; any other storage
    /// failure is a [`CirrusError::Fetch`].
    #[instrument(skip(self), fields(bucket = %pointer.bucket, key = %pointer.key))]
    pub async fn fetch_pointer(&self, pointer: &RemotePointer) -> Result<Value> {
        let body = self
            .services
            .blob
            .get_object(&pointer.bucket, &pointer.key)
            .await
            .map_err(|source| match source {
                e @ BlobError::NotFound { .. } => CirrusError::Blob(e),
                source => CirrusError::Fetch {
                    bucket: pointer.bucket.clone(),
                    key: pointer.key.clone(),
                    source,
                },
            })?;
        debug!(size = body.len(), "Remote document fetched");
        Ok(serde_json::from_slice(&body)?)
    }

    /// Raw (unresolved) config of the step this worker runs as.
    pub async fn load_config(&self, event: &Value, invocation: &Invocation) -> Result<Value> {
        let meta = CumulusMeta::from_message(event)?;
        match meta.message_source.as_deref() {
            Some("local") => {
                let task = meta.task.as_deref().ok_or_else(|| {
                    CirrusError::Configuration("local messages require cumulus_meta.task".into())
                })?;
                Ok(Self::step_config(event, task))
            }
            Some("sfn") => {
                let step = self.current_step_name(event, &meta, invocation).await?;
                Ok(Self::step_config(event, &step))
            }
            Some(other) => Err(CirrusError::Configuration(format!(
                "unknown message_source: {other}"
            ))),
            None => Err(CirrusError::Configuration(
                "cumulus_meta requires a message_source".into(),
            )),
        }
    }

    /// Name of the state-machine step currently executing.
    ///
    /// `workflow_config.arns_to_name_mappings` is checked before the history service.
    #[instrument(skip(self, event, meta), fields(execution = ?meta.execution_name))]
    pub async fn current_step_name(
        &self,
        event: &Value,
        meta: &CumulusMeta,
        invocation: &Invocation,
    ) -> Result<String> {
        let resource = invocation.resource_arn();
        if let Some(name) = mapped_task_name(event, resource) {
            debug!(step = %name, "Step resolved from arns_to_name_mappings");
            return Ok(name);
        }

        let (Some(state_machine), Some(execution_name)) =
            (meta.state_machine.as_deref(), meta.execution_name.as_deref())
        else {
            return Err(CirrusError::Configuration(
                "sfn messages require cumulus_meta.state_machine and execution_name".into(),
            ));
        };

        let arn = execution_arn(state_machine, execution_name);
        let events = self.execution_history(&arn).await?;

        let name = current_task_name(&events, resource)
            .ok_or_else(|| CirrusError::Configuration(format!("no task found for {arn}")))?;
        debug!(step = %name, "Step resolved from execution history");
        Ok(name)
    }

    /// History of `arn`, retrying throttled requests with backoff.
    async fn execution_history(&self, arn: &str) -> Result<Vec<HistoryEvent>> {
        let policy = &self.services.config.history_retry;
        let mut attempts = 0;
        loop {
            match self
                .services
                .history
                .get_execution_history(arn, self.services.config.history_max_results)
                .await
            {
                Err(e) if e.is_throttled() && policy.allows(attempts) => {
                    attempts += 1;
                    let delay = policy.next_delay(attempts);
                    info!(attempts, ?delay, "Execution history throttled; retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return Ok(other?),
            }
        }
    }

    /// `workflow_config[name]`, or `{}` when the step has no entry.
    pub fn step_config(event: &Value, name: &str) -> Value {
        event
            .get("workflow_config")
            .and_then(|wc| wc.get(name))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    pub async fn load_nested(&self, event: &Value, invocation: &Invocation) -> Result<NestedEvent> {
        let raw = self.load_config(event, invocation).await?;
        Self::nested_from_config(event, raw)
    }

    /// Split `cumulus_message` off `raw`, resolve the rest against `event`
    /// and pick the task input.
    pub fn nested_from_config(event: &Value, mut raw: Value) -> Result<NestedEvent> {
        let message_config = match raw.as_object_mut().and_then(|o| o.remove("cumulus_message")) {
            Some(mc) => Some(serde_json::from_value::<MessageConfig>(mc)?),
            None => None,
        };

        let config = resolve_object(event, &raw);
        let payload = match message_config.as_ref().and_then(|mc| mc.input.as_deref()) {
            Some(input) => resolve_path_str(event, input),
            None => event.get("payload").cloned().unwrap_or(Value::Null),
        };

        Ok(NestedEvent {
            payload,
            config,
            message_config,
        })
    }

    /// Place a task result into a copy of `event`.
    ///
    /// Without `outputs` the result becomes the payload. With `outputs` the
    /// payload is reset to `{}` and each source path of the result is written
    /// to its destination path.
    pub fn assign_outputs(
        result: Value,
        event: &Value,
        message_config: Option<&MessageConfig>,
    ) -> Result<Value> {
        let mut next = as_object(event.clone());

        let Some(outputs) = message_config.and_then(|mc| mc.outputs.as_ref()) else {
            set(&mut next, "payload", result);
            return Ok(next);
        };

        set(&mut next, "payload", Value::Object(Map::new()));
        for output in outputs {
            let value = resolve_path_str(&result, &output.source);
            JsonPath::parse(destination_path(&output.destination))?.assign(&mut next, value)?;
        }
        Ok(next)
    }

    /// Build the outgoing envelope: outputs applied, `exception` cleared,
    /// any stale pointer dropped and oversized results offloaded.
    pub async fn create_next(
        &self,
        result: Value,
        event: &Value,
        message_config: Option<&MessageConfig>,
    ) -> Result<Value> {
        let mut next = Self::assign_outputs(result, event, message_config)?;
        set(&mut next, "exception", json!("None"));
        if let Some(obj) = next.as_object_mut() {
            obj.remove("replace");
        }
        self.store_remote(next).await
    }

    /// Offload `event` to blob storage when its JSON reaches the threshold.
    ///
    /// Returns `event` untouched when it is small enough, otherwise
    /// `{cumulus_meta, replace: {bucket, key}}`.
    #[instrument(skip_all)]
    pub async fn store_remote(&self, event: Value) -> Result<Value> {
        let body = serde_json::to_vec(&event)?;
        if body.len() < self.services.config.offload_threshold {
            return Ok(event);
        }

        let bucket = self.storage_bucket(&event)?;
        let key = self.services.ids.generate_event_key().to_string();
        let days = self.services.config.remote_expiry_days;
        let expires = TimeDelta::try_days(days)
            .and_then(|ttl| self.services.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| {
                CirrusError::Configuration(format!("remote expiry of {days} days is out of range"))
            })?;
        let size = body.len();

        self.services
            .blob
            .put_object(&bucket, &key, body, Some(expires))
            .await?;
        debug!(%bucket, %key, size, "Envelope offloaded");

        Ok(json!({
            "cumulus_meta": event.get("cumulus_meta").cloned().unwrap_or(Value::Null),
            "replace": RemotePointer::new(bucket, key).to_value(),
        }))
    }

    /// Bucket for objects this worker writes on behalf of `event`.
    ///
    /// `resources.buckets.private`, then `cumulus_meta.system_bucket`, then
    /// the configured system bucket.
    pub fn storage_bucket(&self, event: &Value) -> Result<String> {
        event
            .pointer("/resources/buckets/private")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                CumulusMeta::from_message(event)
                    .ok()
                    .and_then(|meta| meta.system_bucket)
            })
            .or_else(|| self.services.config.system_bucket.clone())
            .ok_or_else(|| {
                CirrusError::Configuration(
                    "no bucket available: set resources.buckets.private, \
                     cumulus_meta.system_bucket or CIRRUS_SYSTEM_BUCKET"
                        .into(),
                )
            })
    }
}

/// `{{$.a}}` / `{$.a}` → `$.a`
fn destination_path(destination: &str) -> &str {
    let d = destination.trim();
    d.strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .or_else(|| d.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .unwrap_or(d)
}

fn as_object(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        Value::Object(Map::new())
    }
}

fn set(target: &mut Value, key: &str, value: Value) {
    if let Some(obj) = target.as_object_mut() {
        obj.insert(key.to_string(), value);
    }
}
