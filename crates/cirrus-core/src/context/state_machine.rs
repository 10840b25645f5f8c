//! StateMachineContext - state machine から呼ばれた worker

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::ContextBase;
use crate::domain::{CumulusMeta, MessageConfig, RemotePointer, Result};
use crate::message::MessageAdapter;

pub struct StateMachineContext {
    pub(crate) base: ContextBase,
}

impl StateMachineContext {
    pub fn new(base: ContextBase) -> Self {
        Self { base }
    }

    /// Full envelope with a pointer-valued `payload` dereferenced as well.
    pub async fn load_message_data(&mut self) -> Result<Value> {
        let mut message = self.base.adapter.load_remote(self.base.message.clone()).await?;

        if let Some(pointer) = message.get("payload").and_then(RemotePointer::from_payload) {
            debug!(key = %pointer.key, "Payload stored remotely");
            let payload = self.base.adapter.fetch_pointer(&pointer).await?;
            if let Some(obj) = message.as_object_mut() {
                obj.insert("payload".to_string(), payload);
            }
        }

        self.base.message = message.clone();
        Ok(message)
    }

    /// Config of the step found through the execution history.
    pub async fn load_config_template(&self) -> Result<Value> {
        let message = &self.base.message;
        let meta = CumulusMeta::from_message(message)?;
        let step = self
            .base
            .adapter
            .current_step_name(message, &meta, &self.base.invocation)
            .await?;
        Ok(MessageAdapter::step_config(message, &step))
    }

    /// Where `task_name` keeps its state for this message.
    ///
    /// `None` when the message has no `meta.key` / `meta.collection`.
    fn state_location(&self, task_name: &str) -> Result<Option<RemotePointer>> {
        let message = &self.base.message;
        let Some(key) = message
            .pointer("/meta/key")
            .or_else(|| message.pointer("/meta/collection"))
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };

        let bucket = self.base.adapter.storage_bucket(message)?;
        Ok(Some(RemotePointer::new(bucket, format!("{task_name}-state/{key}"))))
    }

    #[instrument(skip(self, data))]
    pub async fn save_state(&self, task_name: &str, data: &Value) -> Result<()> {
        let Some(location) = self.state_location(task_name)? else {
            warn!("Message has no key; state not saved");
            return Ok(());
        };

        let body = serde_json::to_vec(data)?;
        let blob = self.base.services.blob.clone();
        self.base
            .writes
            .track(async move {
                blob.put_object(&location.bucket, &location.key, body, None)
                    .await
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn load_state(&self, task_name: &str) -> Result<Option<Value>> {
        let Some(location) = self.state_location(task_name)? else {
            return Ok(None);
        };

        match self
            .base
            .services
            .blob
            .get_object(&location.bucket, &location.key)
            .await
        {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Errors pass through; results become the next envelope, offloaded when large.
    pub async fn perform_lambda_callback(
        &self,
        message_config: Option<&MessageConfig>,
        outcome: Result<Value>,
    ) -> Result<Value> {
        let result = outcome?;
        self.base
            .adapter
            .create_next(result, &self.base.message, message_config)
            .await
    }
}
