//! StdinContext - ローカルのテストハーネス用
//!
//! 前段の worker が出力した inline-result 行を stdin から読み、
//! 最初のレコードを受け取った message に重ねる。

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::ContextBase;
use super::inline::{INLINE_RESULT_TAG, InlineContext};
use crate::domain::{CirrusError, MessageConfig, Result};

type Records = Option<Arc<Vec<Value>>>;

pub struct StdinContext {
    pub(crate) inline: InlineContext,
    records: watch::Receiver<Records>,
}

impl StdinContext {
    /// Start reading the process's stdin in the background.
    pub fn new(base: ContextBase) -> Self {
        Self::with_reader(base, tokio::io::stdin())
    }

    /// Same as [`StdinContext::new`] with any line-oriented reader.
    pub fn with_reader<R>(base: ContextBase, reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let mut records = Vec::new();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(body) = line.strip_prefix(INLINE_RESULT_TAG) else {
                            continue;
                        };
                        match serde_json::from_str(body) {
                            Ok(record) => records.push(record),
                            Err(e) => warn!(error = %e, "Skipping unparseable inline-result line"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed; treating as closed");
                        break;
                    }
                }
            }
            debug!(records = records.len(), "stdin closed");
            // 受信側が居なくても問題ない
            let _ = tx.send(Some(Arc::new(records)));
        });

        Self {
            inline: InlineContext::new(base),
            records: rx,
        }
    }

    /// First inline-result record, available once stdin has closed.
    ///
    /// Callers before closure wait for it; later callers get the cached
    /// value immediately.
    ///
    /// The record's `cumulus_meta` is laid over the incoming one field by
    /// field, and the incoming `task` always wins, so routing fields such as
    /// `message_source` survive a record that does not carry them.
    pub async fn get_event_scoped_json(&self) -> Result<Option<Value>> {
        let mut rx = self.records.clone();
        let records = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CirrusError::Task("stdin reader stopped before closing".into()))?
            .clone()
            .unwrap_or_default();

        let Some(mut value) = records.first().cloned() else {
            return Ok(None);
        };

        if let Some(incoming) = self
            .inline
            .base
            .message
            .get("cumulus_meta")
            .and_then(Value::as_object)
            && let Some(obj) = value.as_object_mut()
        {
            let mut meta = incoming.clone();
            if let Some(Value::Object(upstream)) = obj.get("cumulus_meta") {
                meta.extend(upstream.clone());
            }
            if let Some(task) = incoming.get("task") {
                meta.insert("task".to_string(), task.clone());
            }
            obj.insert("cumulus_meta".to_string(), Value::Object(meta));
        }

        Ok(Some(value))
    }

    pub async fn load_message_data(&mut self) -> Result<Value> {
        let mut message = self.inline.load_message_data().await?;

        if let Some(Value::Object(record)) = self.get_event_scoped_json().await?
            && let Some(obj) = message.as_object_mut()
        {
            obj.extend(record);
        }

        self.inline.base.message = message.clone();
        Ok(message)
    }

    pub async fn load_config_template(&self) -> Result<Value> {
        self.inline.load_config_template().await
    }

    pub async fn save_state(&self, task_name: &str, data: &Value) -> Result<()> {
        self.inline.save_state(task_name, data).await
    }

    /// State handed over by the previous worker in `message.state`.
    pub async fn load_state(&self, _task_name: &str) -> Result<Option<Value>> {
        Ok(self.inline.base.message.get("state").cloned())
    }

    pub async fn perform_lambda_callback(
        &self,
        message_config: Option<&MessageConfig>,
        outcome: Result<Value>,
    ) -> Result<Value> {
        self.inline
            .perform_lambda_callback(message_config, outcome)
            .await
    }
}
