//! InlineContext - 外部ストアを使わない既定のコンテキスト
//!
//! 成功時は `[WARN] inline-result: <json>` を stdout に書く。
//! 次の worker の StdinContext がそれを読むので、シェルのパイプで繋げられる。

use serde_json::Value;
use tracing::warn;

use super::ContextBase;
use crate::domain::{MessageConfig, Result};
use crate::message::MessageAdapter;

/// Prefix of result lines exchanged between chained local workers.
pub const INLINE_RESULT_TAG: &str = "[WARN] inline-result: ";

pub struct InlineContext {
    pub(crate) base: ContextBase,
}

impl InlineContext {
    pub fn new(base: ContextBase) -> Self {
        Self { base }
    }

    pub async fn load_message_data(&mut self) -> Result<Value> {
        let message = self.base.adapter.load_remote(self.base.message.clone()).await?;
        self.base.message = message.clone();
        Ok(message)
    }

    pub async fn load_config_template(&self) -> Result<Value> {
        self.base
            .adapter
            .load_config(&self.base.message, &self.base.invocation)
            .await
    }

    pub async fn save_state(&self, task_name: &str, _data: &Value) -> Result<()> {
        warn!(task_name, "save_state requested but not supported inline");
        Ok(())
    }

    pub async fn load_state(&self, task_name: &str) -> Result<Option<Value>> {
        warn!(task_name, "load_state requested but not supported inline");
        Ok(None)
    }

    pub async fn perform_lambda_callback(
        &self,
        message_config: Option<&MessageConfig>,
        outcome: Result<Value>,
    ) -> Result<Value> {
        let next = inline_next(&self.base.message, message_config, outcome?)?;
        println!("{INLINE_RESULT_TAG}{next}");
        Ok(next)
    }
}

/// Next envelope built in memory: outputs applied, `exception` cleared.
pub(crate) fn inline_next(
    message: &Value,
    message_config: Option<&MessageConfig>,
    result: Value,
) -> Result<Value> {
    let mut next = MessageAdapter::assign_outputs(result, message, message_config)?;
    if let Some(obj) = next.as_object_mut() {
        obj.insert("exception".to_string(), Value::String("None".to_string()));
        obj.remove("replace");
    }
    Ok(next)
}
