//! TaskOrchestrator - worker 1 回分の実行
//!
//! ```text
//! Idle → ContextSelected → ConfigResolved → Running → Completed / Failed
//! ```
//!
//! 1. context を選ぶ
//! 2. `load_message_data` で remote pointer を解決
//! 3. `load_config_template` で step の設定テンプレートを取得
//! 4. テンプレートを message に対して解決
//! 5. Task を実行（成功なら `complete`、失敗なら `fail` して再送出）
//! 6. `perform_lambda_callback` で出力 envelope を作る
//!
//! 失敗時: workflow error は `exception` に種別名を入れた message を返す（非致命）。
//! それ以外はログに残して `Err` として返す。

use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::task::{Task, TaskRun};
use crate::context::{ContextCandidate, ExecutionContext, default_candidates};
use crate::domain::{CirrusError, Invocation, NestedEvent, Result};
use crate::message::MessageAdapter;
use crate::services::Services;

pub struct TaskOrchestrator {
    services: Services,
    candidates: Vec<ContextCandidate>,
}

impl TaskOrchestrator {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            candidates: default_candidates(),
        }
    }

    /// Replace the context selection list (first match wins).
    pub fn with_candidates(mut self, candidates: Vec<ContextCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Drive one invocation of `task` for `event`.
    pub async fn handle(&self, task: &dyn Task, event: Value, invocation: Invocation) -> Result<Value> {
        let invocation_id = self.services.ids.generate_invocation_id();
        let span = info_span!("invocation", id = %invocation_id, task = task.name());

        async move {
            let mut context = ExecutionContext::select(
                event,
                invocation,
                self.services.clone(),
                &self.candidates,
            );
            info!(context = %context.kind(), "Handling event");

            match self.run(task, &mut context).await {
                Ok(output) => {
                    info!("Task completed");
                    Ok(output)
                }
                Err(e) => self.on_failure(&context, e).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, task: &dyn Task, context: &mut ExecutionContext) -> Result<Value> {
        let message = context.load_message_data().await?;
        let template = context.load_config_template().await?;
        let nested = MessageAdapter::nested_from_config(&message, template)?;
        debug!(config = %nested.config, "Config resolved");

        let context = &*context;
        let outcome = self.invoke(task, context, &nested).await;
        context
            .perform_lambda_callback(nested.message_config.as_ref(), outcome)
            .await
    }

    async fn invoke(
        &self,
        task: &dyn Task,
        context: &ExecutionContext,
        nested: &NestedEvent,
    ) -> Result<Value> {
        let run = TaskRun::new(
            context,
            task.name(),
            nested.config.clone(),
            nested.payload.clone(),
        );

        match task.run(&run).await {
            Ok(output) => {
                context.complete().await?;
                Ok(output)
            }
            Err(e) => {
                if let Err(fail_err) = context.fail().await {
                    warn!(error = %fail_err, "fail() reported an error");
                }
                Err(e)
            }
        }
    }

    async fn on_failure(&self, context: &ExecutionContext, e: CirrusError) -> Result<Value> {
        // fail() 自体のエラーで元のエラーを隠さない
        if let Err(fail_err) = context.fail().await {
            warn!(error = %fail_err, "fail() reported an error");
        }

        if let Some(kind) = e.workflow_kind_name() {
            info!(exception = kind, error = %e, "Task ended with a workflow error");
            return context.exception_message(kind).await;
        }

        error!(error = %e, chain = %error_chain(&e), "Task failed");
        Err(e)
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
