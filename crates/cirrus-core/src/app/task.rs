//! Task API
//!
//! # 二層構造
//! - **表層（Typed）**: `TypedTask` - config / input / output を型で受け取る
//! - **内部（Dyn）**: `Task` - object-safe、`serde_json::Value` でやり取り
//!
//! `Typed<T>` が `TypedTask` を `Task` に変換する（type erasure）。

use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::concurrency::Semaphore;
use crate::context::ExecutionContext;
use crate::domain::{CirrusError, Invocation, Result, WorkflowErrorKind};

/// Business logic of one workflow step.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, run: &TaskRun<'_>) -> Result<Value>;
}

/// Strongly-typed task; wrap it in [`Typed`] to register it.
///
/// ```ignore
/// struct Discover;
///
/// #[async_trait]
/// impl TypedTask for Discover {
///     const NAME: &'static str = "discover";
///     type Config = DiscoverConfig;
///     type Input = serde_json::Value;
///     type Output = Vec<Granule>;
///
///     async fn run(&self, config: DiscoverConfig, _input: Value, run: &TaskRun<'_>) -> Result<Vec<Granule>> {
///         run.limit_connections_from_config(|| list(&config)).await
///     }
/// }
/// ```
#[async_trait]
pub trait TypedTask: Send + Sync {
    const NAME: &'static str;
    type Config: DeserializeOwned + Send;
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    async fn run(
        &self,
        config: Self::Config,
        input: Self::Input,
        run: &TaskRun<'_>,
    ) -> Result<Self::Output>;
}

pub struct Typed<T>(pub T);

#[async_trait]
impl<T: TypedTask> Task for Typed<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    async fn run(&self, run: &TaskRun<'_>) -> Result<Value> {
        let config: T::Config = serde_json::from_value(run.config.clone()).map_err(|e| {
            CirrusError::Configuration(format!("invalid config for {}: {e}", T::NAME))
        })?;
        let input: T::Input = serde_json::from_value(run.input.clone())
            .map_err(|e| CirrusError::Task(format!("invalid input for {}: {e}", T::NAME)))?;
        let output = self.0.run(config, input, run).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Everything a task sees during one invocation.
pub struct TaskRun<'a> {
    context: &'a ExecutionContext,
    semaphore: Semaphore,
    pub task_name: String,
    /// Resolved config (no template expressions left).
    pub config: Value,
    /// Task input: `cumulus_message.input` if configured, else the payload.
    pub input: Value,
    pub message: Value,
}

impl<'a> TaskRun<'a> {
    pub fn new(
        context: &'a ExecutionContext,
        task_name: impl Into<String>,
        config: Value,
        input: Value,
    ) -> Self {
        Self {
            semaphore: Semaphore::new(context.services().coordination.clone()),
            message: context.message().clone(),
            context,
            task_name: task_name.into(),
            config,
            input,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        self.context
    }

    pub fn invocation(&self) -> &Invocation {
        self.context.invocation()
    }

    pub fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }

    /// Run `f` under the provider's fleet-wide connection limit.
    ///
    /// The limit is `config.provider.globalConnectionLimit` (or
    /// `connections`) keyed by `config.provider.id`. Without both, `f` runs
    /// unrestricted. When the limit is reached the task fails with a
    /// `ResourcesLocked` workflow error.
    pub async fn limit_connections_from_config<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let provider = self.config.get("provider");
        let limit = provider
            .and_then(|p| p.get("globalConnectionLimit").or_else(|| p.get("connections")))
            .and_then(Value::as_i64)
            .filter(|limit| *limit > 0);
        let id = provider.and_then(|p| p.get("id")).and_then(Value::as_str);

        let (Some(max), Some(id)) = (limit, id) else {
            return f().await;
        };

        let locked = format!("could not get a connection slot for provider {id}");
        self.semaphore
            .checkout(id, 1, max, f, move || async move {
                Err(CirrusError::workflow(WorkflowErrorKind::ResourcesLocked, locked))
            })
            .await
    }

    pub async fn save_state(&self, data: &Value) -> Result<()> {
        self.context.save_state(&self.task_name, data).await
    }

    pub async fn load_state(&self) -> Result<Option<Value>> {
        self.context.load_state(&self.task_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::impls::InMemoryServices;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct GreetConfig {
        greeting: String,
    }

    struct Greet;

    #[async_trait]
    impl TypedTask for Greet {
        const NAME: &'static str = "greet";
        type Config = GreetConfig;
        type Input = Vec<String>;
        type Output = Vec<String>;

        async fn run(
            &self,
            config: GreetConfig,
            input: Vec<String>,
            _run: &TaskRun<'_>,
        ) -> Result<Vec<String>> {
            Ok(input
                .into_iter()
                .map(|n| format!("{} {n}", config.greeting))
                .collect())
        }
    }

    fn context(mem: &InMemoryServices) -> ExecutionContext {
        ExecutionContext::select(json!({}), Invocation::new(), mem.services(), &[])
    }

    #[tokio::test]
    async fn typed_task_decodes_and_encodes() {
        let mem = InMemoryServices::new();
        let ctx = context(&mem);
        let run = TaskRun::new(&ctx, "greet", json!({ "greeting": "hi" }), json!(["a", "b"]));
        let out = Typed(Greet).run(&run).await.unwrap();
        assert_eq!(out, json!(["hi a", "hi b"]));
    }

    #[tokio::test]
    async fn typed_task_rejects_bad_config() {
        let mem = InMemoryServices::new();
        let ctx = context(&mem);
        let run = TaskRun::new(&ctx, "greet", json!({}), json!([]));
        let err = Typed(Greet).run(&run).await.unwrap_err();
        assert!(matches!(err, CirrusError::Configuration(_)));
    }

    #[tokio::test]
    async fn no_provider_limit_runs_unrestricted() {
        let mem = InMemoryServices::new();
        let ctx = context(&mem);
        let run = TaskRun::new(&ctx, "t", json!({ "provider": { "id": "p" } }), json!(null));
        let out = run.limit_connections_from_config(|| async { Ok(1) }).await.unwrap();
        assert_eq!(out, 1);
        assert_eq!(run.semaphore().get("p").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_limit_holds_a_slot_while_running() {
        let mem = InMemoryServices::new();
        let ctx = context(&mem);
        let config = json!({ "provider": { "id": "p", "globalConnectionLimit": 1 } });
        let run = &TaskRun::new(&ctx, "t", config, json!(null));

        let nested = run
            .limit_connections_from_config(move || async move {
                assert_eq!(run.semaphore().get("p").await.unwrap(), 1);
                run.limit_connections_from_config(|| async { Ok("inner") }).await
            })
            .await
            .unwrap_err();
        assert_eq!(nested.workflow_kind_name(), Some("ResourcesLockedWorkflowError"));
        assert_eq!(run.semaphore().get("p").await.unwrap(), 0);
    }
}
