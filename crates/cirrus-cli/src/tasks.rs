//! worker に同梱する Task

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use cirrus_core::app::{Task, TaskRun, TypedTask};
use cirrus_core::Result;

/// Returns its input unchanged.
pub struct Echo;

#[async_trait]
impl Task for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, run: &TaskRun<'_>) -> Result<Value> {
        Ok(run.input.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct HelloConfig {
    #[serde(default)]
    provider: Option<Provider>,
    #[serde(default = "default_greeting")]
    greeting: String,
}

#[derive(Debug, Deserialize)]
struct Provider {
    id: String,
}

fn default_greeting() -> String {
    "Hello".to_string()
}

#[derive(Debug, Serialize)]
pub struct HelloOutput {
    message: String,
    runs: i64,
}

/// Greets the configured provider under its connection limit and counts
/// how often it ran for this message.
pub struct HelloProvider;

#[async_trait]
impl TypedTask for HelloProvider {
    const NAME: &'static str = "hello-provider";
    type Config = HelloConfig;
    type Input = Value;
    type Output = HelloOutput;

    async fn run(&self, config: HelloConfig, _input: Value, run: &TaskRun<'_>) -> Result<HelloOutput> {
        let runs = run
            .load_state()
            .await?
            .and_then(|state| state.get("runs").and_then(Value::as_i64))
            .unwrap_or(0)
            + 1;

        let target = config
            .provider
            .map(|p| p.id)
            .unwrap_or_else(|| "world".to_string());
        let greeting = config.greeting;
        let message = run
            .limit_connections_from_config(move || async move { Ok(format!("{greeting}, {target}!")) })
            .await?;

        run.save_state(&json!({ "runs": runs })).await?;
        tracing::info!(%message, runs, "Greeted");
        Ok(HelloOutput { message, runs })
    }
}
