//! cirrus-worker - Task を 1 回だけ実行するローカル worker
//!
//! ```text
//! cirrus-worker <event.json> [task]
//! ```
//!
//! task を省略した場合は `cumulus_meta.task` を使う。外部サービスは in-memory 実装で代用する。
//! 出力 envelope は stdout、ログは stderr に出す。

mod tasks;

use std::error::Error;
use std::process::ExitCode;

use serde_json::Value;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cirrus_core::app::{TaskOrchestrator, TaskRegistry};
use cirrus_core::impls::InMemoryServices;
use cirrus_core::{CoreConfig, Invocation};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Worker failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn registry() -> Result<TaskRegistry, BoxError> {
    let mut registry = TaskRegistry::new();
    registry.register(tasks::Echo)?;
    registry.register_typed(tasks::HelloProvider)?;
    Ok(registry)
}

async fn run() -> Result<Value, BoxError> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("usage: cirrus-worker <event.json> [task]")?;
    let explicit_task = args.next();

    let raw = tokio::fs::read(&path).await?;
    let event: Value = serde_json::from_slice(&raw)?;

    let registry = registry()?;
    let task_name = explicit_task
        .or_else(|| {
            event
                .pointer("/cumulus_meta/task")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .ok_or("no task given and the event has no cumulus_meta.task")?;
    let task = registry.get(&task_name).ok_or_else(|| {
        format!(
            "unknown task '{task_name}' (available: {})",
            registry.names().join(", ")
        )
    })?;

    let services = InMemoryServices::new().with_config(CoreConfig::from_env()?);
    let orchestrator = TaskOrchestrator::new(services.services());
    let invocation = Invocation::new().with_function_name(task_name.as_str());

    Ok(orchestrator
        .handle(task.as_ref(), event, invocation)
        .await?)
}
