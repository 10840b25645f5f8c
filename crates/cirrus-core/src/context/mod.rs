//! ExecutionContext - worker がどこから呼ばれたかを隠す
//!
//! 3 つの variant のどれを使うかは候補リストの先頭から predicate を評価して決める。
//! 候補リストは引数で渡すので、テストでは差し替えられる（グローバル状態は持たない）。
//!
//! | kind           | 選択条件                     | 設定の取得          | state            |
//! |----------------|------------------------------|---------------------|------------------|
//! | `StateMachine` | `event_source == "sfn"`      | 実行履歴から step 名 | blob storage     |
//! | `Stdin`        | `event_source == "stdin"`    | `message_source`    | `message.state`  |
//! | `Inline`       | 常に（最後の候補）            | `message_source`    | なし             |

pub mod inline;
pub mod state_machine;
pub mod stdin;
pub mod writes;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

pub use self::inline::{INLINE_RESULT_TAG, InlineContext};
pub use self::state_machine::StateMachineContext;
pub use self::stdin::StdinContext;
pub use self::writes::WriteTracker;

use crate::domain::{CumulusMeta, Invocation, MessageConfig, Result};
use crate::message::MessageAdapter;
use crate::services::Services;

/// What every variant is built from.
pub struct ContextBase {
    pub message: Value,
    pub invocation: Invocation,
    pub services: Services,
    pub adapter: MessageAdapter,
    pub writes: WriteTracker,
}

impl ContextBase {
    pub fn new(message: Value, invocation: Invocation, services: Services) -> Self {
        Self {
            message,
            invocation,
            adapter: MessageAdapter::new(services.clone()),
            services,
            writes: WriteTracker::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    StateMachine,
    Stdin,
    Inline,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::StateMachine => write!(f, "sfn"),
            ContextKind::Stdin => write!(f, "stdin"),
            ContextKind::Inline => write!(f, "inline"),
        }
    }
}

type Builder = Arc<dyn Fn(ContextBase) -> ExecutionContext + Send + Sync>;

/// One `(predicate, constructor)` entry of the selection list.
#[derive(Clone)]
pub struct ContextCandidate {
    pub kind: ContextKind,
    matches: fn(&Value) -> bool,
    build: Builder,
}

impl ContextCandidate {
    pub fn new(
        kind: ContextKind,
        matches: fn(&Value) -> bool,
        build: impl Fn(ContextBase) -> ExecutionContext + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            matches,
            build: Arc::new(build),
        }
    }

    pub fn state_machine() -> Self {
        Self::new(ContextKind::StateMachine, |m| source_is(m, "sfn"), |base| {
            ExecutionContext::StateMachine(StateMachineContext::new(base))
        })
    }

    pub fn stdin() -> Self {
        Self::new(ContextKind::Stdin, |m| source_is(m, "stdin"), |base| {
            ExecutionContext::Stdin(StdinContext::new(base))
        })
    }

    pub fn inline() -> Self {
        Self::new(ContextKind::Inline, |_| true, |base| {
            ExecutionContext::Inline(InlineContext::new(base))
        })
    }

    pub fn matches(&self, message: &Value) -> bool {
        (self.matches)(message)
    }
}

impl fmt::Debug for ContextCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCandidate")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Production selection order; the inline entry matches everything.
pub fn default_candidates() -> Vec<ContextCandidate> {
    vec![
        ContextCandidate::state_machine(),
        ContextCandidate::stdin(),
        ContextCandidate::inline(),
    ]
}

fn source_is(message: &Value, source: &str) -> bool {
    CumulusMeta::from_message(message)
        .ok()
        .is_some_and(|meta| meta.source() == Some(source))
}

pub enum ExecutionContext {
    StateMachine(StateMachineContext),
    Stdin(StdinContext),
    Inline(InlineContext),
}

impl ExecutionContext {
    /// Build the first candidate whose predicate accepts `message`.
    ///
    /// Falls back to [`InlineContext`] when nothing matches.
    pub fn select(
        message: Value,
        invocation: Invocation,
        services: Services,
        candidates: &[ContextCandidate],
    ) -> Self {
        let base = ContextBase::new(message, invocation, services);
        match candidates.iter().find(|c| c.matches(&base.message)) {
            Some(candidate) => {
                debug!(kind = %candidate.kind, "Execution context selected");
                (candidate.build)(base)
            }
            None => ExecutionContext::Inline(InlineContext::new(base)),
        }
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            ExecutionContext::StateMachine(_) => ContextKind::StateMachine,
            ExecutionContext::Stdin(_) => ContextKind::Stdin,
            ExecutionContext::Inline(_) => ContextKind::Inline,
        }
    }

    fn base(&self) -> &ContextBase {
        match self {
            ExecutionContext::StateMachine(c) => &c.base,
            ExecutionContext::Stdin(c) => &c.inline.base,
            ExecutionContext::Inline(c) => &c.base,
        }
    }

    /// Current view of the message (dereferenced once `load_message_data` ran).
    pub fn message(&self) -> &Value {
        &self.base().message
    }

    pub fn services(&self) -> &Services {
        &self.base().services
    }

    pub fn invocation(&self) -> &Invocation {
        &self.base().invocation
    }

    pub async fn load_message_data(&mut self) -> Result<Value> {
        match self {
            ExecutionContext::StateMachine(c) => c.load_message_data().await,
            ExecutionContext::Stdin(c) => c.load_message_data().await,
            ExecutionContext::Inline(c) => c.load_message_data().await,
        }
    }

    /// Raw config template of this step.
    pub async fn load_config_template(&self) -> Result<Value> {
        match self {
            ExecutionContext::StateMachine(c) => c.load_config_template().await,
            ExecutionContext::Stdin(c) => c.load_config_template().await,
            ExecutionContext::Inline(c) => c.load_config_template().await,
        }
    }

    pub async fn save_state(&self, task_name: &str, data: &Value) -> Result<()> {
        match self {
            ExecutionContext::StateMachine(c) => c.save_state(task_name, data).await,
            ExecutionContext::Stdin(c) => c.save_state(task_name, data).await,
            ExecutionContext::Inline(c) => c.save_state(task_name, data).await,
        }
    }

    pub async fn load_state(&self, task_name: &str) -> Result<Option<Value>> {
        match self {
            ExecutionContext::StateMachine(c) => c.load_state(task_name).await,
            ExecutionContext::Stdin(c) => c.load_state(task_name).await,
            ExecutionContext::Inline(c) => c.load_state(task_name).await,
        }
    }

    /// Resolves once every blob write of this invocation has settled.
    pub async fn wait(&self) -> Result<()> {
        self.base().writes.wait().await
    }

    pub async fn complete(&self) -> Result<()> {
        self.wait().await
    }

    pub async fn fail(&self) -> Result<()> {
        self.wait().await
    }

    /// Envelope reporting a workflow error under `exception`.
    ///
    /// The state machine gets it through the same offload rule as a result;
    /// local runs get it as is.
    pub async fn exception_message(&self, exception: &str) -> Result<Value> {
        let mut message = self.message().clone();
        if let Some(obj) = message.as_object_mut() {
            obj.insert("exception".to_string(), Value::String(exception.to_string()));
        }
        match self {
            ExecutionContext::StateMachine(c) => c.base.adapter.store_remote(message).await,
            ExecutionContext::Stdin(_) | ExecutionContext::Inline(_) => Ok(message),
        }
    }

    /// Turn the task outcome into what the invoker receives.
    pub async fn perform_lambda_callback(
        &self,
        message_config: Option<&MessageConfig>,
        outcome: Result<Value>,
    ) -> Result<Value> {
        match self {
            ExecutionContext::StateMachine(c) => {
                c.perform_lambda_callback(message_config, outcome).await
            }
            ExecutionContext::Stdin(c) => c.perform_lambda_callback(message_config, outcome).await,
            ExecutionContext::Inline(c) => c.perform_lambda_callback(message_config, outcome).await,
        }
    }
}
