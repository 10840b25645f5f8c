//! App - worker 1 回分の実行を組み立てる
//!
//! - **task**: `Task`（dyn 用）と `TypedTask`（型付き）
//! - **registry**: 名前 → Task の登録
//! - **orchestrator**: context 選択から callback までの一連の流れ

pub mod orchestrator;
pub mod registry;
pub mod task;

pub use self::orchestrator::TaskOrchestrator;
pub use self::registry::{RegistryError, TaskRegistry};
pub use self::task::{Task, TaskRun, Typed, TypedTask};
