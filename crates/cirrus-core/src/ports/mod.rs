//! Ports - 外部サービスの抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。worker は共有メモリを持たないので、
//! invocation 間の協調はすべてここに定義した trait を経由する。
//!
//! - BlobStore: offload された envelope / task state の保存先
//! - CoordinationStore: 条件付き書き込みができる KV（Semaphore / Mutex の土台）
//! - ExecutionHistory: state machine の実行履歴（現在の step 名の解決）
//! - Clock / IdGenerator: テストで差し替えるための時刻・ID

pub mod blob_store;
pub mod clock;
pub mod coordination_store;
pub mod execution_history;
pub mod id_generator;

pub use self::blob_store::{BlobError, BlobStore};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::coordination_store::{Condition, CoordinationStore, Item, StoreError};
pub use self::execution_history::{ExecutionHistory, HistoryError, HistoryEvent, HistoryEventKind};
pub use self::id_generator::{IdGenerator, UlidGenerator};
