//! Impls - ports のインメモリ実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBlobStore**: bucket/key → bytes
//! - **InMemoryCoordinationStore**: 条件付き書き込み付き KV
//! - **StaticExecutionHistory**: 事前登録した実行履歴を返す
//!
//! 本番用の実装（S3 / DynamoDB / Step Functions）は別クレートに置く想定。

pub mod inmem_blob;
pub mod inmem_coordination;
pub mod inmem_history;

use std::sync::Arc;

pub use self::inmem_blob::InMemoryBlobStore;
pub use self::inmem_coordination::InMemoryCoordinationStore;
pub use self::inmem_history::StaticExecutionHistory;

use crate::config::CoreConfig;
use crate::ports::{Clock, SystemClock, UlidGenerator};
use crate::services::Services;

/// Concrete in-memory backends, kept around so tests can inspect them.
#[derive(Clone)]
pub struct InMemoryServices {
    pub blob: Arc<InMemoryBlobStore>,
    pub coordination: Arc<InMemoryCoordinationStore>,
    pub history: Arc<StaticExecutionHistory>,
    pub clock: Arc<dyn Clock>,
    pub config: CoreConfig,
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            blob: Arc::new(InMemoryBlobStore::new()),
            coordination: Arc::new(InMemoryCoordinationStore::new()),
            history: Arc::new(StaticExecutionHistory::new()),
            clock,
            config: CoreConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Type-erased view handed to the orchestrator.
    pub fn services(&self) -> Services {
        Services::new(
            self.blob.clone(),
            self.coordination.clone(),
            self.history.clone(),
            self.clock.clone(),
            Arc::new(UlidGenerator::new(self.clock.clone())),
            self.config.clone(),
        )
    }
}

impl Default for InMemoryServices {
    fn default() -> Self {
        Self::new()
    }
}
