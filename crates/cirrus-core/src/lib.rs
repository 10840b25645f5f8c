//! cirrus-core
//!
//! Core building blocks for Cirrus ingest workers.
//!
//! 各 worker は 1 invocation = 1 step のステートレスなプロセスとして動き、
//! 協調はすべて外部サービス（blob store / coordination store / execution history）経由で行う。
//!
//! # モジュール構成
//! - **domain**: envelope の型、エラー分類、ID、invocation
//! - **ports**: 外部サービスの抽象化（BlobStore, CoordinationStore, ExecutionHistory, Clock, IdGenerator）
//! - **impls**: ports の in-memory 実装（テスト・ローカル実行用）
//! - **config / services**: 環境変数からの設定と、ports をまとめた handle
//! - **retry**: throttle された呼び出しの backoff
//! - **template**: JSONPath テンプレートの解決（PathResolver）
//! - **message**: message envelope protocol（offload / reload / config / outputs）
//! - **concurrency**: 分散 Semaphore / Mutex
//! - **context**: ExecutionContext（state machine / stdin / inline）
//! - **app**: TaskOrchestrator と Task API

pub mod app;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod domain;
pub mod impls;
pub mod message;
pub mod ports;
pub mod retry;
pub mod services;
pub mod template;

pub use app::{Task, TaskOrchestrator, TaskRegistry, TaskRun, TypedTask};
pub use config::CoreConfig;
pub use domain::{CirrusError, Invocation, Result, WorkflowErrorKind};
pub use services::Services;
