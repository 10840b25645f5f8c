//! Concurrency - 条件付き書き込みだけで作る分散 Semaphore / Mutex
//!
//! プロセス間でメモリは共有しない。排他・上限の保証は全て
//! [`CoordinationStore`](crate::ports::CoordinationStore) の単一キー原子性に依存する。

pub mod mutex;
pub mod semaphore;

pub use self::mutex::Mutex;
pub use self::semaphore::Semaphore;
