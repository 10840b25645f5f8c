//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::{EventKey, InvocationId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は調整なしで複数 worker から生成できる ID を作る
pub trait IdGenerator: Send + Sync {
    /// Key for an offloaded envelope (`events/<ulid>`).
    fn generate_event_key(&self) -> EventKey;

    fn generate_invocation_id(&self) -> InvocationId;

    /// Bare ULID for ad-hoc blob keys.
    fn generate_ulid(&self) -> Ulid;
}

/// Clock の現在時刻を timestamp 部分に使う ULID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_event_key(&self) -> EventKey {
        EventKey::from(self.generate_ulid())
    }

    fn generate_invocation_id(&self) -> InvocationId {
        InvocationId::from(self.generate_ulid())
    }

    fn generate_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
