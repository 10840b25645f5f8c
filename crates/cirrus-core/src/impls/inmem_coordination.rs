//! InMemoryCoordinationStore - 開発用の条件付き KV
//!
//! 全操作を 1 つの Mutex の中で行うので、同一キーへの書き込みは自然に直列化される。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{Condition, CoordinationStore, Item, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryCoordinationStore {
    items: Mutex<HashMap<String, Item>>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one attribute without going through the trait (test helper).
    pub async fn attribute(&self, key: &str, attribute: &str) -> Option<i64> {
        self.items
            .lock()
            .await
            .get(key)
            .and_then(|item| item.get(attribute).copied())
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn create_if_absent(&self, key: &str, item: Item) -> Result<bool, StoreError> {
        let mut items = self.items.lock().await;
        if items.contains_key(key) {
            return Ok(false);
        }
        items.insert(key.to_string(), item);
        Ok(true)
    }

    async fn conditional_increment(
        &self,
        key: &str,
        attribute: &str,
        delta: i64,
        condition: Condition,
    ) -> Result<i64, StoreError> {
        let mut items = self.items.lock().await;

        // 存在しないレコード・属性は 0 として評価する
        let mut current = items.get(key).cloned().unwrap_or_default();
        current.entry(attribute.to_string()).or_insert(0);

        if !condition.evaluate(Some(&current)) {
            return Err(StoreError::ConditionFailed {
                key: key.to_string(),
            });
        }

        let entry = items.entry(key.to_string()).or_default();
        let value = entry.entry(attribute.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn conditional_put(
        &self,
        key: &str,
        item: Item,
        condition: Condition,
    ) -> Result<(), StoreError> {
        let mut items = self.items.lock().await;
        if !condition.evaluate(items.get(key)) {
            return Err(StoreError::ConditionFailed {
                key: key.to_string(),
            });
        }
        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}
