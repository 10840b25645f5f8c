//! CoordinationStore port - 条件付き書き込みができる KV ストア
//!
//! Semaphore と Mutex はこの trait の原子性だけに依存する。
//! DynamoDB の conditional write 相当の操作を最小限に切り出したもの。

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// Integer attributes of one record, keyed by attribute name.
///
/// Semaphore records carry `value`; mutex records carry `expire` (epoch-ms).
pub type Item = BTreeMap<String, i64>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conditional write on {key} was rejected")]
    ConditionFailed { key: String },

    #[error("coordination store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StoreError::ConditionFailed { .. })
    }
}

/// Precondition evaluated atomically with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// No record exists under the key.
    NotExists,
    /// `attribute <= value`. False when the attribute is missing.
    AtMost { attribute: String, value: i64 },
    /// `attribute < value`. False when the attribute is missing.
    LessThan { attribute: String, value: i64 },
    Either(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn at_most(attribute: impl Into<String>, value: i64) -> Self {
        Condition::AtMost {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn less_than(attribute: impl Into<String>, value: i64) -> Self {
        Condition::LessThan {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Either(Box::new(self), Box::new(other))
    }

    /// Evaluate against the current record (`None` when absent).
    ///
    /// Backends that cannot push conditions down can use this directly while
    /// holding their per-key lock.
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        match self {
            Condition::Always => true,
            Condition::NotExists => item.is_none(),
            Condition::AtMost { attribute, value } => item
                .and_then(|i| i.get(attribute))
                .is_some_and(|current| current <= value),
            Condition::LessThan { attribute, value } => item
                .and_then(|i| i.get(attribute))
                .is_some_and(|current| current < value),
            Condition::Either(a, b) => a.evaluate(item) || b.evaluate(item),
        }
    }
}

/// Atomic single-key operations.
///
/// Concurrent writes to the same key must serialize; nothing is promised
/// across keys.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Item>, StoreError>;

    /// Create `item` unless a record already exists. Returns whether it was created.
    async fn create_if_absent(&self, key: &str, item: Item) -> Result<bool, StoreError>;

    /// Add `delta` to `attribute` if `condition` holds, returning the new value.
    ///
    /// This is an upsert: a missing record or attribute counts as 0, both for
    /// the condition and for the addition.
    async fn conditional_increment(
        &self,
        key: &str,
        attribute: &str,
        delta: i64,
        condition: Condition,
    ) -> Result<i64, StoreError>;

    /// Replace the whole record if `condition` holds.
    async fn conditional_put(
        &self,
        key: &str,
        item: Item,
        condition: Condition,
    ) -> Result<(), StoreError>;

    /// Unconditional delete; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(attr: &str, v: i64) -> Item {
        Item::from([(attr.to_string(), v)])
    }

    #[test]
    fn conditions_on_missing_records() {
        assert!(Condition::Always.evaluate(None));
        assert!(Condition::NotExists.evaluate(None));
        assert!(!Condition::at_most("value", 3).evaluate(None));
        assert!(!Condition::less_than("expire", 3).evaluate(None));
    }

    #[test]
    fn comparison_conditions() {
        let rec = item("value", 3);
        assert!(Condition::at_most("value", 3).evaluate(Some(&rec)));
        assert!(!Condition::at_most("value", 2).evaluate(Some(&rec)));
        assert!(!Condition::less_than("value", 3).evaluate(Some(&rec)));
        assert!(!Condition::NotExists.evaluate(Some(&rec)));
    }

    #[test]
    fn either_is_a_disjunction() {
        let expired_or_absent = Condition::NotExists.or(Condition::less_than("expire", 100));
        assert!(expired_or_absent.evaluate(None));
        assert!(expired_or_absent.evaluate(Some(&item("expire", 99))));
        assert!(!expired_or_absent.evaluate(Some(&item("expire", 100))));
    }
}
