//! TaskRegistry - 名前で Task を引けるようにする
//!
//! `HashMap<String, Arc<dyn Task>>` で型消去された Task を管理する。

use std::collections::HashMap;
use std::sync::Arc;

use super::task::{Task, Typed, TypedTask};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: impl Task + 'static) -> Result<(), RegistryError> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.tasks.insert(name, Arc::new(task));
        Ok(())
    }

    pub fn register_typed<T: TypedTask + 'static>(&mut self, task: T) -> Result<(), RegistryError> {
        self.register(Typed(task))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskRun;
    use crate::domain::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Named(&'static str);

    #[async_trait]
    impl Task for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _run: &TaskRun<'_>) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = TaskRegistry::new();
        registry.register(Named("b")).unwrap();
        registry.register(Named("a")).unwrap();

        assert_eq!(registry.get("a").unwrap().name(), "a");
        assert!(registry.get("c").is_none());
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register(Named("a")).unwrap();
        let err = registry.register(Named("a")).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(name) if name == "a"));
    }
}
