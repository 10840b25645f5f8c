//! Services - worker が触る外部サービス一式

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::ports::{BlobStore, Clock, CoordinationStore, ExecutionHistory, IdGenerator};

/// Handles to every external collaborator, cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub blob: Arc<dyn BlobStore>,
    pub coordination: Arc<dyn CoordinationStore>,
    pub history: Arc<dyn ExecutionHistory>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub config: CoreConfig,
}

impl Services {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        coordination: Arc<dyn CoordinationStore>,
        history: Arc<dyn ExecutionHistory>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: CoreConfig,
    ) -> Self {
        Self {
            blob,
            coordination,
            history,
            clock,
            ids,
            config,
        }
    }
}
