//! A default, in-memory `WorkflowRegistry` backed by a map of already-loaded
//! documents. Callers with a registry service (a database, a directory of
//! files) implement `WorkflowRegistry` themselves; this is the harness's
//! batteries-included option.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use hyperagent_types::WorkflowDocument;

use crate::collaborators::WorkflowRegistry;

#[derive(Default)]
pub struct InMemoryWorkflowRegistry {
    documents: RwLock<HashMap<String, WorkflowDocument>>,
}

impl InMemoryWorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, document: WorkflowDocument) {
        self.documents.write().expect("registry lock poisoned").insert(document.id.clone(), document);
    }
}

#[async_trait]
impl WorkflowRegistry for InMemoryWorkflowRegistry {
    async fn resolve(&self, workflow_id: &str) -> Option<WorkflowDocument> {
        self.documents.read().expect("registry lock poisoned").get(workflow_id).cloned()
    }
}
