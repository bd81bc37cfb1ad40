//! The session manager: resolves or lazily creates a session for an agent
//! step's role, per SPEC_FULL.md §4.7. Sessions are cached by `(sessionDir,
//! role)` for the lifetime of a run: a small in-memory cache keyed off
//! run-scoped identity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use hyperagent_types::{RoleDefinition, SessionRoleDeclaration};

use crate::collaborators::{SessionOptions, SessionProvider};
use crate::error::WorkflowError;
use crate::scope::Scope;
use crate::template::render;

pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    session_dir: String,
    cache: HashMap<String, String>,
    registered: HashSet<String>,
}

/// A session resolved for a role, along with the session name that was
/// used to look it up (recorded into provenance as `name`).
pub struct ResolvedSession {
    pub session_id: String,
    pub name: String,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn SessionProvider>, session_dir: impl Into<String>) -> Self {
        Self { provider, session_dir: session_dir.into(), cache: HashMap::new(), registered: HashSet::new() }
    }

    /// Ensures every declared role in `sessions.roles` has a session,
    /// creating as needed. Returns the resolved sessions in declaration
    /// order so the caller can record `agents[]` provenance entries.
    pub async fn bootstrap(
        &mut self,
        declarations: &[SessionRoleDeclaration],
        roles: &IndexMap<String, RoleDefinition>,
        model: &str,
        scope: &Scope,
    ) -> Result<Vec<(String, ResolvedSession)>, WorkflowError> {
        let mut resolved = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let role_def = roles
                .get(&declaration.role)
                .ok_or_else(|| WorkflowError::schema(format!("sessions.roles references unknown role '{}'", declaration.role)))?;
            let session = self
                .resolve_for_role(&declaration.role, role_def, model, declaration.name_template.as_deref(), scope)
                .await?;
            resolved.push((declaration.role.clone(), session));
        }
        Ok(resolved)
    }

    /// Resolves (creating if necessary) the session for `role`. Used both
    /// by `bootstrap` and lazily by the agent executor for roles that were
    /// never declared under `sessions.roles`. Registers `role_def`'s system
    /// prompt and tool permissions with the provider before the session is
    /// looked up or created, the first time this role is resolved, per
    /// SPEC_FULL.md §4.7.
    pub async fn resolve_for_role(
        &mut self,
        role: &str,
        role_def: &RoleDefinition,
        model: &str,
        name_template: Option<&str>,
        scope: &Scope,
    ) -> Result<ResolvedSession, WorkflowError> {
        if let Some(existing) = self.cache.get(role) {
            return Ok(ResolvedSession { session_id: existing.clone(), name: role.to_string() });
        }

        self.ensure_registered(role, role_def, model).await?;

        let name = match name_template {
            Some(template) => render(template, scope)?,
            None => format!("{}.{role}", scope.run_id),
        };

        let existing_sessions = self.provider.list_sessions(&self.session_dir).await?;
        let session_id = if existing_sessions.contains(&name) {
            name.clone()
        } else {
            self.provider
                .create_session(&self.session_dir, SessionOptions { name: Some(name.clone()) })
                .await?
        };

        self.cache.insert(role.to_string(), session_id.clone());
        Ok(ResolvedSession { session_id, name })
    }

    /// Registers `role`'s definition (system prompt, tool permissions) with
    /// the provider and invalidates its cached listing for the session
    /// directory, the mandatory `invalidate` call documented in
    /// SPEC_FULL.md §9. A no-op after the first call for a given role.
    async fn ensure_registered(&mut self, role: &str, role_def: &RoleDefinition, model: &str) -> Result<(), WorkflowError> {
        if self.registered.contains(role) {
            return Ok(());
        }
        self.provider
            .register_agent_definition(&self.session_dir, role, model, &role_def.system_prompt, role_def.tools)
            .await?;
        self.provider.invalidate(&self.session_dir).await?;
        self.registered.insert(role.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MessageDiff, MessagePart};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct StubProvider {
        existing: Mutex<Vec<String>>,
        created: Mutex<Vec<String>>,
        registered: Mutex<Vec<(String, hyperagent_types::ToolPermissions)>>,
        invalidated: Mutex<u32>,
    }

    impl StubProvider {
        fn new(existing: Vec<String>) -> Self {
            Self { existing: Mutex::new(existing), created: Mutex::new(vec![]), registered: Mutex::new(vec![]), invalidated: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl SessionProvider for StubProvider {
        async fn create_session(&self, _dir: &str, opts: SessionOptions) -> Result<String, WorkflowError> {
            let name = opts.name.unwrap_or_default();
            self.created.lock().unwrap().push(name.clone());
            self.existing.lock().unwrap().push(name.clone());
            Ok(name)
        }
        async fn list_sessions(&self, _dir: &str) -> Result<Vec<String>, WorkflowError> {
            Ok(self.existing.lock().unwrap().clone())
        }
        async fn prompt(
            &self, _session: &str, _parts: Vec<MessagePart>, _model: &str, _agent_name: Option<&str>,
            _cancel: CancellationToken,
        ) -> Result<Vec<MessagePart>, WorkflowError> {
            unimplemented!()
        }
        async fn message_diff(&self, _session: &str, _message_id: &str) -> Result<MessageDiff, WorkflowError> {
            unimplemented!()
        }
        async fn register_agent_definition(
            &self, _dir: &str, name: &str, _model: &str, _system_prompt: &str, tools: hyperagent_types::ToolPermissions,
        ) -> Result<(), WorkflowError> {
            self.registered.lock().unwrap().push((name.to_string(), tools));
            Ok(())
        }
        async fn invalidate(&self, _dir: &str) -> Result<(), WorkflowError> {
            *self.invalidated.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn role_def(bash: bool) -> RoleDefinition {
        RoleDefinition {
            system_prompt: "you write code".to_string(),
            parser: "unknown".to_string(),
            tools: hyperagent_types::ToolPermissions { bash, ..Default::default() },
        }
    }

    #[tokio::test]
    async fn creates_a_session_on_first_resolution_and_reuses_it() {
        let provider = Arc::new(StubProvider::new(vec![]));
        let mut manager = SessionManager::new(provider.clone(), "/tmp/demo");
        let scope = Scope::new(Value::Null, "run-1", 1);
        let role_def = role_def(true);

        let first = manager.resolve_for_role("worker", &role_def, "gpt-5", None, &scope).await.unwrap();
        let second = manager.resolve_for_role("worker", &role_def, "gpt-5", None, &scope).await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(provider.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reuses_an_existing_provider_session_by_rendered_name() {
        let provider = Arc::new(StubProvider::new(vec!["run-1.worker".to_string()]));
        let mut manager = SessionManager::new(provider.clone(), "/tmp/demo");
        let scope = Scope::new(Value::Null, "run-1", 1);
        let role_def = role_def(false);

        let session = manager.resolve_for_role("worker", &role_def, "gpt-5", Some("{{run.id}}.worker"), &scope).await.unwrap();
        assert_eq!(session.session_id, "run-1.worker");
        assert!(provider.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registers_tool_permissions_and_invalidates_once_per_role() {
        let provider = Arc::new(StubProvider::new(vec![]));
        let mut manager = SessionManager::new(provider.clone(), "/tmp/demo");
        let scope = Scope::new(Value::Null, "run-1", 1);
        let role_def = role_def(true);

        manager.resolve_for_role("worker", &role_def, "gpt-5", None, &scope).await.unwrap();
        manager.resolve_for_role("worker", &role_def, "gpt-5", None, &scope).await.unwrap();

        let registered = provider.registered.lock().unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].0, "worker");
        assert!(registered[0].1.bash);
        assert_eq!(*provider.invalidated.lock().unwrap(), 1);
    }
}
