use crate::handler::{ConfiguredHandler, Handler};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use taskforce_core::{CapabilitySet, TaskforceError, TaskforceResult};
use tracing::info;

/// Static descriptor of a registered handler. Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDefinition {
    /// Unique identity.
    pub name: String,
    /// Category tag used for role matching and team assembly.
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expertise_tags: Vec<String>,
    /// Roles this handler typically pulls in when collaboration is needed.
    #[serde(default)]
    pub collaborator_hints: Vec<String>,
    /// Description words that signal this handler needs its collaborators.
    #[serde(default)]
    pub collaboration_triggers: Vec<String>,
    #[serde(default = "CapabilitySet::unrestricted")]
    pub allowed_capabilities: CapabilitySet,
}

impl HandlerDefinition {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            description: String::new(),
            expertise_tags: Vec::new(),
            collaborator_hints: Vec::new(),
            collaboration_triggers: Vec::new(),
            allowed_capabilities: CapabilitySet::unrestricted(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expertise<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collaborators<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborator_hints = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_triggers<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaboration_triggers = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.allowed_capabilities = capabilities;
        self
    }
}

/// Central registry of available handlers.
///
/// Populated once at startup (registration takes `&mut self`) and then shared
/// behind an `Arc` for lock-free concurrent reads.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
    by_name: HashMap<String, usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build a registry of [`ConfiguredHandler`]s from plain definitions.
    pub fn from_definitions(definitions: Vec<HandlerDefinition>) -> TaskforceResult<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register_definition(definition)?;
        }
        Ok(registry)
    }

    /// Register a handler. Fails if its name is already taken.
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> TaskforceResult<()> {
        let definition = handler.definition();
        if self.by_name.contains_key(&definition.name) {
            return Err(TaskforceError::DuplicateHandler(definition.name.clone()));
        }
        info!(handler = %definition.name, role = %definition.role, "Registered handler");
        self.by_name
            .insert(definition.name.clone(), self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Register a definition backed by the default templated handler.
    pub fn register_definition(&mut self, definition: HandlerDefinition) -> TaskforceResult<()> {
        self.register(Arc::new(ConfiguredHandler::new(definition)))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.by_name.get(name).map(|&i| &self.handlers[i])
    }

    pub fn lookup(&self, name: &str) -> TaskforceResult<Arc<dyn Handler>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| TaskforceError::HandlerNotFound(name.to_string()))
    }

    /// Snapshot of all handlers in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.clone()
    }

    pub fn definitions(&self) -> Vec<&HandlerDefinition> {
        self.handlers.iter().map(|h| h.definition()).collect()
    }

    /// First registered handler carrying `role`.
    pub fn find_by_role(&self, role: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .iter()
            .find(|h| h.definition().role == role)
            .cloned()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.handlers.iter().any(|h| h.definition().role == role)
    }

    /// Distinct roles in registration order.
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for handler in &self.handlers {
            let role = &handler.definition().role;
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        roles
    }

    /// Roles from `roles` that no registered handler carries.
    pub fn missing_roles<S: AsRef<str>>(&self, roles: &[S]) -> Vec<String> {
        roles
            .iter()
            .map(AsRef::as_ref)
            .filter(|role| !self.has_role(role))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
