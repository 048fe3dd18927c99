use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Explicit requirements a caller attaches to a [`WorkUnit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// Role tag the caller wants to handle the work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expertise the handler should declare (case-insensitive substring match).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expertise: Vec<String>,
}

/// A single requested piece of work.
///
/// Read-only once submitted; the orchestrator only ever clones it or derives
/// new units from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    pub id: Uuid,
    pub description: String,
    #[serde(default)]
    pub requirements: Requirements,
    /// Opaque key/value bag passed through to the handler.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl WorkUnit {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            requirements: Requirements::default(),
            context: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.requirements.role = Some(role.into());
        self
    }

    pub fn with_expertise<I, S>(mut self, expertise: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements.expertise = expertise.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Lower-cased description, used by the keyword heuristics.
    pub fn normalized_description(&self) -> String {
        self.description.to_lowercase()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_work_unit_builder() {
        let unit = WorkUnit::new("Build a simple login form")
            .with_role("frontend")
            .with_expertise(["react", "forms"])
            .with_context("ticket", serde_json::json!("WEB-12"));
        assert_eq!(unit.requirements.role.as_deref(), Some("frontend"));
        assert_eq!(unit.requirements.expertise, vec!["react", "forms"]);
        assert_eq!(unit.context["ticket"], "WEB-12");
        assert_eq!(unit.normalized_description(), "build a simple login form");
    }

    #[test]
    fn test_work_unit_ids_are_unique() {
        let a = WorkUnit::new("a");
        let b = WorkUnit::new("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_work_unit_json_shape() {
        let unit = WorkUnit::new("Expose an API").with_role("backend");
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["requirements"]["role"], "backend");
        assert!(json.get("createdAt").is_some());
        assert!(json["requirements"].get("expertise").is_none());

        let parsed: WorkUnit = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id, unit.id);
    }

    #[test]
    fn test_requirements_default_when_missing() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "description": "anything",
            "createdAt": Utc::now(),
        });
        let unit: WorkUnit = serde_json::from_value(json).unwrap();
        assert!(unit.requirements.role.is_none());
        assert!(unit.context.is_empty());
    }
}
