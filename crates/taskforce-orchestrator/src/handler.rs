use crate::matcher::CapabilityMatcher;
use crate::registry::HandlerDefinition;
use crate::types::{Analysis, Artifact, WorkOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskforce_core::{CapabilitySet, TaskforceResult, WorkUnit};

/// Introspection descriptor returned by [`Handler::capabilities`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerCapabilities {
    pub name: String,
    pub role: String,
    pub description: String,
    pub expertise: Vec<String>,
    pub collaborators: Vec<String>,
    pub allowed_capabilities: CapabilitySet,
}

impl From<&HandlerDefinition> for HandlerCapabilities {
    fn from(definition: &HandlerDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            role: definition.role.clone(),
            description: definition.description.clone(),
            expertise: definition.expertise_tags.clone(),
            collaborators: definition.collaborator_hints.clone(),
            allowed_capabilities: definition.allowed_capabilities.clone(),
        }
    }
}

/// Contract every registered handler implements.
///
/// Only `definition` and `work` are required; matching and introspection
/// default to the generic matcher and the static definition.
#[async_trait]
pub trait Handler: Send + Sync {
    fn definition(&self) -> &HandlerDefinition;

    /// Produce output for `unit`. Errors fail the run, they never escape it.
    async fn work(&self, unit: &WorkUnit, analysis: &Analysis) -> TaskforceResult<WorkOutput>;

    fn can_handle(&self, unit: &WorkUnit, matcher: &CapabilityMatcher) -> bool {
        matcher.can_handle(self.definition(), unit)
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::from(self.definition())
    }
}

/// Handler driven entirely by its definition.
///
/// Produces a templated summary, a `report` artifact describing the chosen
/// approach, and an `effort_minutes` metric.
#[derive(Debug, Clone)]
pub struct ConfiguredHandler {
    definition: HandlerDefinition,
}

impl ConfiguredHandler {
    pub fn new(definition: HandlerDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait]
impl Handler for ConfiguredHandler {
    fn definition(&self) -> &HandlerDefinition {
        &self.definition
    }

    async fn work(&self, unit: &WorkUnit, analysis: &Analysis) -> TaskforceResult<WorkOutput> {
        let def = &self.definition;
        let mut report = format!(
            "# {}\n\nHandler: {} ({})\nComplexity: {} ({})\nApproach: {}\n",
            unit.description,
            def.name,
            def.role,
            analysis.complexity_class,
            analysis.estimated_effort,
            analysis.approach,
        );
        if !analysis.risks.is_empty() {
            report.push_str("\nRisks:\n");
            for risk in &analysis.risks {
                report.push_str(&format!("- {risk}\n"));
            }
        }

        Ok(WorkOutput::new(format!(
            "{} completed {} work: {}",
            def.name, def.role, unit.description
        ))
        .with_artifact(Artifact::new(
            "report",
            format!("{}-report.md", def.name),
            report,
        ))
        .with_metric("effort_minutes", f64::from(analysis.estimated_minutes)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::ComplexityClass;

    fn analysis() -> Analysis {
        Analysis {
            complexity_class: ComplexityClass::High,
            estimated_effort: "2 hours".into(),
            estimated_minutes: 120,
            approach: "Decompose into increments".into(),
            requires_collaboration: false,
            collaborators: vec![],
            risks: vec!["Scope may grow".into()],
        }
    }

    #[tokio::test]
    async fn test_configured_handler_output() {
        let handler = ConfiguredHandler::new(
            HandlerDefinition::new("backend-engineer", "backend")
                .with_description("Builds services"),
        );
        let unit = WorkUnit::new("Build a complex billing API");
        let out = handler.work(&unit, &analysis()).await.unwrap();

        assert!(out.output.contains("backend-engineer"));
        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.artifacts[0].kind, "report");
        assert_eq!(out.artifacts[0].name, "backend-engineer-report.md");
        assert!(out.artifacts[0].content.contains("Scope may grow"));
        assert_eq!(out.metrics["effort_minutes"], 120.0);
    }

    #[test]
    fn test_capabilities_descriptor() {
        let handler = ConfiguredHandler::new(
            HandlerDefinition::new("qa-engineer", "qa")
                .with_expertise(["testing"])
                .with_collaborators(["backend"])
                .with_capabilities(CapabilitySet::from_tags(["ci.trigger"])),
        );
        let caps = handler.capabilities();
        assert_eq!(caps.role, "qa");
        assert_eq!(caps.collaborators, vec!["backend"]);
        assert!(caps.allowed_capabilities.allows("ci.trigger"));
        assert!(!caps.allowed_capabilities.allows("prod.deploy"));
    }

    #[test]
    fn test_default_can_handle_uses_matcher() {
        let handler = ConfiguredHandler::new(HandlerDefinition::new("qa-engineer", "qa"));
        let matcher = CapabilityMatcher::default();
        assert!(handler.can_handle(&WorkUnit::new("x").with_role("qa"), &matcher));
        assert!(!handler.can_handle(&WorkUnit::new("x").with_role("backend"), &matcher));
    }
}
