use crate::registry::HandlerDefinition;
use crate::types::{Analysis, Artifact, ComplexityClass, Priority, Recommendation};
use serde::{Deserialize, Serialize};
use taskforce_core::WorkUnit;

/// Effort attached to one complexity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortEstimate {
    pub label: String,
    pub minutes: u32,
}

impl EffortEstimate {
    fn new(label: &str, minutes: u32) -> Self {
        Self {
            label: label.to_string(),
            minutes,
        }
    }
}

/// Default effort per complexity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortTable {
    #[serde(default = "default_low_effort")]
    pub low: EffortEstimate,
    #[serde(default = "default_medium_effort")]
    pub medium: EffortEstimate,
    #[serde(default = "default_high_effort")]
    pub high: EffortEstimate,
}

impl EffortTable {
    pub fn for_class(&self, class: ComplexityClass) -> &EffortEstimate {
        match class {
            ComplexityClass::Low => &self.low,
            ComplexityClass::Medium => &self.medium,
            ComplexityClass::High => &self.high,
        }
    }
}

impl Default for EffortTable {
    fn default() -> Self {
        Self {
            low: default_low_effort(),
            medium: default_medium_effort(),
            high: default_high_effort(),
        }
    }
}

fn default_low_effort() -> EffortEstimate {
    EffortEstimate::new("10 minutes", 10)
}

fn default_medium_effort() -> EffortEstimate {
    EffortEstimate::new("30 minutes", 30)
}

fn default_high_effort() -> EffortEstimate {
    EffortEstimate::new("2 hours", 120)
}

/// Signal vocabulary used by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_low_signals")]
    pub low_signals: Vec<String>,
    #[serde(default = "default_high_signals")]
    pub high_signals: Vec<String>,
    /// Global words that always signal collaboration, on top of each
    /// handler's own triggers.
    #[serde(default = "default_collaboration_signals")]
    pub collaboration_signals: Vec<String>,
    #[serde(default)]
    pub effort: EffortTable,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            low_signals: default_low_signals(),
            high_signals: default_high_signals(),
            collaboration_signals: default_collaboration_signals(),
            effort: EffortTable::default(),
        }
    }
}

fn default_low_signals() -> Vec<String> {
    vec!["simple".into(), "basic".into()]
}

fn default_high_signals() -> Vec<String> {
    vec!["complex".into(), "advanced".into()]
}

fn default_collaboration_signals() -> Vec<String> {
    vec!["collaborate".into(), "coordinate".into()]
}

/// Derives an [`Analysis`] from a work unit's description.
///
/// Never fails: an empty or ambiguous description degrades to medium
/// complexity, no collaboration, and a generic approach.
#[derive(Debug, Clone, Default)]
pub struct TaskAnalyzer {
    config: AnalyzerConfig,
}

impl TaskAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, unit: &WorkUnit, handler: &HandlerDefinition) -> Analysis {
        let description = unit.normalized_description();
        let description = description.trim();

        if description.is_empty() {
            let effort = self.config.effort.for_class(ComplexityClass::Medium);
            return Analysis {
                complexity_class: ComplexityClass::Medium,
                estimated_effort: effort.label.clone(),
                estimated_minutes: effort.minutes,
                approach: format!(
                    "Clarify the request, then proceed with a standard {} approach",
                    handler.role
                ),
                requires_collaboration: false,
                collaborators: Vec::new(),
                risks: vec!["Description is empty or ambiguous".to_string()],
            };
        }

        let complexity = self.classify(description);
        let effort = self.config.effort.for_class(complexity);

        let signalled = mentions_any(description, &self.config.collaboration_signals)
            || mentions_any(description, &handler.collaboration_triggers);
        let mut collaborators: Vec<String> = Vec::new();
        if signalled {
            for role in &handler.collaborator_hints {
                if role != &handler.role && !collaborators.contains(role) {
                    collaborators.push(role.clone());
                }
            }
        }
        let requires_collaboration = !collaborators.is_empty();

        let mut risks = Vec::new();
        if complexity == ComplexityClass::High {
            risks.push(format!(
                "High complexity may push the work past its {} estimate",
                effort.label
            ));
        }
        if requires_collaboration {
            risks.push(format!(
                "Depends on {} collaborator role(s): {}",
                collaborators.len(),
                collaborators.join(", ")
            ));
        } else if signalled {
            risks.push(format!(
                "Collaboration was signalled but {} declares no collaborators",
                handler.name
            ));
        }

        Analysis {
            complexity_class: complexity,
            estimated_effort: effort.label.clone(),
            estimated_minutes: effort.minutes,
            approach: approach(complexity, &handler.role, &collaborators),
            requires_collaboration,
            collaborators,
            risks,
        }
    }

    /// High signals win over low ones when both are present.
    fn classify(&self, description: &str) -> ComplexityClass {
        if mentions_any(description, &self.config.high_signals) {
            ComplexityClass::High
        } else if mentions_any(description, &self.config.low_signals) {
            ComplexityClass::Low
        } else {
            ComplexityClass::Medium
        }
    }

    /// Follow-up recommendations for a finished piece of work.
    pub fn recommend(&self, analysis: &Analysis, artifacts: &[Artifact]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if analysis.complexity_class == ComplexityClass::High {
            recommendations.push(Recommendation {
                kind: "decomposition".into(),
                priority: Priority::High,
                description: "Split the work into independently verifiable increments".into(),
                reasoning: "Complexity was classified as high".into(),
            });
        }
        if analysis.requires_collaboration {
            recommendations.push(Recommendation {
                kind: "coordination".into(),
                priority: Priority::Medium,
                description: format!("Coordinate with {}", analysis.collaborators.join(", ")),
                reasoning: "The description signals cross-cutting concerns".into(),
            });
        }
        if artifacts.is_empty() {
            recommendations.push(Recommendation {
                kind: "documentation".into(),
                priority: Priority::Low,
                description: "Attach an artifact describing the delivered work".into(),
                reasoning: "No artifact was produced".into(),
            });
        }
        for risk in &analysis.risks {
            recommendations.push(Recommendation {
                kind: "risk".into(),
                priority: Priority::Medium,
                description: format!("Mitigate: {risk}"),
                reasoning: "Identified during analysis".into(),
            });
        }

        recommendations
    }
}

fn mentions_any(description: &str, words: &[String]) -> bool {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .any(|w| !w.is_empty() && description.contains(&w))
}

fn approach(complexity: ComplexityClass, role: &str, collaborators: &[String]) -> String {
    let with = collaborators.join(", ");
    match (complexity, collaborators.is_empty()) {
        (ComplexityClass::Low, true) => format!("Apply a standard {role} pattern directly"),
        (ComplexityClass::Low, false) => {
            format!("Apply a standard {role} pattern and loop in {with}")
        }
        (ComplexityClass::Medium, true) => {
            "Plan briefly, then implement and verify in one pass".to_string()
        }
        (ComplexityClass::Medium, false) => {
            format!("Implement the core and have {with} cover their parts")
        }
        (ComplexityClass::High, true) => {
            "Break the work into increments and validate each before integrating".to_string()
        }
        (ComplexityClass::High, false) => {
            format!("Break the work into increments and coordinate each with {with}")
        }
    }
}
