use crate::analyzer::AnalyzerConfig;
use crate::invocation::InvocationPolicy;
use crate::profiles::{default_definitions, default_keywords, default_quality_rules};
use crate::quality::QualityRule;
use crate::registry::{HandlerDefinition, HandlerRegistry};
use crate::team::TeamPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use taskforce_core::{TaskforceError, TaskforceResult};

/// Deadlines and nesting limits for runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_work_timeout_secs")]
    pub work_timeout_secs: u64,
    #[serde(default = "default_collaboration_timeout_secs")]
    pub collaboration_timeout_secs: u64,
    #[serde(default = "default_max_collaboration_depth")]
    pub max_collaboration_depth: u32,
}

impl LifecycleConfig {
    pub fn work_timeout(&self) -> Duration {
        Duration::from_secs(self.work_timeout_secs)
    }

    pub fn collaboration_timeout(&self) -> Duration {
        Duration::from_secs(self.collaboration_timeout_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            work_timeout_secs: default_work_timeout_secs(),
            collaboration_timeout_secs: default_collaboration_timeout_secs(),
            max_collaboration_depth: default_max_collaboration_depth(),
        }
    }
}

fn default_work_timeout_secs() -> u64 {
    300
}

fn default_collaboration_timeout_secs() -> u64 {
    120
}

fn default_max_collaboration_depth() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Role → description keywords. Roles listed here replace the catalog's
    /// list for that role; every other role keeps its catalog keywords. An
    /// empty list turns keyword matching off for that role.
    #[serde(default = "default_keywords", deserialize_with = "merge_over_defaults")]
    pub keywords: HashMap<String, Vec<String>>,
}

fn merge_over_defaults<'de, D>(deserializer: D) -> Result<HashMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = HashMap::<String, Vec<String>>::deserialize(deserializer)?;
    let mut keywords = default_keywords();
    keywords.extend(overrides);
    Ok(keywords)
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_quality_rules")]
    pub rules: Vec<QualityRule>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            rules: default_quality_rules(),
        }
    }
}

/// Top-level orchestrator configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub team: TeamPolicy,
    #[serde(default)]
    pub invocation: InvocationPolicy,
    /// Empty means the built-in catalog.
    #[serde(default)]
    pub handlers: Vec<HandlerDefinition>,
}

impl OrchestratorConfig {
    pub fn from_toml_str(content: &str) -> TaskforceResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| TaskforceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> TaskforceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskforceError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> TaskforceResult<()> {
        if self.lifecycle.work_timeout_secs == 0 || self.lifecycle.collaboration_timeout_secs == 0 {
            return Err(TaskforceError::Config("lifecycle timeouts must be non-zero".into()));
        }
        self.team.validate()?;
        for rule in &self.quality.rules {
            rule.to_predicate()?;
        }
        Ok(())
    }

    /// Configured handlers, or the built-in catalog when none are listed.
    pub fn handler_definitions(&self) -> Vec<HandlerDefinition> {
        if self.handlers.is_empty() {
            default_definitions()
        } else {
            self.handlers.clone()
        }
    }

    pub fn build_registry(&self) -> TaskforceResult<HandlerRegistry> {
        HandlerRegistry::from_definitions(self.handler_definitions())
    }
}
