use crate::registry::HandlerRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use taskforce_core::{TaskforceError, TaskforceResult};
use tracing::debug;

/// Number of dot-separated positions in a feature identifier.
pub const IDENTIFIER_ARITY: usize = 6;
/// Largest value a single position may carry.
pub const MAX_POSITION_VALUE: u8 = 9;

/// The complexity-related positions that follow the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Primary,
    Secondary,
    Tertiary,
    Maturity,
    Criticality,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::Primary,
        Position::Secondary,
        Position::Tertiary,
        Position::Maturity,
        Position::Criticality,
    ];
}

/// `domain.primary.secondary.tertiary.maturity.criticality`, each 0-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureIdentifier {
    pub domain: u8,
    pub primary: u8,
    pub secondary: u8,
    pub tertiary: u8,
    pub maturity: u8,
    pub criticality: u8,
}

impl FeatureIdentifier {
    pub fn value(&self, position: Position) -> u8 {
        match position {
            Position::Primary => self.primary,
            Position::Secondary => self.secondary,
            Position::Tertiary => self.tertiary,
            Position::Maturity => self.maturity,
            Position::Criticality => self.criticality,
        }
    }

    /// Copy with one complexity position replaced, clamped to the valid range.
    pub fn with(mut self, position: Position, value: u8) -> Self {
        let value = value.min(MAX_POSITION_VALUE);
        match position {
            Position::Primary => self.primary = value,
            Position::Secondary => self.secondary = value,
            Position::Tertiary => self.tertiary = value,
            Position::Maturity => self.maturity = value,
            Position::Criticality => self.criticality = value,
        }
        self
    }
}

impl FromStr for FeatureIdentifier {
    type Err = TaskforceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TaskforceError::InvalidIdentifier(format!("'{s}': {reason}"));

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != IDENTIFIER_ARITY {
            return Err(invalid(&format!(
                "expected {IDENTIFIER_ARITY} positions, found {}",
                parts.len()
            )));
        }

        let mut values = [0u8; IDENTIFIER_ARITY];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.len() != 1 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(&format!(
                    "position '{part}' is not a digit 0-{MAX_POSITION_VALUE}"
                )));
            }
            *slot = part.as_bytes()[0] - b'0';
        }

        let [domain, primary, secondary, tertiary, maturity, criticality] = values;
        Ok(Self {
            domain,
            primary,
            secondary,
            tertiary,
            maturity,
            criticality,
        })
    }
}

impl fmt::Display for FeatureIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.domain, self.primary, self.secondary, self.tertiary, self.maturity, self.criticality
        )
    }
}

/// Context flags that add oversight roles regardless of the identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFlags {
    #[serde(default)]
    pub customer_facing: bool,
    #[serde(default)]
    pub handles_personal_data: bool,
}

/// Roles added for one recognised domain value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCluster {
    pub value: u8,
    pub name: String,
    pub roles: Vec<String>,
}

/// Roles added once a complexity position reaches `min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub position: Position,
    pub min: u8,
    pub roles: Vec<String>,
}

/// Team assembly policy, loaded from `[team]`.
///
/// Thresholds only ever add roles, so raising any complexity position can
/// never shrink a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPolicy {
    #[serde(default = "default_baseline")]
    pub baseline: Vec<String>,
    #[serde(default = "default_domains")]
    pub domains: Vec<DomainCluster>,
    /// Cluster used for unrecognised domain values.
    #[serde(default = "default_generic_cluster")]
    pub generic_cluster: Vec<String>,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdRule>,
    #[serde(default = "default_customer_facing")]
    pub customer_facing: Vec<String>,
    #[serde(default = "default_personal_data")]
    pub personal_data: Vec<String>,
}

impl Default for TeamPolicy {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            domains: default_domains(),
            generic_cluster: default_generic_cluster(),
            thresholds: default_thresholds(),
            customer_facing: default_customer_facing(),
            personal_data: default_personal_data(),
        }
    }
}

impl TeamPolicy {
    pub fn validate(&self) -> TaskforceResult<()> {
        if self.baseline.is_empty() {
            return Err(TaskforceError::Config(
                "team.baseline must name at least one role".into(),
            ));
        }
        if let Some(rule) = self.thresholds.iter().find(|r| r.min > MAX_POSITION_VALUE) {
            return Err(TaskforceError::Config(format!(
                "team threshold for {:?} has min {} above {MAX_POSITION_VALUE}",
                rule.position, rule.min
            )));
        }
        Ok(())
    }

    pub fn domain(&self, value: u8) -> Option<&DomainCluster> {
        self.domains.iter().find(|d| d.value == value)
    }
}

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_baseline() -> Vec<String> {
    roles(&["product", "backend", "qa"])
}

fn default_domains() -> Vec<DomainCluster> {
    let cluster = |value, name: &str, members: &[&str]| DomainCluster {
        value,
        name: name.to_string(),
        roles: roles(members),
    };
    vec![
        cluster(1, "web", &["frontend", "design"]),
        cluster(2, "data", &["data", "analytics"]),
        cluster(3, "platform", &["devops", "sre"]),
        cluster(4, "ai", &["ai", "ml", "ai-safety"]),
        cluster(5, "security", &["security", "privacy"]),
        cluster(6, "mobile", &["mobile", "design"]),
        cluster(7, "fintech", &["payments", "risk"]),
    ]
}

fn default_generic_cluster() -> Vec<String> {
    roles(&["frontend", "integration"])
}

fn default_thresholds() -> Vec<ThresholdRule> {
    let rule = |position, min, members: &[&str]| ThresholdRule {
        position,
        min,
        roles: roles(members),
    };
    vec![
        rule(Position::Primary, 3, &["architecture"]),
        rule(Position::Primary, 5, &["engineering-management"]),
        rule(Position::Primary, 7, &["cto"]),
        rule(Position::Secondary, 3, &["data"]),
        rule(Position::Secondary, 5, &["performance"]),
        rule(Position::Tertiary, 3, &["integration"]),
        rule(Position::Tertiary, 6, &["sre"]),
        rule(Position::Maturity, 3, &["documentation"]),
        rule(Position::Maturity, 5, &["release-management"]),
        rule(Position::Criticality, 3, &["sre"]),
        rule(Position::Criticality, 5, &["security"]),
        rule(Position::Criticality, 7, &["ciso"]),
    ]
}

fn default_customer_facing() -> Vec<String> {
    roles(&["compliance", "legal"])
}

fn default_personal_data() -> Vec<String> {
    roles(&["privacy"])
}

/// Decides which roles a feature needs from its identifier and flags.
#[derive(Debug, Clone, Default)]
pub struct TeamAssembler {
    policy: TeamPolicy,
}

impl TeamAssembler {
    pub fn new(policy: TeamPolicy) -> TaskforceResult<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &TeamPolicy {
        &self.policy
    }

    /// Parse `identifier` and assemble. Malformed input fails fast.
    pub fn assemble(&self, identifier: &str, flags: &TeamFlags) -> TaskforceResult<Vec<String>> {
        let id: FeatureIdentifier = identifier.parse()?;
        Ok(self.assemble_for(&id, flags))
    }

    /// Ordered, de-duplicated role list for an already-parsed identifier.
    pub fn assemble_for(&self, id: &FeatureIdentifier, flags: &TeamFlags) -> Vec<String> {
        let mut team: Vec<String> = Vec::new();
        let mut add = |members: &[String]| {
            for role in members {
                if !team.contains(role) {
                    team.push(role.clone());
                }
            }
        };

        add(&self.policy.baseline);
        match self.policy.domain(id.domain) {
            Some(cluster) => add(&cluster.roles),
            None => add(&self.policy.generic_cluster),
        }
        for position in Position::ALL {
            let value = id.value(position);
            for rule in &self.policy.thresholds {
                if rule.position == position && value >= rule.min {
                    add(&rule.roles);
                }
            }
        }
        if flags.customer_facing {
            add(&self.policy.customer_facing);
        }
        if flags.handles_personal_data {
            add(&self.policy.personal_data);
        }

        debug!(identifier = %id, size = team.len(), "Assembled team");
        team
    }

    /// Roles in `team` that no registered handler can staff.
    pub fn unstaffed_roles(&self, team: &[String], registry: &HandlerRegistry) -> Vec<String> {
        registry.missing_roles(team)
    }
}
