use crate::registry::HandlerRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taskforce_core::{TaskforceError, TaskforceResult};
use tracing::{info, warn};

/// Request type used when nothing in the request text is recognised.
pub const CUSTOM_REQUEST: &str = "custom";

/// Free-text phrases that map straight to a request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAlias {
    pub request_type: String,
    pub phrases: Vec<String>,
}

/// When any trigger role is planned, every `must_include` role is added too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessGroup {
    pub name: String,
    pub trigger_roles: Vec<String>,
    pub must_include: Vec<String>,
}

/// Bulk invocation policy, loaded from `[invocation]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationPolicy {
    #[serde(default = "default_aliases")]
    pub aliases: Vec<RequestAlias>,
    /// Request type → roles. Types without a rule invoke every registered role.
    #[serde(default = "default_rules")]
    pub rules: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_critical_roles")]
    pub critical_roles: Vec<String>,
    #[serde(default = "default_complete_groups")]
    pub complete_groups: Vec<CompletenessGroup>,
    #[serde(default = "default_minutes_per_role")]
    pub minutes_per_role: f64,
    #[serde(default = "default_overhead_minutes")]
    pub overhead_minutes: f64,
    #[serde(default = "default_cost_per_role")]
    pub cost_per_role: f64,
    #[serde(default = "default_confirm_above")]
    pub confirm_above: usize,
    #[serde(default = "default_double_confirm_above")]
    pub double_confirm_above: usize,
    #[serde(default = "default_min_completion_rate")]
    pub min_completion_rate: f64,
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
            rules: default_rules(),
            critical_roles: default_critical_roles(),
            complete_groups: default_complete_groups(),
            minutes_per_role: default_minutes_per_role(),
            overhead_minutes: default_overhead_minutes(),
            cost_per_role: default_cost_per_role(),
            confirm_above: default_confirm_above(),
            double_confirm_above: default_double_confirm_above(),
            min_completion_rate: default_min_completion_rate(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_aliases() -> Vec<RequestAlias> {
    vec![RequestAlias {
        request_type: "whole_team".into(),
        phrases: strings(&["whole team", "entire team", "everyone", "all hands"]),
    }]
}

fn default_rules() -> BTreeMap<String, Vec<String>> {
    let mut rules = BTreeMap::new();
    rules.insert(
        "security_review".into(),
        strings(&["security", "privacy", "ciso", "compliance", "ai-safety"]),
    );
    rules.insert(
        "leadership_review".into(),
        strings(&["cto", "ciso", "engineering-management", "product"]),
    );
    rules.insert(
        "technical_review".into(),
        strings(&["architecture", "backend", "frontend", "devops", "sre", "qa"]),
    );
    rules.insert(
        "product_review".into(),
        strings(&["product", "design", "analytics", "business-analysis"]),
    );
    rules.insert("ai_ml_review".into(), strings(&["ai", "ml", "ai-safety", "data"]));
    rules.insert(
        "compliance_review".into(),
        strings(&["compliance", "legal", "privacy", "security"]),
    );
    rules
}

fn default_critical_roles() -> Vec<String> {
    strings(&[
        "ai-safety",
        "privacy",
        "ciso",
        "security",
        "business-analysis",
        "project-management",
    ])
}

fn default_complete_groups() -> Vec<CompletenessGroup> {
    vec![
        CompletenessGroup {
            name: "security".into(),
            trigger_roles: strings(&["security", "ciso"]),
            must_include: strings(&["privacy", "compliance"]),
        },
        CompletenessGroup {
            name: "ai".into(),
            trigger_roles: strings(&["ai", "ml"]),
            must_include: strings(&["ai-safety"]),
        },
        CompletenessGroup {
            name: "release".into(),
            trigger_roles: strings(&["devops"]),
            must_include: strings(&["qa", "sre"]),
        },
    ]
}

fn default_minutes_per_role() -> f64 {
    0.5
}

fn default_overhead_minutes() -> f64 {
    2.0
}

fn default_cost_per_role() -> f64 {
    0.10
}

fn default_confirm_above() -> usize {
    10
}

fn default_double_confirm_above() -> usize {
    25
}

fn default_min_completion_rate() -> f64 {
    0.9
}

/// How much operator confirmation a plan needs before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    None,
    Single,
    Double,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationPlan {
    pub request_text: String,
    pub request_type: String,
    pub roles: Vec<String>,
    pub estimated_minutes: f64,
    pub estimated_cost: f64,
    pub confirmation: Confirmation,
    pub critical_roles_included: bool,
    pub missing_critical: Vec<String>,
    /// Roles added by completeness groups.
    pub added_for_completeness: Vec<String>,
    /// Planned roles with no registered handler.
    pub unstaffed: Vec<String>,
    pub warnings: Vec<String>,
}

impl InvocationPlan {
    pub fn requires_confirmation(&self) -> bool {
        self.confirmation != Confirmation::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationReport {
    pub planned: usize,
    pub invoked: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Roles that ran without being part of the plan.
    pub unplanned: Vec<String>,
    pub completion_rate: f64,
    pub actual_cost: f64,
    pub success: bool,
    pub issues: Vec<String>,
}

/// Plans and audits bulk handler invocations.
#[derive(Debug, Clone)]
pub struct InvocationPlanner {
    policy: InvocationPolicy,
    topics: Vec<(Regex, &'static str)>,
    review_words: Regex,
}

impl InvocationPlanner {
    pub fn new(policy: InvocationPolicy) -> TaskforceResult<Self> {
        if policy.double_confirm_above < policy.confirm_above {
            return Err(TaskforceError::Config(
                "invocation.double_confirm_above must be >= confirm_above".into(),
            ));
        }

        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| TaskforceError::Config(format!("bad pattern {pattern}: {e}")))
        };
        // Order matters: the first topic that matches wins.
        let topics = vec![
            (compile(r"\bsecurity\b")?, "security_review"),
            (compile(r"\b(leadership|executive)\b")?, "leadership_review"),
            (
                compile(r"\btechnical\b.*\breview\b|\breview\b.*\btechnical\b")?,
                "technical_review",
            ),
            (compile(r"\bproducts?\b")?, "product_review"),
            (compile(r"\b(ai|ml)\b")?, "ai_ml_review"),
            (compile(r"\bcompliance\b")?, "compliance_review"),
        ];
        let review_words = compile(r"\b(review|evaluate|assess|analy[sz]e)\b")?;

        Ok(Self {
            policy,
            topics,
            review_words,
        })
    }

    pub fn policy(&self) -> &InvocationPolicy {
        &self.policy
    }

    /// Map a free-text request to a request type.
    pub fn classify(&self, request: &str) -> String {
        let lower = request.to_lowercase();

        for alias in &self.policy.aliases {
            if alias
                .phrases
                .iter()
                .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
            {
                return alias.request_type.clone();
            }
        }
        if let Some((_, kind)) = self.topics.iter().find(|(re, _)| re.is_match(&lower)) {
            return kind.to_string();
        }
        if self.review_words.is_match(&lower) {
            return "whole_team".to_string();
        }
        CUSTOM_REQUEST.to_string()
    }

    pub fn plan(&self, request: &str, registry: &HandlerRegistry) -> InvocationPlan {
        let request_type = self.classify(request);

        let mut roles: Vec<String> = Vec::new();
        let source = self
            .policy
            .rules
            .get(&request_type)
            .cloned()
            .unwrap_or_else(|| registry.roles());
        for role in source {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        let missing_critical: Vec<String> = self
            .policy
            .critical_roles
            .iter()
            .filter(|r| !roles.contains(r))
            .cloned()
            .collect();

        let mut added = Vec::new();
        for group in &self.policy.complete_groups {
            if group.trigger_roles.iter().any(|t| roles.contains(t)) {
                for role in &group.must_include {
                    if !roles.contains(role) && !added.contains(role) {
                        added.push(role.clone());
                    }
                }
            }
        }
        roles.extend(added.iter().cloned());

        let count = roles.len();
        let estimated_minutes = count as f64 * self.policy.minutes_per_role + self.policy.overhead_minutes;
        let estimated_cost = count as f64 * self.policy.cost_per_role;
        let confirmation = if count > self.policy.double_confirm_above {
            Confirmation::Double
        } else if count > self.policy.confirm_above {
            Confirmation::Single
        } else {
            Confirmation::None
        };
        let unstaffed = registry.missing_roles(&roles);

        let mut warnings = Vec::new();
        if !missing_critical.is_empty() {
            warnings.push(format!("Critical roles missing: {}", missing_critical.join(", ")));
        }
        if !added.is_empty() {
            warnings.push(format!("Added for completeness: {}", added.join(", ")));
        }
        if count > self.policy.double_confirm_above {
            warnings.push(format!(
                "Large invocation: {count} roles will take ~{estimated_minutes:.1} minutes"
            ));
        }
        if !unstaffed.is_empty() {
            warnings.push(format!("No handler registered for: {}", unstaffed.join(", ")));
        }

        info!(
            request_type = %request_type,
            roles = count,
            confirmation = ?confirmation,
            "Planned invocation"
        );

        InvocationPlan {
            request_text: request.to_string(),
            request_type,
            roles,
            estimated_minutes,
            estimated_cost,
            confirmation,
            critical_roles_included: missing_critical.is_empty(),
            missing_critical,
            added_for_completeness: added,
            unstaffed,
            warnings,
        }
    }

    /// Compare what actually ran against the plan.
    pub fn verify(&self, plan: &InvocationPlan, invoked: &[String], failed: &[String]) -> InvocationReport {
        let mut report = InvocationReport {
            planned: plan.roles.len(),
            invoked: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            unplanned: Vec::new(),
            completion_rate: 0.0,
            actual_cost: 0.0,
            success: true,
            issues: Vec::new(),
        };

        for role in &plan.roles {
            if failed.contains(role) {
                report.failed.push(role.clone());
            } else if invoked.contains(role) {
                report.invoked.push(role.clone());
            } else {
                report.skipped.push(role.clone());
            }
        }
        for role in invoked.iter().chain(failed) {
            if !plan.roles.contains(role) && !report.unplanned.contains(role) {
                report.unplanned.push(role.clone());
            }
        }

        if report.planned > 0 {
            report.completion_rate = report.invoked.len() as f64 / report.planned as f64;
        }
        report.actual_cost = report.invoked.len() as f64 * self.policy.cost_per_role;

        let critical_missed: Vec<&String> = self
            .policy
            .critical_roles
            .iter()
            .filter(|r| report.skipped.contains(r) || report.failed.contains(r))
            .collect();
        if !critical_missed.is_empty() {
            report.success = false;
            let names: Vec<&str> = critical_missed.iter().map(|s| s.as_str()).collect();
            report
                .issues
                .push(format!("Critical roles did not complete: {}", names.join(", ")));
        }
        if report.completion_rate < self.policy.min_completion_rate {
            report.issues.push(format!(
                "Low completion rate: {:.1}%",
                report.completion_rate * 100.0
            ));
        }

        if !report.success {
            warn!(issues = ?report.issues, "Invocation incomplete");
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::profiles::default_definitions;

    fn planner() -> InvocationPlanner {
        InvocationPlanner::new(InvocationPolicy::default()).unwrap()
    }

    fn catalog() -> HandlerRegistry {
        HandlerRegistry::from_definitions(default_definitions()).unwrap()
    }

    #[test]
    fn test_classify() {
        let p = planner();
        assert_eq!(p.classify("Run a security audit"), "security_review");
        assert_eq!(p.classify("Executive sign-off"), "leadership_review");
        assert_eq!(p.classify("Technical design review"), "technical_review");
        assert_eq!(p.classify("New product launch"), "product_review");
        assert_eq!(p.classify("Review our AI roadmap"), "ai_ml_review");
        assert_eq!(p.classify("Evaluate the onboarding flow"), "whole_team");
        assert_eq!(p.classify("Ask the whole team about security"), "whole_team");
        assert_eq!(p.classify("hello"), CUSTOM_REQUEST);
    }

    #[test]
    fn test_ai_needs_word_boundary() {
        // "maintain" and "html" must not read as AI/ML.
        assert_eq!(planner().classify("maintain the html templates"), CUSTOM_REQUEST);
    }

    #[test]
    fn test_plan_adds_completeness_roles() {
        let plan = planner().plan("Review our ML pipeline", &catalog());
        assert_eq!(plan.request_type, "ai_ml_review");
        assert!(plan.added_for_completeness.is_empty());

        let plan = planner().plan("Technical review of the rollout", &catalog());
        assert_eq!(plan.request_type, "technical_review");
        assert!(plan.roles.contains(&"sre".to_string()));
        assert!(plan.warnings.iter().any(|w| w.starts_with("Critical roles missing")));
        assert!(!plan.critical_roles_included);
    }

    #[test]
    fn test_security_plan_pulls_in_group() {
        let mut policy = InvocationPolicy::default();
        policy
            .rules
            .insert("security_review".into(), vec!["security".into()]);
        let plan = InvocationPlanner::new(policy)
            .unwrap()
            .plan("security check", &catalog());
        assert_eq!(plan.roles, vec!["security", "privacy", "compliance"]);
        assert_eq!(plan.added_for_completeness, vec!["privacy", "compliance"]);
        assert_eq!(plan.confirmation, Confirmation::None);
        assert!((plan.estimated_minutes - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_custom_request_invokes_everyone() {
        let registry = catalog();
        let plan = planner().plan("hello", &registry);
        assert_eq!(plan.roles.len(), registry.roles().len());
        assert_eq!(plan.confirmation, Confirmation::Double);
        assert!(plan.requires_confirmation());
        assert!(plan.critical_roles_included);
        assert!(plan.unstaffed.is_empty());
    }

    #[test]
    fn test_unstaffed_roles_warned() {
        let registry = HandlerRegistry::from_definitions(
            default_definitions()
                .into_iter()
                .filter(|d| d.role != "ciso")
                .collect(),
        )
        .unwrap();
        let plan = planner().plan("leadership sync", &registry);
        assert_eq!(plan.unstaffed, vec!["ciso"]);
        assert!(plan.warnings.iter().any(|w| w.contains("No handler registered")));
    }

    #[test]
    fn test_verify_completion() {
        let p = planner();
        let plan = p.plan("leadership sync", &catalog());
        let all: Vec<String> = plan.roles.clone();
        let report = p.verify(&plan, &all, &[]);
        assert!(report.success);
        assert_eq!(report.completion_rate, 1.0);
        assert!(report.issues.is_empty());

        let report = p.verify(&plan, &["cto".to_string()], &["ciso".to_string()]);
        assert!(!report.success);
        assert_eq!(report.failed, vec!["ciso"]);
        assert!(report.issues.iter().any(|i| i.starts_with("Low completion rate")));
    }

    #[test]
    fn test_verify_tracks_unplanned() {
        let p = planner();
        let plan = p.plan("leadership sync", &catalog());
        let mut invoked = plan.roles.clone();
        invoked.push("qa".into());
        let report = p.verify(&plan, &invoked, &[]);
        assert_eq!(report.unplanned, vec!["qa"]);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let policy = InvocationPolicy {
            confirm_above: 30,
            double_confirm_above: 20,
            ..InvocationPolicy::default()
        };
        assert!(InvocationPlanner::new(policy).is_err());
    }
}
