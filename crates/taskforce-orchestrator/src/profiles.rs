use crate::quality::{QualityRule, RuleKind};
use crate::registry::HandlerDefinition;
use std::collections::HashMap;
use taskforce_core::CapabilitySet;

struct Profile {
    name: &'static str,
    role: &'static str,
    description: &'static str,
    expertise: &'static [&'static str],
    collaborators: &'static [&'static str],
    triggers: &'static [&'static str],
    capabilities: &'static [&'static str],
    keywords: &'static [&'static str],
}

// Keywords are matched as substrings of the description, so keep them
// specific enough not to fire inside unrelated words.
const CATALOG: &[Profile] = &[
    Profile {
        name: "product-manager",
        role: "product",
        description: "Owns requirements, scope and prioritization",
        expertise: &["requirements", "roadmap", "user stories", "prioritization"],
        collaborators: &["design", "backend"],
        triggers: &["roadmap", "stakeholder"],
        capabilities: &["docs.write", "tracker.write"],
        keywords: &["requirement", "user story", "roadmap", "stakeholder"],
    },
    Profile {
        name: "backend-engineer",
        role: "backend",
        description: "Builds services, APIs and persistence",
        expertise: &["api design", "databases", "node.js", "rust", "microservices"],
        collaborators: &["devops", "qa"],
        triggers: &["integration", "architecture"],
        capabilities: &["repo.read", "repo.write", "db.migrate"],
        keywords: &["api", "database", "server", "endpoint"],
    },
    Profile {
        name: "frontend-engineer",
        role: "frontend",
        description: "Builds user interfaces",
        expertise: &["react", "typescript", "css", "forms", "accessibility"],
        collaborators: &["design", "backend"],
        triggers: &["integration", "design system"],
        capabilities: &["repo.read", "repo.write"],
        keywords: &["frontend", "component", "form", "page", "react", "css"],
    },
    Profile {
        name: "qa-engineer",
        role: "qa",
        description: "Designs and automates tests",
        expertise: &["test automation", "regression testing", "coverage"],
        collaborators: &["backend", "frontend"],
        triggers: &["release", "ci/cd"],
        capabilities: &["repo.read", "ci.trigger"],
        keywords: &["test", "regression", "coverage", "bug"],
    },
    Profile {
        name: "devops-engineer",
        role: "devops",
        description: "Owns build, deployment and infrastructure",
        expertise: &["ci/cd", "kubernetes", "terraform", "monitoring"],
        collaborators: &["sre", "security"],
        triggers: &["infrastructure", "deployment", "ci/cd"],
        capabilities: &["*"],
        keywords: &["deploy", "pipeline", "docker", "kubernetes", "infrastructure"],
    },
    Profile {
        name: "site-reliability-engineer",
        role: "sre",
        description: "Keeps production healthy",
        expertise: &["observability", "incident response", "slo"],
        collaborators: &["devops", "backend"],
        triggers: &["outage", "scaling"],
        capabilities: &["metrics.read", "oncall.page"],
        keywords: &["latency", "uptime", "incident", "alerting"],
    },
    Profile {
        name: "security-engineer",
        role: "security",
        description: "Threat modeling and security review",
        expertise: &["threat modeling", "owasp", "penetration testing", "authentication"],
        collaborators: &["privacy", "compliance"],
        triggers: &["authentication", "encryption", "architecture"],
        capabilities: &["repo.read", "scanner.run"],
        keywords: &["security", "vulnerability", "encryption", "threat"],
    },
    Profile {
        name: "privacy-engineer",
        role: "privacy",
        description: "Data protection by design",
        expertise: &["gdpr", "data minimization", "consent management"],
        collaborators: &["legal", "compliance"],
        triggers: &["personal data"],
        capabilities: &["repo.read", "docs.write"],
        keywords: &["privacy", "gdpr", "consent", "pii"],
    },
    Profile {
        name: "data-engineer",
        role: "data",
        description: "Builds data pipelines and storage",
        expertise: &["etl", "data pipelines", "sql", "warehousing"],
        collaborators: &["backend", "analytics"],
        triggers: &["migration", "integration"],
        capabilities: &["repo.read", "repo.write", "db.migrate"],
        keywords: &["etl", "warehouse", "dataset", "data pipeline"],
    },
    Profile {
        name: "data-analyst",
        role: "analytics",
        description: "Turns data into decisions",
        expertise: &["dashboards", "metrics", "sql"],
        collaborators: &["data", "product"],
        triggers: &["kpi"],
        capabilities: &["warehouse.read"],
        keywords: &["dashboard", "kpi", "analytics", "funnel"],
    },
    Profile {
        name: "ai-engineer",
        role: "ai",
        description: "Integrates language models into products",
        expertise: &["llm integration", "prompt engineering", "evaluation"],
        collaborators: &["ml", "ai-safety"],
        triggers: &["architecture", "production model"],
        capabilities: &["repo.read", "repo.write", "model.invoke"],
        keywords: &["llm", "prompt", "chatbot", "embedding"],
    },
    Profile {
        name: "ml-engineer",
        role: "ml",
        description: "Trains and serves models",
        expertise: &["model training", "feature engineering", "mlops"],
        collaborators: &["data", "ai"],
        triggers: &["training data"],
        capabilities: &["repo.read", "repo.write", "gpu.schedule"],
        keywords: &["training", "inference", "feature store", "classifier"],
    },
    Profile {
        name: "ai-safety-engineer",
        role: "ai-safety",
        description: "Evaluates model behaviour and guardrails",
        expertise: &["red teaming", "guardrails", "bias evaluation", "alignment"],
        collaborators: &["ai", "compliance"],
        triggers: &["safety"],
        capabilities: &["model.invoke", "docs.write"],
        keywords: &["guardrail", "bias", "hallucination", "red team"],
    },
    Profile {
        name: "ux-designer",
        role: "design",
        description: "User research and interaction design",
        expertise: &["user research", "wireframes", "design systems", "accessibility"],
        collaborators: &["frontend", "product"],
        triggers: &["usability"],
        capabilities: &["design.write"],
        keywords: &["wireframe", "mockup", "usability", "design"],
    },
    Profile {
        name: "software-architect",
        role: "architecture",
        description: "System design and technical direction",
        expertise: &["system design", "scalability", "domain modeling"],
        collaborators: &["backend", "devops", "security"],
        triggers: &["architecture", "migration", "integration"],
        capabilities: &["repo.read", "docs.write"],
        keywords: &["architecture", "system design", "scalability"],
    },
    Profile {
        name: "technical-writer",
        role: "documentation",
        description: "Writes guides and reference docs",
        expertise: &["api documentation", "guides", "tutorials"],
        collaborators: &["product"],
        triggers: &[],
        capabilities: &["docs.write"],
        keywords: &["documentation", "readme", "guide", "tutorial"],
    },
    Profile {
        name: "compliance-officer",
        role: "compliance",
        description: "Regulatory and audit readiness",
        expertise: &["soc 2", "iso 27001", "audit"],
        collaborators: &["legal", "security"],
        triggers: &["audit", "regulation"],
        capabilities: &["docs.read", "docs.write"],
        keywords: &["compliance", "audit", "regulation", "soc 2"],
    },
    Profile {
        name: "legal-counsel",
        role: "legal",
        description: "Contracts, licensing and terms",
        expertise: &["contracts", "licensing", "terms of service"],
        collaborators: &["compliance", "privacy"],
        triggers: &[],
        capabilities: &["docs.read"],
        keywords: &["legal", "license", "contract", "terms of service"],
    },
    Profile {
        name: "engineering-manager",
        role: "engineering-management",
        description: "Delivery planning and staffing",
        expertise: &["delivery planning", "staffing"],
        collaborators: &["product", "architecture"],
        triggers: &["staffing"],
        capabilities: &["tracker.write"],
        keywords: &["staffing", "delivery plan", "sprint"],
    },
    Profile {
        name: "release-manager",
        role: "release-management",
        description: "Release planning and change management",
        expertise: &["release planning", "change management"],
        collaborators: &["qa", "devops"],
        triggers: &["rollout"],
        capabilities: &["tracker.write", "ci.trigger"],
        keywords: &["release", "rollout", "changelog"],
    },
    Profile {
        name: "mobile-engineer",
        role: "mobile",
        description: "Native and cross-platform apps",
        expertise: &["ios", "android", "react native"],
        collaborators: &["design", "backend"],
        triggers: &["integration"],
        capabilities: &["repo.read", "repo.write"],
        keywords: &["ios", "android", "mobile"],
    },
    Profile {
        name: "payments-engineer",
        role: "payments",
        description: "Billing, ledgers and payment providers",
        expertise: &["pci dss", "billing", "ledgers"],
        collaborators: &["security", "compliance"],
        triggers: &["refund", "chargeback"],
        capabilities: &["repo.read", "repo.write"],
        keywords: &["payment", "billing", "invoice", "checkout"],
    },
    Profile {
        name: "risk-analyst",
        role: "risk",
        description: "Fraud and risk modeling",
        expertise: &["fraud detection", "risk modeling"],
        collaborators: &["compliance", "data"],
        triggers: &[],
        capabilities: &["warehouse.read"],
        keywords: &["fraud", "risk score"],
    },
    Profile {
        name: "performance-engineer",
        role: "performance",
        description: "Profiling, load testing and caching",
        expertise: &["profiling", "load testing", "caching"],
        collaborators: &["sre", "backend"],
        triggers: &["scaling"],
        capabilities: &["repo.read", "metrics.read"],
        keywords: &["performance", "load test", "profiling", "cache"],
    },
    Profile {
        name: "integration-engineer",
        role: "integration",
        description: "Third-party APIs, webhooks and messaging",
        expertise: &["third-party apis", "webhooks", "messaging"],
        collaborators: &["backend", "qa"],
        triggers: &["partner"],
        capabilities: &["repo.read", "repo.write"],
        keywords: &["webhook", "integration", "third-party"],
    },
    Profile {
        name: "business-analyst",
        role: "business-analysis",
        description: "Requirements elicitation and process modeling",
        expertise: &["requirements elicitation", "process modeling"],
        collaborators: &["product"],
        triggers: &[],
        capabilities: &["docs.write"],
        keywords: &["business case", "process map"],
    },
    Profile {
        name: "project-manager",
        role: "project-management",
        description: "Schedules, milestones and risk tracking",
        expertise: &["scheduling", "risk tracking"],
        collaborators: &["engineering-management", "product"],
        triggers: &[],
        capabilities: &["tracker.write"],
        keywords: &["timeline", "milestone", "schedule"],
    },
    Profile {
        name: "cto",
        role: "cto",
        description: "Technology strategy and governance",
        expertise: &["technology strategy", "governance"],
        collaborators: &["architecture", "security"],
        triggers: &["strategy"],
        capabilities: &["*"],
        keywords: &["technology strategy", "tech radar"],
    },
    Profile {
        name: "ciso",
        role: "ciso",
        description: "Security governance and risk ownership",
        expertise: &["security governance", "risk management"],
        collaborators: &["security", "compliance"],
        triggers: &["breach"],
        capabilities: &["*"],
        keywords: &["security program", "risk register"],
    },
];

/// Built-in handler catalog used when no `[[handlers]]` are configured.
pub fn default_definitions() -> Vec<HandlerDefinition> {
    CATALOG
        .iter()
        .map(|p| {
            HandlerDefinition::new(p.name, p.role)
                .with_description(p.description)
                .with_expertise(p.expertise.iter().copied())
                .with_collaborators(p.collaborators.iter().copied())
                .with_triggers(p.triggers.iter().copied())
                .with_capabilities(CapabilitySet::from_tags(p.capabilities.iter().copied()))
        })
        .collect()
}

/// Role → keyword table for the capability matcher.
pub fn default_keywords() -> HashMap<String, Vec<String>> {
    CATALOG
        .iter()
        .map(|p| {
            let words = p.keywords.iter().map(|w| w.to_string()).collect();
            (p.role.to_string(), words)
        })
        .collect()
}

/// Role-specific quality predicates applied on top of the baseline checks.
pub fn default_quality_rules() -> Vec<QualityRule> {
    vec![
        QualityRule::new("qa", RuleKind::MinMetric)
            .with_name("test coverage >= 80%")
            .with_metric("coverage")
            .with_threshold(80.0),
        QualityRule::new("security", RuleKind::MaxMetric)
            .with_name("no critical findings")
            .with_metric("critical_findings")
            .with_threshold(0.0),
        QualityRule::new("design", RuleKind::FlagAsserted)
            .with_name("accessibility compliant")
            .with_metric("accessibility_compliant"),
        QualityRule::new("ai-safety", RuleKind::MaxMetric)
            .with_name("no unsafe outputs")
            .with_metric("unsafe_outputs")
            .with_threshold(0.0),
    ]
}
