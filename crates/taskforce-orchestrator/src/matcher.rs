use crate::handler::Handler;
use crate::registry::{HandlerDefinition, HandlerRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use taskforce_core::{TaskforceError, TaskforceResult, WorkUnit};
use tracing::debug;

/// Why a handler accepted a work unit, strongest first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchReason {
    /// `requirements.role` names the handler's role.
    Role,
    /// A required expertise entry appears inside a declared expertise tag.
    Expertise(String),
    /// The description mentions one of the role's keywords.
    Keyword(String),
    /// The handler overrode `can_handle` and accepted on its own terms.
    Custom,
}

/// Generic matcher driven by a role → keywords table.
///
/// Holds no mutable state, so repeated calls with the same inputs always agree.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatcher {
    keywords: HashMap<String, Vec<String>>,
}

impl CapabilityMatcher {
    pub fn new(keywords: HashMap<String, Vec<String>>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|(role, words)| {
                let words = words.into_iter().map(|w| w.to_lowercase()).collect();
                (role, words)
            })
            .collect();
        Self { keywords }
    }

    pub fn keywords_for(&self, role: &str) -> &[String] {
        self.keywords.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Decide whether `definition` accepts `unit`.
    pub fn can_handle(&self, definition: &HandlerDefinition, unit: &WorkUnit) -> bool {
        self.match_reason(definition, unit).is_some()
    }

    /// First matching rule, in precedence order role > expertise > keyword.
    ///
    /// An explicit role request pins the unit: handlers of any other role
    /// reject it without consulting expertise or keywords.
    pub fn match_reason(
        &self,
        definition: &HandlerDefinition,
        unit: &WorkUnit,
    ) -> Option<MatchReason> {
        if let Some(role) = &unit.requirements.role {
            return role
                .eq_ignore_ascii_case(&definition.role)
                .then_some(MatchReason::Role);
        }

        for wanted in &unit.requirements.expertise {
            let wanted = wanted.trim().to_lowercase();
            if wanted.is_empty() {
                continue;
            }
            let overlaps = definition
                .expertise_tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&wanted));
            if overlaps {
                return Some(MatchReason::Expertise(wanted));
            }
        }

        let description = unit.normalized_description();
        self.keywords_for(&definition.role)
            .iter()
            .find(|kw| !kw.is_empty() && description.contains(kw.as_str()))
            .map(|kw| MatchReason::Keyword(kw.clone()))
    }

    /// Every handler that accepts `unit`, with the reason, in registration order.
    pub fn candidates(
        &self,
        registry: &HandlerRegistry,
        unit: &WorkUnit,
    ) -> Vec<(Arc<dyn Handler>, MatchReason)> {
        registry
            .all()
            .into_iter()
            .filter(|handler| handler.can_handle(unit, self))
            .map(|handler| {
                let reason = self
                    .match_reason(handler.definition(), unit)
                    .unwrap_or(MatchReason::Custom);
                (handler, reason)
            })
            .collect()
    }

    /// Pick the best-qualified handler for `unit`.
    ///
    /// The strongest match reason wins; ties go to the earliest registration.
    pub fn select(
        &self,
        registry: &HandlerRegistry,
        unit: &WorkUnit,
    ) -> TaskforceResult<Arc<dyn Handler>> {
        let mut best: Option<(Arc<dyn Handler>, MatchReason)> = None;
        for (handler, reason) in self.candidates(registry, unit) {
            let stronger = match &best {
                Some((_, current)) => rank(&reason) < rank(current),
                None => true,
            };
            if stronger {
                best = Some((handler, reason));
            }
        }

        match best {
            Some((handler, reason)) => {
                debug!(
                    work_unit_id = %unit.id,
                    handler = %handler.definition().name,
                    reason = ?reason,
                    "Matched handler"
                );
                Ok(handler)
            }
            None => Err(TaskforceError::NoMatchingHandler(format!(
                "no handler accepts work unit {} ({})",
                unit.id, unit.description
            ))),
        }
    }
}

fn rank(reason: &MatchReason) -> u8 {
    match reason {
        MatchReason::Role => 0,
        MatchReason::Expertise(_) => 1,
        MatchReason::Keyword(_) => 2,
        MatchReason::Custom => 3,
    }
}
