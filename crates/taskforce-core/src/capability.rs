use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag that grants every capability.
pub const WILDCARD: &str = "*";

/// Set of capability tags a handler may use.
///
/// Serialized as a plain list of tags; a `*` entry makes the set unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    tags: BTreeSet<String>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that allows everything.
    pub fn unrestricted() -> Self {
        let mut set = Self::new();
        set.grant(WILDCARD);
        set
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grant(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn revoke(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    pub fn is_unrestricted(&self) -> bool {
        self.tags.contains(WILDCARD)
    }

    /// Whether `tag` may be used under this set.
    pub fn allows(&self, tag: &str) -> bool {
        self.is_unrestricted() || self.tags.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}
