//! Filters for visible contacts.

use std::collections::HashSet;

use crate::model::Contact;

/// Restricts which contacts a board view shows. The default shows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    /// Only these stages, when set.
    pub stage_ids: Option<HashSet<String>>,
    /// Only contacts assigned to this agent, when set.
    pub agent_id: Option<String>,
    /// Case-insensitive substring over name and tags, when set.
    pub search: Option<String>,
}

impl ContactFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given stages.
    #[must_use]
    pub fn with_stages<I, S>(mut self, stage_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage_ids = Some(stage_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to contacts assigned to an agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Restricts to contacts whose name or tags contain `term`.
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_lowercase())
        };
        self
    }

    /// Returns true if a whole stage is visible.
    #[must_use]
    pub fn includes_stage(&self, stage_id: &str) -> bool {
        self.stage_ids
            .as_ref()
            .map_or(true, |stages| stages.contains(stage_id))
    }

    /// Returns true if the contact passes the filter.
    #[must_use]
    pub fn matches(&self, contact: &Contact) -> bool {
        if !self.includes_stage(&contact.stage_id) {
            return false;
        }

        if let Some(ref agent) = self.agent_id {
            if !contact.is_assigned_to(agent) {
                return false;
            }
        }

        if let Some(ref term) = self.search {
            let in_name = contact
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(term));
            let in_tags = contact.tags.iter().any(|t| t.to_lowercase().contains(term));
            if !in_name && !in_tags {
                return false;
            }
        }

        true
    }
}
