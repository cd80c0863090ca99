//! Audit records appended to a contact's activity timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What an activity record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// The contact moved between (or within) stages.
    StageChanged,
    /// The contact's assignees changed.
    AgentAssigned,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageChanged => write!(f, "stage_changed"),
            Self::AgentAssigned => write!(f, "agent_assigned"),
        }
    }
}

/// One entry in a contact's activity timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Record id.
    pub id: Uuid,
    /// The contact the record belongs to.
    pub contact_id: String,
    /// Record kind.
    pub kind: ActivityKind,
    /// Human-readable summary.
    pub summary: String,
    /// Structured detail (stages, order, agents).
    #[serde(default)]
    pub detail: serde_json::Value,
    /// Acting agent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// When the change was applied.
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Records a stage change.
    #[must_use]
    pub fn stage_changed(
        contact_id: impl Into<String>,
        from_stage: &str,
        to_stage: &str,
        order: u32,
    ) -> Self {
        let summary = if from_stage == to_stage {
            format!("Reordered within stage {to_stage} to position {order}")
        } else {
            format!("Moved from stage {from_stage} to {to_stage}")
        };

        Self {
            id: Uuid::new_v4(),
            contact_id: contact_id.into(),
            kind: ActivityKind::StageChanged,
            summary,
            detail: serde_json::json!({
                "fromStage": from_stage,
                "toStage": to_stage,
                "order": order,
            }),
            actor: None,
            created_at: Utc::now(),
        }
    }

    /// Records an assignment change.
    #[must_use]
    pub fn agent_assigned(contact_id: impl Into<String>, agents: &[String], policy: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id: contact_id.into(),
            kind: ActivityKind::AgentAssigned,
            summary: format!("Assigned to {}", agents.join(", ")),
            detail: serde_json::json!({
                "assignedTo": agents,
                "assignType": policy,
            }),
            actor: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the acting agent.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}
