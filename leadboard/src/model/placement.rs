//! Queued placement changes.

use serde::{Deserialize, Serialize};

/// The dedup key of a queued update: one live entry per contact and pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlacementKey {
    /// Contact id.
    pub contact_id: String,
    /// Pipeline id.
    pub pipeline_id: String,
}

/// A pending placement change, as stored locally and sent to the server.
///
/// The wire and durable record shape is
/// `{ contactId, pipelineId, stageId, order, userId? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementUpdate {
    /// The contact being moved.
    pub contact_id: String,
    /// The pipeline the move happens in.
    pub pipeline_id: String,
    /// Target stage.
    pub stage_id: String,
    /// Target 1-based position within the stage.
    pub order: u32,
    /// Agent to assign along with the move (drag-reassignment).
    #[serde(
        default,
        rename = "userId",
        alias = "agentId",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent_id: Option<String>,
}

impl PlacementUpdate {
    /// Creates a new placement update.
    #[must_use]
    pub fn new(
        contact_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        stage_id: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            contact_id: contact_id.into(),
            pipeline_id: pipeline_id.into(),
            stage_id: stage_id.into(),
            order,
            agent_id: None,
        }
    }

    /// Sets the agent to assign.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Returns the dedup key.
    #[must_use]
    pub fn key(&self) -> PlacementKey {
        PlacementKey {
            contact_id: self.contact_id.clone(),
            pipeline_id: self.pipeline_id.clone(),
        }
    }

    /// Returns true if this update shares a dedup key with `other`.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.contact_id == other.contact_id && self.pipeline_id == other.pipeline_id
    }

    /// Checks the record invariants of a persisted or received update.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.order >= 1
            && !self.contact_id.is_empty()
            && !self.pipeline_id.is_empty()
            && !self.stage_id.is_empty()
    }
}
