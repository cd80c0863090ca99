//! Contacts (sales leads) and where they sit on a board.

use serde::{Deserialize, Serialize};

/// The (pipeline, stage, order) triple describing where a contact sits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Pipeline id.
    pub pipeline_id: String,
    /// Stage id.
    pub stage_id: String,
    /// 1-based position within the stage.
    pub order: u32,
}

/// A sales lead as seen by the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Current pipeline.
    pub pipeline_id: String,
    /// Current stage.
    pub stage_id: String,
    /// 1-based position within the stage.
    pub order: u32,
    /// Assigned agent ids, in assignment order.
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// Free-form tags used by board filters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Contact {
    /// Creates a new contact at the given placement.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        pipeline_id: impl Into<String>,
        stage_id: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            pipeline_id: pipeline_id.into(),
            stage_id: stage_id.into(),
            order,
            assigned_to: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the assigned agents.
    #[must_use]
    pub fn with_assigned_to(mut self, agents: Vec<String>) -> Self {
        self.assigned_to = agents;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the current placement.
    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement {
            pipeline_id: self.pipeline_id.clone(),
            stage_id: self.stage_id.clone(),
            order: self.order,
        }
    }

    /// Returns true if the agent is among the assignees.
    #[must_use]
    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assigned_to.iter().any(|a| a == agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_wire_format() {
        let contact = Contact::new("c1", "p1", "new", 2)
            .with_name("Ada")
            .with_assigned_to(vec!["u1".to_string()]);

        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["pipelineId"], "p1");
        assert_eq!(json["stageId"], "new");
        assert_eq!(json["assignedTo"], serde_json::json!(["u1"]));
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_contact_accepts_document_id() {
        let contact: Contact = serde_json::from_value(serde_json::json!({
            "_id": "c9",
            "pipelineId": "p1",
            "stageId": "won",
            "order": 1
        }))
        .unwrap();

        assert_eq!(contact.id, "c9");
        assert!(contact.assigned_to.is_empty());
        assert_eq!(contact.placement().stage_id, "won");
    }
}
