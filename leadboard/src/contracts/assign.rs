//! The assignment call used by bulk intake and explicit reassignment.

use serde::{Deserialize, Serialize};

use crate::assignment::{AssignPolicy, AssignmentRequest};
use crate::errors::ItemFailure;
use crate::model::ActivityRecord;

/// A reference to an entity, either a bare id or a record carrying one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    /// `"c1"`
    Id(String),
    /// `{ "id": "c1", ... }` or `{ "_id": "c1", ... }`
    Record {
        /// The id.
        #[serde(alias = "_id")]
        id: String,
    },
}

impl IdRef {
    /// Returns the referenced id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Record { id } => id,
        }
    }
}

impl From<&str> for IdRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for IdRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// `{ contactIds | contacts, userIds | assignedUsers, assignType }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Contacts to assign, in order.
    #[serde(alias = "contacts")]
    pub contact_ids: Vec<IdRef>,
    /// Agents to assign to, in order.
    #[serde(alias = "assignedUsers")]
    pub user_ids: Vec<IdRef>,
    /// Distribution policy.
    #[serde(default)]
    pub assign_type: AssignPolicy,
    /// The acting agent, recorded on activity entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl AssignRequest {
    /// Creates a request from plain ids.
    #[must_use]
    pub fn new<C, U>(contact_ids: C, user_ids: U, assign_type: AssignPolicy) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            contact_ids: contact_ids.into_iter().map(|id| IdRef::Id(id.into())).collect(),
            user_ids: user_ids.into_iter().map(|id| IdRef::Id(id.into())).collect(),
            assign_type,
            actor: None,
        }
    }

    /// Sets the acting agent.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Converts to a distributor request.
    #[must_use]
    pub fn to_assignment_request(&self) -> AssignmentRequest {
        AssignmentRequest::new(
            self.contact_ids.iter().map(IdRef::id),
            self.user_ids.iter().map(IdRef::id),
            self.assign_type,
        )
    }
}

/// One contact's assignment outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedContact {
    /// The contact.
    pub contact_id: String,
    /// Its assignees after the call.
    pub assigned_to: Vec<String>,
    /// The audit entry appended for it.
    pub activity: ActivityRecord,
}

/// `{ success, data: AssignedContact[], failures? }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    /// Whether the request was processed.
    pub success: bool,
    /// Per-contact outcomes, in request order.
    #[serde(default)]
    pub data: Vec<AssignedContact>,
    /// Contacts that could not be assigned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_alias_fields_and_records() {
        let request: AssignRequest = serde_json::from_value(serde_json::json!({
            "contacts": [{"_id": "c1", "name": "Ada"}, "c2"],
            "assignedUsers": [{"id": "u1"}],
            "assignType": "EQUALLY"
        }))
        .unwrap();

        let distributor = request.to_assignment_request();
        assert_eq!(distributor.subjects, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(distributor.resources, vec!["u1".to_string()]);
        assert_eq!(distributor.policy, AssignPolicy::Equally);
    }

    #[test]
    fn test_default_policy_and_canonical_names() {
        let request: AssignRequest = serde_json::from_value(serde_json::json!({
            "contactIds": ["c1"],
            "userIds": ["u1", "u2"]
        }))
        .unwrap();
        assert_eq!(request.assign_type, AssignPolicy::RoundRobin);

        let json = serde_json::to_value(AssignRequest::new(["c1"], ["u1"], AssignPolicy::Every)).unwrap();
        assert_eq!(json["contactIds"], serde_json::json!(["c1"]));
        assert_eq!(json["assignType"], "every");
    }
}
