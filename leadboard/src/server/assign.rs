//! The assignment endpoint: bulk intake and explicit reassignment.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ActivityLog, ContactRepository};
use crate::assignment::{distribute, Assignment, AssignPolicy};
use crate::contracts::{AssignRequest, AssignResponse, AssignedContact};
use crate::errors::{ItemFailure, ValidationError};
use crate::model::ActivityRecord;

/// Distributes contacts to agents and records who got what.
pub struct AssignmentService {
    repository: Arc<dyn ContactRepository>,
    activity: Arc<dyn ActivityLog>,
}

impl std::fmt::Debug for AssignmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentService").finish_non_exhaustive()
    }
}

impl AssignmentService {
    /// Creates the service.
    #[must_use]
    pub fn new(repository: Arc<dyn ContactRepository>, activity: Arc<dyn ActivityLog>) -> Self {
        Self { repository, activity }
    }

    /// Runs the distributor and writes each contact's assignees.
    ///
    /// # Errors
    ///
    /// Fails before any write when there are no agents.
    pub async fn assign(&self, request: AssignRequest) -> Result<AssignResponse, ValidationError> {
        let result = distribute(&request.to_assignment_request())?;
        let actor = request.actor.as_deref();

        let outcomes = join_all(
            result
                .iter()
                .map(|assignment| self.assign_one(assignment, result.policy, actor)),
        )
        .await;

        let mut response = AssignResponse {
            success: true,
            ..AssignResponse::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(assigned) => response.data.push(assigned),
                Err(failure) => response.failures.push(failure),
            }
        }

        info!(
            policy = %result.policy,
            contacts = result.len(),
            agents = result.resources.len(),
            failed = response.failures.len(),
            "Assigned contacts"
        );
        Ok(response)
    }

    async fn assign_one(
        &self,
        assignment: &Assignment,
        policy: AssignPolicy,
        actor: Option<&str>,
    ) -> Result<AssignedContact, ItemFailure> {
        let contact = self
            .repository
            .assign_agents(&assignment.subject, &assignment.resources)
            .await
            .map_err(|e| ItemFailure::new(&assignment.subject, e.to_string()))?;

        let mut activity = ActivityRecord::agent_assigned(&contact.id, &contact.assigned_to, policy.as_str());
        if let Some(actor) = actor {
            activity = activity.with_actor(actor);
        }
        if let Err(e) = self.activity.append(activity.clone()).await {
            warn!(contact_id = %contact.id, error = %e, "Failed to record activity");
        }

        Ok(AssignedContact {
            contact_id: contact.id,
            assigned_to: contact.assigned_to,
            activity,
        })
    }
}
