//! The distribution algorithm.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::AssignPolicy;
use crate::errors::ValidationError;

/// Ordered subjects, ordered resources, and the policy to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    /// Subject ids (contacts), in input order.
    pub subjects: Vec<String>,
    /// Resource ids (agents), in input order.
    pub resources: Vec<String>,
    /// Distribution policy.
    pub policy: AssignPolicy,
}

impl AssignmentRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new<S, R>(subjects: S, resources: R, policy: AssignPolicy) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            policy,
        }
    }
}

/// The resources one subject maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// The subject id.
    pub subject: String,
    /// The resources it maps to. One element unless the policy is `Every`.
    pub resources: Vec<String>,
}

/// The output of [`distribute`]: one entry per subject, in subject order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    /// The policy that produced this result.
    pub policy: AssignPolicy,
    /// The resource list the result was computed over.
    pub resources: Vec<String>,
    /// One entry per subject.
    pub assignments: Vec<Assignment>,
}

impl AssignmentResult {
    /// Returns the number of subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns true if there were no subjects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterates the assignments in subject order.
    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    /// Returns the resources a subject maps to.
    #[must_use]
    pub fn resources_for(&self, subject: &str) -> Option<&[String]> {
        self.assignments
            .iter()
            .find(|a| a.subject == subject)
            .map(|a| a.resources.as_slice())
    }

    /// Returns how many subjects each resource received, in resource order.
    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        self.resources
            .iter()
            .map(|resource| {
                self.assignments
                    .iter()
                    .filter(|a| a.resources.contains(resource))
                    .count()
            })
            .collect()
    }
}

/// Index of the resource that subject `index` maps to under `Equally`.
///
/// The first `base * m` subjects form `m` contiguous blocks of `base`; the
/// tail is spread one per resource starting from resource 0.
const fn equally_slot(index: usize, n: usize, m: usize) -> usize {
    let base = n / m;
    let blocked = base * m;
    if index < blocked {
        index / base
    } else {
        (index - blocked) % m
    }
}

/// Distributes the request's subjects over its resources.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAssignment`] when there are no
/// resources and [`ValidationError::DuplicateResource`] when a resource is
/// listed twice. An empty subject list yields an empty result.
pub fn distribute(request: &AssignmentRequest) -> Result<AssignmentResult, ValidationError> {
    let n = request.subjects.len();
    let m = request.resources.len();

    if m == 0 {
        return Err(ValidationError::InvalidAssignment { subjects: n });
    }
    let mut seen = HashSet::with_capacity(m);
    if let Some(duplicate) = request.resources.iter().find(|r| !seen.insert(r.as_str())) {
        return Err(ValidationError::DuplicateResource {
            resource_id: duplicate.clone(),
        });
    }

    let assignments = request
        .subjects
        .iter()
        .enumerate()
        .map(|(index, subject)| {
            let resources = match request.policy {
                AssignPolicy::Every => request.resources.clone(),
                AssignPolicy::Equally => vec![request.resources[equally_slot(index, n, m)].clone()],
                AssignPolicy::RoundRobin => vec![request.resources[index % m].clone()],
            };
            Assignment {
                subject: subject.clone(),
                resources,
            }
        })
        .collect();

    Ok(AssignmentResult {
        policy: request.policy,
        resources: request.resources.clone(),
        assignments,
    })
}
