//! Pipelines and their ordered stages.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ValidationError;

/// An ordered phase of a sales pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Stage id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Position within the pipeline. Unique per pipeline.
    pub order: u32,
    /// Conversion probability in percent (0..=100).
    #[serde(default)]
    pub probability: u8,
}

impl Stage {
    /// Creates a new stage.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            probability: 0,
        }
    }

    /// Sets the conversion probability, capped at 100.
    #[must_use]
    pub fn with_probability(mut self, probability: u8) -> Self {
        self.probability = probability.min(100);
        self
    }
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Pipeline id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stages sorted by `order`.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates a pipeline, sorting its stages by order.
    ///
    /// # Errors
    ///
    /// Fails when two stages share an id or an order value.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mut stages: Vec<Stage>,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let mut orders = HashSet::new();
        let mut ids = HashSet::new();

        for stage in &stages {
            if !orders.insert(stage.order) {
                return Err(ValidationError::InvalidPipeline {
                    pipeline_id: id,
                    message: format!("duplicate stage order {}", stage.order),
                });
            }
            if !ids.insert(stage.id.as_str()) {
                return Err(ValidationError::InvalidPipeline {
                    pipeline_id: id,
                    message: format!("duplicate stage id '{}'", stage.id),
                });
            }
        }

        stages.sort_by_key(|s| s.order);
        Ok(Self {
            id,
            name: name.into(),
            stages,
        })
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Returns true if the stage belongs to this pipeline.
    #[must_use]
    pub fn has_stage(&self, stage_id: &str) -> bool {
        self.stage(stage_id).is_some()
    }
}
