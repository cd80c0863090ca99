//! In-memory ordered stage/contact lists.
//!
//! The store is the single source of truth for rendering. Every mutation
//! renumbers the touched lanes to a contiguous 1..N sequence, and nothing
//! outside the store writes `Contact::order`.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::ContactFilter;
use crate::assignment::AssignmentResult;
use crate::errors::BoardError;
use crate::model::{Contact, Pipeline, PlacementUpdate, Stage};

/// One stage column, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneView {
    /// The stage.
    pub stage: Stage,
    /// Its visible contacts, in order.
    pub contacts: Vec<Contact>,
}

/// Ordered lanes of contacts for one pipeline.
#[derive(Debug, Clone, Default)]
pub struct BoardStore {
    pipeline_id: String,
    stages: Vec<Stage>,
    lanes: HashMap<String, Vec<Contact>>,
}

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

fn renumber(lane: &mut [Contact]) {
    for (index, contact) in lane.iter_mut().enumerate() {
        contact.order = position(index);
    }
}

impl BoardStore {
    /// Creates an empty store for a pipeline.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            stages: Vec::new(),
            lanes: HashMap::new(),
        }
    }

    /// Creates a store with the pipeline's stages and empty lanes.
    #[must_use]
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let mut store = Self::new(pipeline.id.clone());
        store.set_stages(pipeline.stages.clone());
        store
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the stages in stage order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Replaces the stage list. Lanes of removed stages are dropped.
    pub fn set_stages(&mut self, mut stages: Vec<Stage>) {
        stages.sort_by_key(|s| s.order);
        self.lanes.retain(|id, _| stages.iter().any(|s| &s.id == id));
        for stage in &stages {
            self.lanes.entry(stage.id.clone()).or_default();
        }
        self.stages = stages;
    }

    /// Replaces one lane with authoritative contacts, sorted and renumbered.
    ///
    /// # Errors
    ///
    /// Fails if the stage is not on this board.
    pub fn replace_lane(&mut self, stage_id: &str, mut contacts: Vec<Contact>) -> Result<(), BoardError> {
        let lane = self
            .lanes
            .get_mut(stage_id)
            .ok_or_else(|| BoardError::UnknownStage(stage_id.to_string()))?;

        contacts.sort_by_key(|c| c.order);
        for contact in &mut contacts {
            contact.pipeline_id.clone_from(&self.pipeline_id);
            contact.stage_id = stage_id.to_string();
        }
        renumber(&mut contacts);
        *lane = contacts;
        Ok(())
    }

    /// Returns a lane's contacts in order.
    #[must_use]
    pub fn lane(&self, stage_id: &str) -> Option<&[Contact]> {
        self.lanes.get(stage_id).map(Vec::as_slice)
    }

    /// Returns a contact by id.
    #[must_use]
    pub fn contact(&self, contact_id: &str) -> Option<&Contact> {
        self.lanes
            .values()
            .flat_map(|lane| lane.iter())
            .find(|c| c.id == contact_id)
    }

    /// Returns the number of contacts on the board.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.lanes.values().map(Vec::len).sum()
    }

    fn locate(&self, contact_id: &str) -> Option<(String, usize)> {
        self.lanes.iter().find_map(|(stage_id, lane)| {
            lane.iter()
                .position(|c| c.id == contact_id)
                .map(|index| (stage_id.clone(), index))
        })
    }

    fn ensure_stage(&self, stage_id: &str) -> Result<(), BoardError> {
        if self.lanes.contains_key(stage_id) {
            Ok(())
        } else {
            Err(BoardError::UnknownStage(stage_id.to_string()))
        }
    }

    /// Moves a contact to `target_index` (0-based) of `to_stage`.
    ///
    /// The index is clamped to the destination length. Both touched lanes
    /// are renumbered 1..N. Returns the update describing the new placement.
    ///
    /// # Errors
    ///
    /// Fails without touching the store if either stage is unknown or the
    /// contact is not in `from_stage`.
    pub fn move_contact(
        &mut self,
        contact_id: &str,
        from_stage: &str,
        to_stage: &str,
        target_index: usize,
    ) -> Result<PlacementUpdate, BoardError> {
        self.ensure_stage(from_stage)?;
        self.ensure_stage(to_stage)?;

        let source_index = self.lanes[from_stage]
            .iter()
            .position(|c| c.id == contact_id)
            .ok_or_else(|| {
                if self.contact(contact_id).is_some() {
                    BoardError::NotInStage {
                        contact_id: contact_id.to_string(),
                        stage_id: from_stage.to_string(),
                    }
                } else {
                    BoardError::UnknownContact(contact_id.to_string())
                }
            })?;

        let mut contact = self
            .lanes
            .get_mut(from_stage)
            .map(|lane| lane.remove(source_index))
            .ok_or_else(|| BoardError::UnknownStage(from_stage.to_string()))?;

        if let Some(source) = self.lanes.get_mut(from_stage) {
            renumber(source);
        }

        contact.stage_id = to_stage.to_string();
        let destination = self
            .lanes
            .get_mut(to_stage)
            .ok_or_else(|| BoardError::UnknownStage(to_stage.to_string()))?;
        let index = target_index.min(destination.len());
        destination.insert(index, contact);
        renumber(destination);

        debug!(
            contact_id,
            from_stage,
            to_stage,
            order = index + 1,
            "Moved contact on board"
        );

        Ok(PlacementUpdate::new(
            contact_id,
            self.pipeline_id.clone(),
            to_stage,
            position(index),
        ))
    }

    /// Moves a contact to the end of a stage (stage-select).
    ///
    /// # Errors
    ///
    /// Fails if the contact or stage is unknown.
    pub fn select_stage(&mut self, contact_id: &str, to_stage: &str) -> Result<PlacementUpdate, BoardError> {
        let (from_stage, _) = self
            .locate(contact_id)
            .ok_or_else(|| BoardError::UnknownContact(contact_id.to_string()))?;
        self.move_contact(contact_id, &from_stage, to_stage, usize::MAX)
    }

    /// Sets a single assignee, as done by drag-reassignment.
    ///
    /// # Errors
    ///
    /// Fails if the contact is unknown.
    pub fn assign_agent(&mut self, contact_id: &str, agent_id: &str) -> Result<(), BoardError> {
        let contact = self
            .lanes
            .values_mut()
            .flat_map(|lane| lane.iter_mut())
            .find(|c| c.id == contact_id)
            .ok_or_else(|| BoardError::UnknownContact(contact_id.to_string()))?;
        contact.assigned_to = vec![agent_id.to_string()];
        Ok(())
    }

    /// Replays a queued update on top of loaded state.
    ///
    /// Returns `Ok(false)` for updates that belong to another pipeline.
    ///
    /// # Errors
    ///
    /// Fails if the contact or target stage is not on the board.
    pub fn apply_update(&mut self, update: &PlacementUpdate) -> Result<bool, BoardError> {
        if update.pipeline_id != self.pipeline_id {
            return Ok(false);
        }

        let (from_stage, _) = self
            .locate(&update.contact_id)
            .ok_or_else(|| BoardError::UnknownContact(update.contact_id.clone()))?;
        let target_index = usize::try_from(update.order.saturating_sub(1)).unwrap_or(usize::MAX);
        self.move_contact(&update.contact_id, &from_stage, &update.stage_id, target_index)?;

        if let Some(ref agent) = update.agent_id {
            self.assign_agent(&update.contact_id, agent)?;
        }
        Ok(true)
    }

    /// Applies distributor output to local assignees.
    ///
    /// Subjects not on the board are skipped. Returns how many contacts changed.
    pub fn apply_assignment(&mut self, result: &AssignmentResult) -> usize {
        let mut changed = 0;
        for assignment in result.iter() {
            let contact = self
                .lanes
                .values_mut()
                .flat_map(|lane| lane.iter_mut())
                .find(|c| c.id == assignment.subject);

            if let Some(contact) = contact {
                contact.assigned_to.clone_from(&assignment.resources);
                changed += 1;
            }
        }
        changed
    }

    /// Returns the stages in order with their filtered contacts in order.
    #[must_use]
    pub fn visible_contacts(&self, filter: &ContactFilter) -> Vec<LaneView> {
        self.stages
            .iter()
            .filter(|stage| filter.includes_stage(&stage.id))
            .map(|stage| LaneView {
                stage: stage.clone(),
                contacts: self
                    .lanes
                    .get(&stage.id)
                    .map(|lane| lane.iter().filter(|c| filter.matches(c)).cloned().collect())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Returns true if every lane is numbered 1..N.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.lanes.values().all(|lane| {
            lane.iter()
                .enumerate()
                .all(|(index, c)| c.order == position(index))
        })
    }
}
