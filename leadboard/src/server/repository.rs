//! Contact storage collaborator and its in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::board::{ContactListing, ContactPage, ContactPageQuery};
use crate::errors::{ApplyError, Result, ValidationError};
use crate::model::{Contact, Pipeline, Placement, PlacementUpdate, Stage};

/// The effect of applying one placement update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementChange {
    /// The contact as stored after the write.
    pub contact: Contact,
    /// Where it was before.
    pub previous: Placement,
    /// Whether anything changed. False when re-applying an applied update.
    pub changed: bool,
}

/// Single-document contact writes.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Reads a contact.
    async fn get(&self, contact_id: &str) -> Option<Contact>;

    /// Moves a contact to the update's stage and order, renumbering both
    /// stages. No version check is made.
    async fn apply_placement(&self, update: &PlacementUpdate) -> std::result::Result<PlacementChange, ApplyError>;

    /// Replaces a contact's assignees.
    async fn assign_agents(&self, contact_id: &str, agents: &[String]) -> std::result::Result<Contact, ApplyError>;
}

type LaneKey = (String, String);

/// Contacts, pipelines, and per-stage ordering held in concurrent maps.
///
/// Lanes hold ordered contact ids. Every write to a contact runs under that
/// contact's write lock, so concurrent writes to one contact apply one after
/// the other and the last one wins. Lock order is contact write lock, then
/// lane entry, then contact documents; only one lane is locked at a time.
#[derive(Debug, Default)]
pub struct InMemoryContactRepository {
    pipelines: DashMap<String, Pipeline>,
    contacts: DashMap<String, Contact>,
    lanes: DashMap<LaneKey, Vec<String>>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

fn lane_key(pipeline_id: &str, stage_id: &str) -> LaneKey {
    (pipeline_id.to_string(), stage_id.to_string())
}

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

impl InMemoryContactRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a pipeline.
    pub fn set_pipeline(&self, pipeline: Pipeline) {
        for stage in &pipeline.stages {
            self.lanes.entry(lane_key(&pipeline.id, &stage.id)).or_default();
        }
        self.pipelines.insert(pipeline.id.clone(), pipeline);
    }

    /// Inserts a contact at its own order within its stage.
    pub fn insert_contact(&self, contact: Contact) {
        let write_lock = self.write_lock(&contact.id);
        let _write = write_lock.lock();

        let key = lane_key(&contact.pipeline_id, &contact.stage_id);
        let id = contact.id.clone();
        let order = contact.order;
        self.remove_from_lane_of(&id);
        self.contacts.insert(id.clone(), contact);

        let mut lane = self.lanes.entry(key).or_default();
        let index = lane
            .iter()
            .position(|other| self.contacts.get(other).is_some_and(|c| c.order > order))
            .unwrap_or(lane.len());
        lane.insert(index, id);
        self.renumber(&lane);
    }

    /// Returns a stage's contacts in order.
    #[must_use]
    pub fn lane(&self, pipeline_id: &str, stage_id: &str) -> Vec<Contact> {
        self.lanes
            .get(&lane_key(pipeline_id, stage_id))
            .map(|lane| {
                lane.iter()
                    .filter_map(|id| self.contacts.get(id).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of stored contacts.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    fn write_lock(&self, contact_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.write_locks.entry(contact_id.to_string()).or_default().value())
    }

    /// Moves one contact. Runs entirely under the contact's write lock.
    fn apply_locked(&self, update: &PlacementUpdate) -> std::result::Result<PlacementChange, ApplyError> {
        if !update.is_well_formed() {
            return Err(ApplyError::Invalid(format!(
                "order must be >= 1 and ids non-empty (contact '{}')",
                update.contact_id
            )));
        }
        if !self.stage_exists(&update.pipeline_id, &update.stage_id) {
            return Err(ApplyError::UnknownStage {
                pipeline_id: update.pipeline_id.clone(),
                stage_id: update.stage_id.clone(),
            });
        }
        if !self.contacts.contains_key(&update.contact_id) {
            return Err(ApplyError::ContactNotFound(update.contact_id.clone()));
        }

        let write_lock = self.write_lock(&update.contact_id);
        let _write = write_lock.lock();

        let (previous, previous_agents) = self
            .contacts
            .get(&update.contact_id)
            .map(|c| (c.placement(), c.assigned_to.clone()))
            .ok_or_else(|| ApplyError::ContactNotFound(update.contact_id.clone()))?;

        self.remove_from_lane_of(&update.contact_id);

        if let Some(mut contact) = self.contacts.get_mut(&update.contact_id) {
            contact.pipeline_id.clone_from(&update.pipeline_id);
            contact.stage_id.clone_from(&update.stage_id);
            if let Some(ref agent) = update.agent_id {
                contact.assigned_to = vec![agent.clone()];
            }
        }

        {
            let mut lane = self
                .lanes
                .entry(lane_key(&update.pipeline_id, &update.stage_id))
                .or_default();
            let index = usize::try_from(update.order - 1).unwrap_or(usize::MAX).min(lane.len());
            lane.insert(index, update.contact_id.clone());
            self.renumber(&lane);
        }

        let contact = self
            .contacts
            .get(&update.contact_id)
            .map(|c| c.clone())
            .ok_or_else(|| ApplyError::ContactNotFound(update.contact_id.clone()))?;
        let changed = contact.placement() != previous || contact.assigned_to != previous_agents;

        debug!(
            contact_id = %contact.id,
            stage_id = %contact.stage_id,
            order = contact.order,
            changed,
            "Applied placement"
        );
        Ok(PlacementChange {
            contact,
            previous,
            changed,
        })
    }

    fn assign_locked(&self, contact_id: &str, agents: &[String]) -> std::result::Result<Contact, ApplyError> {
        let write_lock = self.write_lock(contact_id);
        let _write = write_lock.lock();

        let mut contact = self
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| ApplyError::ContactNotFound(contact_id.to_string()))?;
        contact.assigned_to = agents.to_vec();
        Ok(contact.clone())
    }

    fn renumber(&self, lane: &[String]) {
        for (index, id) in lane.iter().enumerate() {
            if let Some(mut contact) = self.contacts.get_mut(id) {
                contact.order = position(index);
            }
        }
    }

    fn remove_from_lane_of(&self, contact_id: &str) {
        let Some(existing) = self.contacts.get(contact_id).map(|c| c.placement()) else {
            return;
        };
        if let Some(mut lane) = self.lanes.get_mut(&lane_key(&existing.pipeline_id, &existing.stage_id)) {
            lane.retain(|id| id != contact_id);
            self.renumber(&lane);
        }
    }

    fn stage_exists(&self, pipeline_id: &str, stage_id: &str) -> bool {
        self.pipelines
            .get(pipeline_id)
            .is_some_and(|p| p.has_stage(stage_id))
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn get(&self, contact_id: &str) -> Option<Contact> {
        self.contacts.get(contact_id).map(|c| c.clone())
    }

    async fn apply_placement(&self, update: &PlacementUpdate) -> std::result::Result<PlacementChange, ApplyError> {
        self.apply_locked(update)
    }

    async fn assign_agents(&self, contact_id: &str, agents: &[String]) -> std::result::Result<Contact, ApplyError> {
        self.assign_locked(contact_id, agents)
    }
}

#[async_trait]
impl ContactListing for InMemoryContactRepository {
    async fn list_stages(&self, pipeline_id: &str) -> Result<Vec<Stage>> {
        let pipeline = self.pipelines.get(pipeline_id).ok_or_else(|| ValidationError::InvalidPipeline {
            pipeline_id: pipeline_id.to_string(),
            message: "unknown pipeline".to_string(),
        })?;
        Ok(pipeline.stages.clone())
    }

    async fn list_contacts(&self, query: &ContactPageQuery) -> Result<ContactPage> {
        let lane = self.lane(&query.pipeline_id, &query.stage_id);
        let page_size = query.page_size.max(1);
        let start = (query.page.max(1) as usize - 1) * page_size;
        let contacts: Vec<_> = lane.iter().skip(start).take(page_size).cloned().collect();
        Ok(ContactPage {
            has_more: start + contacts.len() < lane.len(),
            contacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repository() -> InMemoryContactRepository {
        let repo = InMemoryContactRepository::new();
        repo.set_pipeline(
            Pipeline::new("p1", "Sales", vec![Stage::new("a", "A", 1), Stage::new("b", "B", 2)]).unwrap(),
        );
        for (i, id) in ["a1", "a2", "a3"].iter().enumerate() {
            repo.insert_contact(Contact::new(*id, "p1", "a", position(i)));
        }
        repo.insert_contact(Contact::new("b1", "p1", "b", 1));
        repo
    }

    fn ids(contacts: &[Contact]) -> Vec<(&str, u32)> {
        contacts.iter().map(|c| (c.id.as_str(), c.order)).collect()
    }

    #[tokio::test]
    async fn test_apply_moves_and_renumbers_both_lanes() {
        let repo = repository();
        let change = repo
            .apply_placement(&PlacementUpdate::new("a1", "p1", "b", 1))
            .await
            .unwrap();

        assert!(change.changed);
        assert_eq!(change.previous.stage_id, "a");
        assert_eq!(ids(&repo.lane("p1", "a")), vec![("a2", 1), ("a3", 2)]);
        assert_eq!(ids(&repo.lane("p1", "b")), vec![("a1", 1), ("b1", 2)]);
    }

    #[tokio::test]
    async fn test_reapplying_is_a_no_op() {
        let repo = repository();
        let update = PlacementUpdate::new("a3", "p1", "a", 1);

        assert!(repo.apply_placement(&update).await.unwrap().changed);
        let after_first = repo.lane("p1", "a");
        assert!(!repo.apply_placement(&update).await.unwrap().changed);
        assert_eq!(repo.lane("p1", "a"), after_first);
    }

    #[tokio::test]
    async fn test_order_is_clamped_to_lane_end() {
        let repo = repository();
        let change = repo
            .apply_placement(&PlacementUpdate::new("a1", "p1", "b", 99))
            .await
            .unwrap();
        assert_eq!(change.contact.order, 2);
    }

    #[tokio::test]
    async fn test_agent_replaces_assignees() {
        let repo = repository();
        let change = repo
            .apply_placement(&PlacementUpdate::new("b1", "p1", "b", 1).with_agent("u4"))
            .await
            .unwrap();
        assert!(change.changed);
        assert_eq!(change.contact.assigned_to, vec!["u4".to_string()]);
    }

    #[tokio::test]
    async fn test_rejections() {
        let repo = repository();
        assert_eq!(
            repo.apply_placement(&PlacementUpdate::new("ghost", "p1", "a", 1))
                .await
                .unwrap_err(),
            ApplyError::ContactNotFound("ghost".to_string())
        );
        assert!(matches!(
            repo.apply_placement(&PlacementUpdate::new("a1", "p1", "zz", 1)).await,
            Err(ApplyError::UnknownStage { .. })
        ));
        assert!(matches!(
            repo.apply_placement(&PlacementUpdate::new("a1", "p1", "a", 0)).await,
            Err(ApplyError::Invalid(_))
        ));
        assert_eq!(repo.lane("p1", "a").len(), 3);
    }

    #[tokio::test]
    async fn test_listing_pages() {
        let repo = repository();
        let page = repo
            .list_contacts(&ContactPageQuery {
                pipeline_id: "p1".to_string(),
                stage_id: "a".to_string(),
                page: 1,
                page_size: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.contacts.len(), 2);
        assert!(page.has_more);

        assert!(repo.list_stages("nope").await.is_err());
    }

    #[test]
    fn test_racing_writes_to_one_contact_leave_one_placement() {
        const WRITERS: usize = 8;
        let mut stages = vec![Stage::new("home", "Home", 0)];
        stages.extend((0..WRITERS).map(|i| Stage::new(format!("s{i}"), format!("S{i}"), position(i))));
        let repo = Arc::new(InMemoryContactRepository::new());
        repo.set_pipeline(Pipeline::new("p1", "Sales", stages).unwrap());
        repo.insert_contact(Contact::new("other", "p1", "home", 1));
        repo.insert_contact(Contact::new("c", "p1", "home", 2));

        for round in 0..200 {
            futures::executor::block_on(repo.apply_placement(&PlacementUpdate::new("c", "p1", "home", 2))).unwrap();

            let barrier = Arc::new(std::sync::Barrier::new(WRITERS));
            let writers: Vec<_> = (0..WRITERS)
                .map(|t| {
                    let repo = Arc::clone(&repo);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        let update = PlacementUpdate::new("c", "p1", format!("s{t}"), 1);
                        barrier.wait();
                        futures::executor::block_on(repo.apply_placement(&update)).unwrap()
                    })
                })
                .collect();
            let changes: Vec<PlacementChange> = writers.into_iter().map(|w| w.join().unwrap()).collect();

            let lanes: Vec<Vec<Contact>> = (0..WRITERS)
                .map(|i| repo.lane("p1", &format!("s{i}")))
                .collect();
            assert_eq!(ids(&repo.lane("p1", "home")), vec![("other", 1)], "round {round}: home lane");
            let holding: Vec<usize> = (0..WRITERS)
                .filter(|&i| lanes[i].iter().any(|c| c.id == "c"))
                .collect();
            assert_eq!(holding.len(), 1, "round {round}: contact is in lanes {holding:?}");
            assert_eq!(lanes.iter().map(Vec::len).sum::<usize>(), 1, "round {round}: lane sizes");
            for lane in &lanes {
                let orders: Vec<u32> = lane.iter().map(|c| c.order).collect();
                let expected: Vec<u32> = (1..).take(lane.len()).collect();
                assert_eq!(orders, expected, "round {round}: lane is not numbered 1..N");
            }

            // Applied one after another, each write starts where the previous
            // one left the contact, so only the last result is nobody's start.
            let stored = futures::executor::block_on(repo.get("c")).unwrap();
            assert_eq!(stored.stage_id, format!("s{}", holding[0]));
            assert_eq!(stored.order, 1);
            let unfollowed: Vec<&str> = changes
                .iter()
                .map(|c| c.contact.stage_id.as_str())
                .filter(|stage| !changes.iter().any(|c| c.previous.stage_id == *stage))
                .collect();
            assert_eq!(unfollowed, vec![stored.stage_id.as_str()], "round {round}: writes interleaved");
        }
    }
}
