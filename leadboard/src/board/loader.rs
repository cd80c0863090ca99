//! Loading a board from a contact listing.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::BoardStore;
use crate::errors::Result;
use crate::model::{Contact, Stage};

/// Upper bound on pages fetched for a single stage.
const MAX_PAGES_PER_STAGE: u32 = 1_000;

/// One page request for a stage's contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPageQuery {
    /// Pipeline id.
    pub pipeline_id: String,
    /// Stage id.
    pub stage_id: String,
    /// 1-based page number.
    pub page: u32,
    /// Contacts per page.
    pub page_size: usize,
}

/// One page of a stage's contacts, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPage {
    /// The contacts on this page.
    pub contacts: Vec<Contact>,
    /// Whether another page follows.
    #[serde(default)]
    pub has_more: bool,
}

/// Read access to stages and paginated contacts.
#[async_trait]
pub trait ContactListing: Send + Sync {
    /// Lists a pipeline's stages.
    async fn list_stages(&self, pipeline_id: &str) -> Result<Vec<Stage>>;

    /// Lists one page of a stage's contacts.
    async fn list_contacts(&self, query: &ContactPageQuery) -> Result<ContactPage>;
}

/// Builds a [`BoardStore`] by paging every stage of a pipeline.
#[derive(Clone)]
pub struct BoardLoader {
    listing: Arc<dyn ContactListing>,
    page_size: usize,
}

impl BoardLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(listing: Arc<dyn ContactListing>, page_size: usize) -> Self {
        Self {
            listing,
            page_size: page_size.max(1),
        }
    }

    /// Loads the full board for a pipeline. Stages are fetched concurrently.
    ///
    /// # Errors
    ///
    /// Fails if the stage list or any contact page cannot be fetched.
    pub async fn load(&self, pipeline_id: &str) -> Result<BoardStore> {
        let stages = self.listing.list_stages(pipeline_id).await?;
        let mut store = BoardStore::new(pipeline_id);
        store.set_stages(stages.clone());

        let lanes = join_all(stages.iter().map(|stage| self.load_stage(pipeline_id, &stage.id))).await;

        for (stage, lane) in stages.iter().zip(lanes) {
            store.replace_lane(&stage.id, lane?)?;
        }

        debug!(
            pipeline_id,
            stages = store.stages().len(),
            contacts = store.contact_count(),
            "Loaded board"
        );
        Ok(store)
    }

    async fn load_stage(&self, pipeline_id: &str, stage_id: &str) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        let mut page = 1;

        loop {
            let query = ContactPageQuery {
                pipeline_id: pipeline_id.to_string(),
                stage_id: stage_id.to_string(),
                page,
                page_size: self.page_size,
            };
            let result = self.listing.list_contacts(&query).await?;
            let fetched = result.contacts.len();
            contacts.extend(result.contacts);

            if !result.has_more || fetched == 0 {
                break;
            }
            if page >= MAX_PAGES_PER_STAGE {
                warn!(pipeline_id, stage_id, page, "Stopped paging stage at page limit");
                break;
            }
            page += 1;
        }

        Ok(contacts)
    }
}
