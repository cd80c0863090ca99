//! Save/Discard prompts for risky navigation.
//!
//! While the mutation queue is non-empty, every navigation attempt is
//! suspended until the user picks Save or Discard. A prompt that goes
//! unanswered blocks the navigation.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{BoardEvent, EventSink};
use crate::queue::MutationQueue;
use crate::sync::{FlushOutcome, FlushTrigger, SyncScheduler};

/// Flush attempts made for one Save choice.
const SAVE_ATTEMPTS: usize = 3;

/// The navigation being attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "path")]
pub enum NavigationKind {
    /// Browser back.
    Back,
    /// Browser forward.
    Forward,
    /// An in-app route change.
    Route(String),
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Back => write!(f, "back"),
            Self::Forward => write!(f, "forward"),
            Self::Route(path) => write!(f, "route:{path}"),
        }
    }
}

/// The two choices a prompt offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardChoice {
    /// Flush, then proceed.
    Save,
    /// Drop the queue, then proceed.
    Discard,
}

/// Why navigation stayed blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The prompt was closed without a choice.
    Dismissed,
    /// No choice arrived in time.
    TimedOut,
    /// Save was chosen but the flush did not succeed.
    SaveFailed(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dismissed => write!(f, "prompt dismissed"),
            Self::TimedOut => write!(f, "prompt timed out"),
            Self::SaveFailed(message) => write!(f, "save failed: {message}"),
        }
    }
}

/// Whether and how navigation may go ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Nothing was pending.
    Proceed,
    /// Pending changes were saved.
    ProceedAfterSave,
    /// Pending changes were discarded.
    ProceedAfterDiscard {
        /// Updates dropped.
        discarded: usize,
    },
    /// Navigation must not happen.
    Blocked(BlockReason),
}

impl NavigationOutcome {
    /// Returns true if the caller may navigate.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !matches!(self, Self::Blocked(_))
    }
}

/// What the UI needs to render an open prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInfo {
    /// Prompt id.
    pub id: Uuid,
    /// The suspended navigation.
    pub navigation: NavigationKind,
    /// Pending updates when the prompt opened.
    pub pending: usize,
    /// When the prompt opened.
    pub created_at: DateTime<Utc>,
}

struct Prompt {
    info: PromptInfo,
    response_tx: Option<oneshot::Sender<GuardChoice>>,
}

/// Suspends navigation while unsaved changes exist.
pub struct NavigationGuard {
    queue: MutationQueue,
    scheduler: Arc<SyncScheduler>,
    sink: Arc<dyn EventSink>,
    prompts: RwLock<HashMap<Uuid, Prompt>>,
}

impl fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("unsaved", &self.queue.len())
            .field("open_prompts", &self.prompts.read().len())
            .finish_non_exhaustive()
    }
}

impl NavigationGuard {
    /// Creates a guard over a queue and the scheduler that drains it.
    #[must_use]
    pub fn new(queue: MutationQueue, scheduler: Arc<SyncScheduler>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            queue,
            scheduler,
            sink,
            prompts: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true if navigating now would need a prompt.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Observes the pending count, for showing an unsaved indicator.
    #[must_use]
    pub fn watch_unsaved(&self) -> watch::Receiver<usize> {
        self.queue.subscribe()
    }

    /// Lists open prompts.
    #[must_use]
    pub fn pending_prompts(&self) -> Vec<PromptInfo> {
        let mut prompts: Vec<_> = self.prompts.read().values().map(|p| p.info.clone()).collect();
        prompts.sort_by_key(|p| p.created_at);
        prompts
    }

    /// Attempts a navigation.
    ///
    /// Returns at once when nothing is pending. Otherwise opens a prompt and
    /// waits up to `timeout` for [`NavigationGuard::save`] or
    /// [`NavigationGuard::discard`].
    pub async fn request_navigation(&self, kind: NavigationKind, timeout: Duration) -> NavigationOutcome {
        let pending = self.queue.len();
        if pending == 0 {
            return NavigationOutcome::Proceed;
        }

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        {
            let prompt = Prompt {
                info: PromptInfo {
                    id,
                    navigation: kind.clone(),
                    pending,
                    created_at: Utc::now(),
                },
                response_tx: Some(tx),
            };
            self.prompts.write().insert(id, prompt);
        }
        info!(prompt_id = %id, navigation = %kind, pending, "Navigation intercepted");
        self.sink
            .emit(BoardEvent::GuardIntercepted {
                prompt_id: id,
                pending,
                navigation: kind.to_string(),
            })
            .await;

        let choice = tokio::time::timeout(timeout, rx).await;
        self.prompts.write().remove(&id);

        let outcome = match choice {
            Ok(Ok(GuardChoice::Save)) => self.save_pending(id).await,
            Ok(Ok(GuardChoice::Discard)) => self.discard_pending(id).await,
            Ok(Err(_)) => NavigationOutcome::Blocked(BlockReason::Dismissed),
            Err(_) => NavigationOutcome::Blocked(BlockReason::TimedOut),
        };

        if let NavigationOutcome::Blocked(ref reason) = outcome {
            warn!(prompt_id = %id, %reason, "Navigation blocked");
            self.sink
                .emit(BoardEvent::GuardBlocked {
                    prompt_id: id,
                    reason: reason.to_string(),
                })
                .await;
        }
        outcome
    }

    /// Answers a prompt with Save. Returns false if the prompt is not open.
    pub fn save(&self, prompt_id: Uuid) -> bool {
        self.respond(prompt_id, GuardChoice::Save)
    }

    /// Answers a prompt with Discard. Returns false if the prompt is not open.
    pub fn discard(&self, prompt_id: Uuid) -> bool {
        self.respond(prompt_id, GuardChoice::Discard)
    }

    /// Closes a prompt without a choice, which blocks the navigation.
    pub fn dismiss(&self, prompt_id: Uuid) -> bool {
        self.prompts.write().remove(&prompt_id).is_some()
    }

    fn respond(&self, prompt_id: Uuid, choice: GuardChoice) -> bool {
        if let Some(mut prompt) = self.prompts.write().remove(&prompt_id) {
            if let Some(tx) = prompt.response_tx.take() {
                return tx.send(choice).is_ok();
            }
        }
        false
    }

    async fn save_pending(&self, prompt_id: Uuid) -> NavigationOutcome {
        for attempt in 1..=SAVE_ATTEMPTS {
            match self.scheduler.flush_now(FlushTrigger::Guard).await {
                Ok(FlushOutcome::Skipped) => {
                    debug!(%prompt_id, attempt, "Waiting for in-flight flush");
                    self.scheduler.wait_idle().await;
                }
                Ok(_) => {}
                Err(e) => return NavigationOutcome::Blocked(BlockReason::SaveFailed(e.to_string())),
            }

            if self.queue.is_empty() {
                self.sink.emit(BoardEvent::GuardSaved { prompt_id }).await;
                return NavigationOutcome::ProceedAfterSave;
            }
        }

        NavigationOutcome::Blocked(BlockReason::SaveFailed(format!(
            "{} change(s) still pending",
            self.queue.len()
        )))
    }

    async fn discard_pending(&self, prompt_id: Uuid) -> NavigationOutcome {
        // A flush already on the wire cannot be recalled. Let it land, then
        // drop only what it left behind.
        let discarded = {
            let _hold = self.scheduler.hold().await;
            self.queue.clear().len()
        };
        if let Err(e) = self.queue.persist().await {
            warn!(%prompt_id, error = %e, "Failed to persist discarded queue");
        }
        info!(%prompt_id, discarded, "Discarded unsaved changes");
        self.sink
            .emit(BoardEvent::GuardDiscarded { prompt_id, discarded })
            .await;
        NavigationOutcome::ProceedAfterDiscard { discarded }
    }
}
