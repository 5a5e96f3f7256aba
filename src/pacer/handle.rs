//! Submission handle held by the owner and collaborators.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::SubmitError;
use crate::peers::{ProviderId, ProviderRef, StoreRef};

use super::message::PacerEvent;

/// Handle for submitting events to a pacer's mailbox.
///
/// Cheap to clone; every collaborator (the owner, each count provider, the
/// task store) holds one. The pacer itself is the only consumer.
#[derive(Clone)]
pub struct PacerHandle {
    tx: mpsc::Sender<PacerEvent>,
}

impl PacerHandle {
    pub(super) fn new(tx: mpsc::Sender<PacerEvent>) -> Self {
        Self { tx }
    }

    /// Submits an event (async, waits if the mailbox is full).
    pub async fn submit(&self, event: PacerEvent) -> Result<(), SubmitError> {
        self.tx.send(event).await.map_err(|_| SubmitError::Closed)
    }

    /// Submits without waiting (fails if the mailbox is full).
    pub fn try_submit(&self, event: PacerEvent) -> Result<(), SubmitError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Activates the pacer with its store handle and fixed provider set.
    ///
    /// Shorthand for submitting [`PacerEvent::Initialize`]; sent once by the
    /// owner.
    pub async fn initialize(
        &self,
        store: StoreRef,
        providers: Vec<ProviderRef>,
    ) -> Result<(), SubmitError> {
        self.submit(PacerEvent::Initialize { store, providers }).await
    }

    /// Delivers a provider's in-progress count reply.
    pub async fn count_fetched(
        &self,
        provider: ProviderId,
        count: u64,
    ) -> Result<(), SubmitError> {
        self.submit(PacerEvent::InProgressCountFetched { provider, count })
            .await
    }

    /// Delivers the task store's load-completion checkpoint.
    pub async fn tasks_loaded(&self, checkpoint: Instant) -> Result<(), SubmitError> {
        self.submit(PacerEvent::TasksLoaded { checkpoint }).await
    }
}
