//! Optimistic Mutator for promptshelf.
//!
//! Applies a local state transition before the server confirms it, then
//! converges on the server's answer:
//!
//! 1. the speculative layer is written to the entity table and published
//!    before [`OptimisticMutator::apply`] returns;
//! 2. a spawned task waits for earlier layers on the same entity, then runs
//!    the request against the current server value;
//! 3. success replaces the server value with the authoritative answer,
//!    failure withdraws the layer. Both publish.
//!
//! The mutation runs to completion even if the caller drops the returned
//! future, so a surface that unmounts mid-request never leaves the shared
//! store half-updated.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::Instrument;

use crate::managers::entity_store::{EntityTable, LayerTicket, StoredEntity};
use crate::types::errors::EngagementError;

/// An in-flight mutation. The optimistic write has already happened.
pub type Pending<T> = Pin<Box<dyn Future<Output = Result<T, EngagementError>> + Send>>;

/// A mutation rejected before anything was written.
pub fn rejected<T: Send + 'static>(err: EngagementError) -> Pending<T> {
    Box::pin(async move { Err(err) })
}

/// Generic apply/rollback engine shared by the bookmark and like services.
#[derive(Clone, Default)]
pub struct OptimisticMutator {
    in_flight: Arc<AtomicUsize>,
}

impl OptimisticMutator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutations queued or awaiting the server.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Applies `mutate` to `entity_id` now and reconciles with `request`.
    ///
    /// `mutate` must be pure: it is re-run whenever an earlier layer on the
    /// same entity resolves. `request` receives the server value current at
    /// dispatch time and returns the authoritative new value.
    ///
    /// Resolves to the authoritative value. Must be called inside a Tokio
    /// runtime.
    pub fn apply<T, M, R, Fut>(
        &self,
        table: &Arc<EntityTable<T>>,
        entity_id: &str,
        mutate: M,
        request: R,
    ) -> Pending<Option<T>>
    where
        T: StoredEntity,
        M: Fn(Option<&T>) -> Option<T> + Send + Sync + 'static,
        R: FnOnce(Option<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, EngagementError>> + Send + 'static,
    {
        let ticket = table.push_layer(entity_id, Arc::new(mutate));
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let span = tracing::debug_span!("mutation", kind = %T::KIND, id = entity_id, seq = ticket.seq);
        let mut guard = LayerGuard {
            table: table.clone(),
            ticket: Some(ticket),
            in_flight: self.in_flight.clone(),
        };

        let handle = tokio::spawn(
            async move {
                guard.wait_turn().await;
                let base = guard.server_value();
                let outcome = request(base).await;
                guard.resolve(outcome)
            }
            .instrument(span),
        );

        Box::pin(async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(EngagementError::TaskFailed(err.to_string())),
            }
        })
    }
}

/// Owns a queued layer until it resolves. If the task is torn down before
/// that (runtime shutdown, panic in the request) the layer is rolled back so
/// later layers on the entity are not blocked.
struct LayerGuard<T: StoredEntity> {
    table: Arc<EntityTable<T>>,
    ticket: Option<LayerTicket>,
    in_flight: Arc<AtomicUsize>,
}

impl<T: StoredEntity> LayerGuard<T> {
    async fn wait_turn(&mut self) {
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.wait_turn().await;
        }
    }

    fn server_value(&self) -> Option<T> {
        self.ticket
            .as_ref()
            .and_then(|ticket| self.table.server_value(&ticket.entity_id))
    }

    fn resolve(
        mut self,
        outcome: Result<Option<T>, EngagementError>,
    ) -> Result<Option<T>, EngagementError> {
        let Some(ticket) = self.ticket.take() else {
            return Err(EngagementError::TaskFailed("layer already resolved".to_string()));
        };
        let result = match outcome {
            Ok(authoritative) => {
                self.table.reconcile(&ticket, authoritative.clone());
                Ok(authoritative)
            }
            Err(err) => {
                tracing::warn!(id = %ticket.entity_id, error = %err, "mutation failed, rolling back");
                self.table.rollback(&ticket);
                Err(err)
            }
        };
        ticket.finish();
        result
    }
}

impl<T: StoredEntity> Drop for LayerGuard<T> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            tracing::warn!(id = %ticket.entity_id, seq = ticket.seq, "mutation abandoned, rolling back");
            self.table.rollback(&ticket);
            ticket.finish();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
