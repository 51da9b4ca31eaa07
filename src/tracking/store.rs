//! Durable tracked-order store
//!
//! The store is a single JSON document holding the ordered list of tracked
//! orders. Every access goes through [`OrderStore::lock`], which serializes
//! the reconciliation loop and the command surface and reloads the document
//! so that a record removed by another writer is never resurrected.

use super::{OrderStatus, TrackedOrder};
use crate::data::{read_document, write_document, DocumentError};
use crate::error::{Result, TrailError};
use crate::exchange::{ExchangeGateway, GatewayError};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

/// Tracked-order store backed by one JSON document
pub struct OrderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Exclusive view of the store; changes become durable on [`StoreGuard::commit`]
pub struct StoreGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    path: &'a Path,
    orders: Vec<TrackedOrder>,
}

impl OrderStore {
    /// Open the store at `path` (the file is created on first save)
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Document location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire exclusive access and load the current document
    pub async fn lock(&self) -> std::result::Result<StoreGuard<'_>, DocumentError> {
        let guard = self.lock.lock().await;
        let orders: Vec<TrackedOrder> = read_document(&self.path).await?;
        Ok(StoreGuard {
            _lock: guard,
            path: &self.path,
            orders,
        })
    }

    /// Snapshot of every tracked order in insertion order
    pub async fn list(&self) -> Result<Vec<TrackedOrder>> {
        Ok(self.lock().await?.orders.clone())
    }

    /// Single-record read
    pub async fn get(&self, id: &str) -> Result<Option<TrackedOrder>> {
        Ok(self.lock().await?.get(id).cloned())
    }

    /// Single-record upsert
    pub async fn put(&self, order: TrackedOrder) -> Result<()> {
        let mut guard = self.lock().await?;
        guard.put(order);
        guard.commit().await?;
        Ok(())
    }

    /// Insert a newly bound order.
    ///
    /// The caller must already have matched `order` against a live exchange
    /// order. An existing record with the same id is replaced unless it is
    /// still active; an exchange order already owned by another live record
    /// is rejected.
    pub async fn bind(&self, order: TrackedOrder) -> Result<TrackedOrder> {
        let mut guard = self.lock().await?;

        if let Some(existing) = guard.get(&order.id) {
            if existing.status == OrderStatus::Active {
                return Err(TrailError::AlreadyTracked(order.id));
            }
            tracing::info!(
                order_id = %order.id,
                previous_status = %existing.status,
                "Rebinding tracked order"
            );
        }

        if let Some(owner) = guard.orders().iter().find(|o| {
            o.id != order.id
                && o.status.is_live()
                && o.symbol == order.symbol
                && o.exchange_order_id == order.exchange_order_id
        }) {
            return Err(TrailError::InvalidBinding(format!(
                "exchange order {} is already tracked by {}",
                order.exchange_order_id, owner.id
            )));
        }

        guard.put(order.clone());
        guard.commit().await?;

        tracing::info!(
            order_id = %order.id,
            exchange_order_id = order.exchange_order_id,
            quantity = %order.quantity,
            "Order bound"
        );
        Ok(order)
    }

    /// Stop tracking `id`, cancelling its exchange order first when it may
    /// still be live. A failed cancellation leaves the store untouched.
    pub async fn remove(&self, id: &str, gateway: &dyn ExchangeGateway) -> Result<TrackedOrder> {
        let mut guard = self.lock().await?;
        let order = guard
            .get(id)
            .cloned()
            .ok_or_else(|| TrailError::OrderNotFound(id.to_string()))?;

        if order.status.is_live() {
            match gateway
                .cancel_order(&order.symbol, order.exchange_order_id)
                .await
            {
                Ok(()) => {}
                // Already gone on the exchange; nothing left to cancel
                Err(GatewayError::UnknownOrder { .. }) => {
                    tracing::info!(order_id = %id, "Exchange order already closed");
                }
                Err(e) => {
                    tracing::warn!(order_id = %id, error = %e, "Cancel failed, keeping order");
                    return Err(e.into());
                }
            }
        }

        guard.remove(id);
        guard.commit().await?;

        tracing::info!(order_id = %id, "Order removed");
        Ok(order)
    }

    /// Drop every record in a terminal status, returning what was removed
    pub async fn prune(&self) -> Result<Vec<TrackedOrder>> {
        let mut guard = self.lock().await?;
        let (terminal, kept): (Vec<_>, Vec<_>) = guard
            .orders
            .drain(..)
            .partition(|o| o.status.is_terminal());
        guard.orders = kept;

        if !terminal.is_empty() {
            guard.commit().await?;
            tracing::info!(count = terminal.len(), "Pruned terminal orders");
        }
        Ok(terminal)
    }
}

impl StoreGuard<'_> {
    /// All records in insertion order
    pub fn orders(&self) -> &[TrackedOrder] {
        &self.orders
    }

    pub fn get(&self, id: &str) -> Option<&TrackedOrder> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Replace the record with the same id in place, or append
    pub fn put(&mut self, order: TrackedOrder) {
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(slot) => *slot = order,
            None => self.orders.push(order),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<TrackedOrder> {
        let index = self.orders.iter().position(|o| o.id == id)?;
        Some(self.orders.remove(index))
    }

    /// Atomically rewrite the document with the current contents
    pub async fn commit(&mut self) -> std::result::Result<(), DocumentError> {
        write_document(self.path, &self.orders).await
    }
}
