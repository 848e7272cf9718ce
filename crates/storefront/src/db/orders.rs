//! Order repository.

use tracing::instrument;

use subasa_core::{DocumentId, Order, OrderId, OrderStatus};

use super::{DocumentStore, ORDERS, RepositoryError, StoreError, decode};

/// Repository for the `orders` collection.
pub struct OrderRepository<'a, D> {
    store: &'a D,
}

impl<'a, D: DocumentStore> OrderRepository<'a, D> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a D) -> Self {
        Self { store }
    }

    /// Insert a new order. Returns the store-assigned document key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn create(&self, order: &Order) -> Result<DocumentId, RepositoryError> {
        let data = serde_json::to_value(order).map_err(StoreError::from)?;
        Ok(self.store.create(ORDERS, data).await?)
    }

    /// Get an order by document key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is malformed.
    pub async fn get(&self, id: &DocumentId) -> Result<Option<Order>, RepositoryError> {
        match self.store.get(ORDERS, id).await? {
            Some(doc) => Ok(Some(decode(&doc, ORDERS)?)),
            None => Ok(None),
        }
    }

    /// Find orders by business order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if a document is malformed.
    pub async fn find_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<(DocumentId, Order)>, RepositoryError> {
        let mut found = Vec::new();
        for doc in self.store.list(ORDERS).await? {
            if doc.data.get("orderId").and_then(|v| v.as_str()) == Some(order_id.as_str()) {
                let order = decode(&doc, ORDERS)?;
                found.push((doc.id, order));
            }
        }
        Ok(found)
    }

    /// Move an order to `status`, enforcing the order lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed or
    /// the order changed while updating.
    /// Returns `RepositoryError::Store` if the read or write fails.
    #[instrument(skip(self), fields(doc_id = %id, status = %status))]
    pub async fn set_status(
        &self,
        id: &DocumentId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let doc = self
            .store
            .get(ORDERS, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let mut order: Order = decode(&doc, ORDERS)?;

        if !order.status.can_transition_to(status) {
            return Err(RepositoryError::Conflict(format!(
                "order {} cannot move from {} to {status}",
                order.order_id, order.status
            )));
        }
        order.status = status;

        let data = serde_json::to_value(&order).map_err(StoreError::from)?;
        match self
            .store
            .update_if_version(ORDERS, id, data, doc.version)
            .await
        {
            Ok(_) => Ok(order),
            Err(StoreError::VersionMismatch { .. }) => Err(RepositoryError::Conflict(format!(
                "order {} changed while updating status",
                order.order_id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
