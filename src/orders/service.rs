use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{Order, OrderStore, OrderWithItems};
use crate::error::AppError;
use crate::orders::validation::{self, OrderRequest, OrderStatus, StatusUpdate};

fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}

/// Checkout and the admin side of the order lifecycle.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cancelled_retention: Duration,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, cancelled_retention: Duration) -> Self {
        Self {
            store,
            cancelled_retention,
        }
    }

    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderWithItems, AppError> {
        let (mut order, items) = validation::check_order(request)?;
        order.order_number = validation::generate_order_number(Utc::now());

        let created = self.store.create_order(&order, &items).await?;
        info!(
            order_number = %created.order.order_number,
            email = %created.order.customer_email,
            items = created.items.len(),
            "Order created"
        );
        Ok(created)
    }

    /// Every order, newest first. Cancelled orders past the retention period
    /// are removed first; a failed clean-up does not block the listing.
    pub async fn list_orders(&self) -> Result<Vec<OrderWithItems>, AppError> {
        let cutoff = Utc::now() - self.cancelled_retention;
        match self
            .store
            .purge_cancelled(&OrderStatus::CANCELLED_ALIASES, cutoff)
            .await
        {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Removed old cancelled orders"),
            Err(e) => warn!("Failed to remove old cancelled orders: {}", e),
        }

        self.store.list_orders().await
    }

    pub async fn pending_count(&self) -> Result<i64, AppError> {
        self.store
            .count_with_status(OrderStatus::Pending.as_str())
            .await
    }

    pub async fn find_order(&self, id: Uuid) -> Result<OrderWithItems, AppError> {
        self.store.find_order(id).await?.ok_or_else(order_not_found)
    }

    /// Orders placed with the given phone number or email address.
    pub async fn customer_orders(&self, identifier: &str) -> Result<Vec<OrderWithItems>, AppError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::ValidationError(
                "Phone number or email is required".to_string(),
            ));
        }
        self.store.orders_for_customer(identifier).await
    }

    pub async fn update_status(&self, id: Uuid, update: StatusUpdate) -> Result<Order, AppError> {
        let change = validation::status_change(update, Utc::now())?;
        let order = self
            .store
            .update_status(id, &change)
            .await?
            .ok_or_else(order_not_found)?;
        info!(order_number = %order.order_number, status = %order.order_status, "Order status updated");
        Ok(order)
    }

    pub async fn delete_order(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_order(id).await? {
            return Err(order_not_found());
        }
        info!(%id, "Order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::operations::MockOrderStore;
    use crate::db::{NewOrder, NewOrderItem, OrderItem};
    use crate::error::DatabaseError;
    use crate::orders::validation::{ItemInput, OrderInput};

    fn stored(order: &NewOrder, items: &[NewOrderItem]) -> OrderWithItems {
        let now = Utc::now();
        let id = Uuid::new_v4();
        OrderWithItems {
            order: Order {
                id,
                order_number: order.order_number.clone(),
                customer_name: order.customer_name.clone(),
                customer_email: order.customer_email.clone(),
                customer_phone: order.customer_phone.clone(),
                delivery_address: order.delivery_address.clone(),
                delivery_location: order.delivery_location.clone(),
                delivery_date: order.delivery_date,
                subtotal: order.subtotal,
                delivery_fee: order.delivery_fee,
                total: order.total,
                payment_method: order.payment_method.clone(),
                payment_status: order.payment_status.clone(),
                payment_proof: order.payment_proof.clone(),
                order_status: order.order_status.clone(),
                delivery_photo: String::new(),
                appreciation_message: String::new(),
                cancellation_reason: String::new(),
                cancelled_at: None,
                created_at: now,
                updated_at: now,
            },
            items: items
                .iter()
                .map(|item| OrderItem {
                    id: Uuid::new_v4(),
                    order_id: id,
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    product_price: item.product_price,
                    product_image: item.product_image.clone(),
                    quantity: item.quantity,
                    subtotal: item.subtotal,
                    created_at: now,
                })
                .collect(),
        }
    }

    fn request() -> OrderRequest {
        OrderRequest {
            order: OrderInput {
                customer_name: "Budi".to_string(),
                customer_email: "budi@example.com".to_string(),
                customer_phone: "081234567890".to_string(),
                delivery_address: "Jl. Merdeka 1".to_string(),
                total: 30_000.0,
                ..Default::default()
            },
            items: vec![ItemInput {
                product_name: "Es Teh".to_string(),
                product_price: 10_000.0,
                quantity: 3,
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_place_order_numbers_and_stores() {
        let mut store = MockOrderStore::new();
        store
            .expect_create_order()
            .withf(|order, items| {
                order.order_number.starts_with("ORD-")
                    && order.order_status == "processing"
                    && items.len() == 1
                    && items[0].subtotal == 30_000.0
            })
            .times(1)
            .returning(|order, items| Ok(stored(order, items)));

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        let created = orders.place_order(request()).await.unwrap();
        assert_eq!(created.order.payment_status, "paid");
    }

    #[tokio::test]
    async fn test_invalid_order_is_not_stored() {
        let mut store = MockOrderStore::new();
        store.expect_create_order().never();

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        let mut bad = request();
        bad.order.customer_email = "nope".to_string();
        assert!(matches!(
            orders.place_order(bad).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_purges_old_cancellations_first() {
        let mut seq = mockall::Sequence::new();
        let mut store = MockOrderStore::new();
        store
            .expect_purge_cancelled()
            .withf(|statuses, cutoff| {
                statuses.contains(&"dibatalkan")
                    && *cutoff <= Utc::now() - Duration::hours(24)
                    && *cutoff > Utc::now() - Duration::hours(25)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(3));
        store
            .expect_list_orders()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        assert!(orders.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_purge_still_lists() {
        let mut store = MockOrderStore::new();
        store.expect_purge_cancelled().returning(|_, _| {
            Err(AppError::DatabaseError(DatabaseError::QueryError("lock timeout".into())))
        });
        store.expect_list_orders().times(1).returning(|| Ok(Vec::new()));

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        assert!(orders.list_orders().await.is_ok());
    }

    #[tokio::test]
    async fn test_pending_count_asks_for_pending() {
        let mut store = MockOrderStore::new();
        store
            .expect_count_with_status()
            .with(mockall::predicate::eq("pending"))
            .returning(|_| Ok(4));

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        assert_eq!(orders.pending_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_status_update_on_missing_order() {
        let mut store = MockOrderStore::new();
        store.expect_update_status().returning(|_, _| Ok(None));
        store.expect_delete_order().returning(|_| Ok(false));

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        let update = StatusUpdate {
            status: "on_delivery".to_string(),
            ..Default::default()
        };
        let err = orders.update_status(Uuid::new_v4(), update).await.unwrap_err();
        assert_eq!(err.public_message(), "Order not found");
        assert!(matches!(
            orders.delete_order(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_status_never_reaches_store() {
        let mut store = MockOrderStore::new();
        store.expect_update_status().never();

        let orders = OrderService::new(Arc::new(store), Duration::hours(24));
        let update = StatusUpdate {
            status: "shipped".to_string(),
            ..Default::default()
        };
        let err = orders.update_status(Uuid::new_v4(), update).await.unwrap_err();
        assert_eq!(err.public_message(), "Invalid order status");
    }
}
