#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::web;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use preorder_server::auth::{CodeMailer, MailError};
use preorder_server::db::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, Product, ProductDraft,
    ProductVariant, QrisCode, QrisDraft, QrisUpdate, StatusChange,
};
use preorder_server::error::DatabaseError;
use preorder_server::{
    AppError, AppState, Backends, CatalogStore, OrderStore, Settings, User, UserDirectory,
};
use tokio::sync::Mutex;
use uuid::Uuid;

pub const KNOWN_EMAIL: &str = "a@x.com";

/// Fixed set of registered users.
pub struct StaticDirectory(pub Vec<&'static str>);

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .0
            .iter()
            .find(|known| **known == email)
            .map(|known| User::new(known.to_string(), "Test User".to_string())))
    }
}

/// A user store whose database cannot be reached.
pub struct FailingDirectory;

#[async_trait]
impl UserDirectory for FailingDirectory {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Err(DatabaseError::ConnectionError("connection refused".to_string()).into())
    }
}

/// Keeps the last code sent to each address.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<HashMap<String, String>>,
}

impl Outbox {
    pub async fn code_for(&self, email: &str) -> Option<String> {
        self.sent.lock().await.get(email).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.sent.lock().await.is_empty()
    }
}

#[async_trait]
impl CodeMailer for Outbox {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        self.sent.lock().await.insert(email.to_string(), code.to_string());
        Ok(())
    }
}

fn variants_for(product_id: Uuid, draft: &ProductDraft, now: DateTime<Utc>) -> Vec<ProductVariant> {
    draft
        .variants
        .iter()
        .map(|v| ProductVariant {
            id: Uuid::new_v4(),
            product_id,
            name: v.name.clone(),
            price: v.price,
            stock: v.stock,
            is_available: v.is_available.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
        .collect()
}

fn apply_draft(product: &mut Product, draft: &ProductDraft, now: DateTime<Utc>) {
    product.name = draft.name.clone();
    product.short_description = draft.short_description.clone();
    product.description = draft.description.clone();
    product.price = draft.price;
    product.category = draft.category.clone();
    product.tag = draft.tag.clone();
    product.tag_color = draft.tag_color.clone();
    product.image_url_1 = draft.image_url_1.clone();
    product.image_url_2 = draft.image_url_2.clone();
    product.image_url_3 = draft.image_url_3.clone();
    product.stock = draft.stock;
    if let Some(is_available) = draft.is_available {
        product.is_available = is_available;
    }
    product.min_order = draft.min_order;
    product.min_order_tb = draft.min_order_tb;
    product.min_order_luar_tb = draft.min_order_luar_tb;
    product.available_days_tb = draft.available_days_tb.clone();
    product.available_days_luar_tb = draft.available_days_luar_tb.clone();
    product.conditions = serde_json::Value::from(draft.conditions.clone());
    product.addons = serde_json::Value::from(draft.addons.clone());
    product.qris_id = draft.qris_id;
    product.variants = variants_for(product.id, draft, now);
    product.updated_at = now;
}

/// Catalog kept in memory, newest entries first.
#[derive(Default)]
pub struct MemoryCatalog {
    products: Mutex<Vec<Product>>,
    qris: Mutex<Vec<QrisCode>>,
}

impl MemoryCatalog {
    pub async fn product_count(&self) -> usize {
        self.products.lock().await.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_products(&self, only_available: bool) -> Result<Vec<Product>, AppError> {
        Ok(self
            .products
            .lock()
            .await
            .iter()
            .filter(|p| !only_available || p.is_available)
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.products.lock().await.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, AppError> {
        let now = Utc::now();
        let mut product = Product {
            id: Uuid::new_v4(),
            name: String::new(),
            short_description: String::new(),
            description: String::new(),
            price: 0.0,
            category: String::new(),
            tag: String::new(),
            tag_color: String::new(),
            image_url_1: String::new(),
            image_url_2: String::new(),
            image_url_3: String::new(),
            stock: 0,
            is_available: true,
            min_order: 0,
            min_order_tb: 0,
            min_order_luar_tb: 0,
            available_days_tb: Vec::new(),
            available_days_luar_tb: Vec::new(),
            conditions: serde_json::json!([]),
            addons: serde_json::json!([]),
            qris_id: None,
            variants: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        apply_draft(&mut product, draft, now);
        self.products.lock().await.insert(0, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError> {
        let mut products = self.products.lock().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|product| {
            apply_draft(product, draft, Utc::now());
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError> {
        let mut products = self.products.lock().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() < before)
    }

    async fn toggle_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let mut products = self.products.lock().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|product| {
            product.is_available = !product.is_available;
            product.clone()
        }))
    }

    async fn list_qris(&self) -> Result<Vec<QrisCode>, AppError> {
        Ok(self.qris.lock().await.clone())
    }

    async fn find_qris(&self, id: Uuid) -> Result<Option<QrisCode>, AppError> {
        Ok(self.qris.lock().await.iter().find(|q| q.id == id).cloned())
    }

    async fn create_qris(&self, draft: &QrisDraft) -> Result<QrisCode, AppError> {
        let now = Utc::now();
        let qris = QrisCode {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            image_url: draft.image_url.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.qris.lock().await.insert(0, qris.clone());
        Ok(qris)
    }

    async fn update_qris(
        &self,
        id: Uuid,
        update: &QrisUpdate,
    ) -> Result<Option<QrisCode>, AppError> {
        let mut codes = self.qris.lock().await;
        Ok(codes.iter_mut().find(|q| q.id == id).map(|qris| {
            if let Some(name) = &update.name {
                qris.name = name.clone();
            }
            if let Some(image_url) = &update.image_url {
                qris.image_url = image_url.clone();
            }
            if let Some(is_active) = update.is_active {
                qris.is_active = is_active;
            }
            qris.updated_at = Utc::now();
            qris.clone()
        }))
    }

    async fn delete_qris(&self, id: Uuid) -> Result<bool, AppError> {
        let mut codes = self.qris.lock().await;
        let before = codes.len();
        codes.retain(|q| q.id != id);
        Ok(codes.len() < before)
    }

    async fn count_products_using_qris(&self, id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .products
            .lock()
            .await
            .iter()
            .filter(|p| p.qris_id == Some(id))
            .count() as i64)
    }
}

/// Orders kept in memory, newest first.
#[derive(Default)]
pub struct MemoryOrders {
    orders: Mutex<Vec<OrderWithItems>>,
}

impl MemoryOrders {
    /// Stores an order as if it had been written earlier.
    pub async fn seed(&self, order: OrderWithItems) {
        self.orders.lock().await.push(order);
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<OrderWithItems, AppError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let created = OrderWithItems {
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
        };
        self.orders.lock().await.insert(0, created.clone());
        Ok(created)
    }

    async fn list_orders(&self) -> Result<Vec<OrderWithItems>, AppError> {
        Ok(self.orders.lock().await.clone())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<OrderWithItems>, AppError> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .find(|o| o.order.id == id)
            .cloned())
    }

    async fn orders_for_customer(
        &self,
        identifier: &str,
    ) -> Result<Vec<OrderWithItems>, AppError> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| o.order.customer_phone == identifier || o.order.customer_email == identifier)
            .cloned()
            .collect())
    }

    async fn count_with_status(&self, status: &str) -> Result<i64, AppError> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| o.order.order_status == status)
            .count() as i64)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<Order>, AppError> {
        let mut orders = self.orders.lock().await;
        Ok(orders.iter_mut().find(|o| o.order.id == id).map(|entry| {
            let order = &mut entry.order;
            order.order_status = change.order_status.clone();
            if let Some(reason) = &change.cancellation_reason {
                order.cancellation_reason = reason.clone();
            }
            if change.cancelled_at.is_some() {
                order.cancelled_at = change.cancelled_at;
            }
            if let Some(photo) = &change.delivery_photo {
                order.delivery_photo = photo.clone();
            }
            if let Some(message) = &change.appreciation_message {
                order.appreciation_message = message.clone();
            }
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, AppError> {
        let mut orders = self.orders.lock().await;
        let before = orders.len();
        orders.retain(|o| o.order.id != id);
        Ok(orders.len() < before)
    }

    async fn purge_cancelled(
        &self,
        statuses: &[&'static str],
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut orders = self.orders.lock().await;
        let before = orders.len();
        orders.retain(|o| {
            let cancelled = statuses.contains(&o.order.order_status.as_str());
            let old = o.order.cancelled_at.is_some_and(|at| at < cutoff);
            !(cancelled && old)
        });
        Ok((before - orders.len()) as u64)
    }
}

/// A full app state over in-memory stores, with handles to inspect them.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub outbox: Arc<Outbox>,
    pub catalog: Arc<MemoryCatalog>,
    pub orders: Arc<MemoryOrders>,
}

pub fn context() -> TestContext {
    let outbox = Arc::new(Outbox::default());
    let catalog = Arc::new(MemoryCatalog::default());
    let orders = Arc::new(MemoryOrders::default());
    let state = build_state(Backends {
        users: Arc::new(StaticDirectory(vec![KNOWN_EMAIL])),
        catalog: catalog.clone(),
        orders: orders.clone(),
        mailer: outbox.clone(),
    });

    TestContext {
        state,
        outbox,
        catalog,
        orders,
    }
}

pub fn build_state(backends: Backends) -> web::Data<AppState> {
    let config = Settings::new().expect("Failed to load config");
    web::Data::new(AppState::with_backends(config, backends))
}

pub fn test_state(outbox: Arc<Outbox>) -> web::Data<AppState> {
    state_with_directory(Arc::new(StaticDirectory(vec![KNOWN_EMAIL])), outbox)
}

pub fn state_with_directory(
    directory: Arc<dyn UserDirectory>,
    outbox: Arc<Outbox>,
) -> web::Data<AppState> {
    build_state(Backends {
        users: directory,
        catalog: Arc::new(MemoryCatalog::default()),
        orders: Arc::new(MemoryOrders::default()),
        mailer: outbox,
    })
}

/// Logs the known user in through the code flow and returns the session
/// token.
pub async fn session_token(state: &web::Data<AppState>) -> String {
    let code = state.auth_service.codes().issue_code(KNOWN_EMAIL).await;
    state
        .auth_service
        .verify_code(KNOWN_EMAIL, &code)
        .await
        .expect("login failed")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// A checkout body that passes validation.
pub fn order_payload(phone: &str) -> serde_json::Value {
    serde_json::json!({
        "order": {
            "customer_name": "Budi Santoso",
            "customer_email": "budi@example.com",
            "customer_phone": phone,
            "delivery_address": "Jl. Merdeka No. 1, Bandung",
            "delivery_location": "TB",
            "delivery_date": "2026-03-20",
            "subtotal": 50000,
            "delivery_fee": 10000,
            "total": 60000,
            "payment_method": "qris"
        },
        "items": [
            { "product_name": "Nasi Bakar", "product_price": 25000, "quantity": 2 }
        ]
    })
}
