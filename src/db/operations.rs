use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, Product, ProductDraft,
    ProductVariant, QrisCode, QrisDraft, QrisUpdate, StatusChange, User,
};
use crate::error::AppError;

// Numeric columns are cast so rows decode the same whether the schema uses
// NUMERIC/INT4 or FLOAT8/INT8.
const PRODUCT_COLUMNS: &str = "id, name, short_description, description, \
    price::FLOAT8 AS price, category, tag, tag_color, image_url_1, image_url_2, image_url_3, \
    stock::INT8 AS stock, is_available, min_order::INT8 AS min_order, \
    min_order_tb::INT8 AS min_order_tb, min_order_luar_tb::INT8 AS min_order_luar_tb, \
    COALESCE(available_days_tb, '{}') AS available_days_tb, \
    COALESCE(available_days_luar_tb, '{}') AS available_days_luar_tb, \
    COALESCE(conditions, '[]'::JSONB) AS conditions, COALESCE(addons, '[]'::JSONB) AS addons, \
    qris_id, created_at, updated_at";

const VARIANT_COLUMNS: &str = "id, product_id, name, price::FLOAT8 AS price, \
    stock::INT8 AS stock, is_available, created_at, updated_at";

const QRIS_COLUMNS: &str = "id, name, image_url, is_active, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_email, customer_phone, \
    delivery_address, delivery_location, delivery_date, subtotal::FLOAT8 AS subtotal, \
    delivery_fee::FLOAT8 AS delivery_fee, total::FLOAT8 AS total, payment_method, \
    payment_status, payment_proof, order_status, delivery_photo, appreciation_message, \
    cancellation_reason, cancelled_at, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, \
    product_price::FLOAT8 AS product_price, product_image, quantity::INT8 AS quantity, \
    subtotal::FLOAT8 AS subtotal, created_at";

/// Read access to registered users, used to decide who may log in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

/// Products, their variants and the QRIS codes they reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Newest first. Variants are attached.
    async fn list_products(&self, only_available: bool) -> Result<Vec<Product>, AppError>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, AppError>;
    /// Overwrites every field and replaces the variant list.
    async fn update_product(
        &self,
        id: Uuid,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError>;
    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError>;
    /// Flips availability in place and returns the updated product.
    async fn toggle_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn list_qris(&self) -> Result<Vec<QrisCode>, AppError>;
    async fn find_qris(&self, id: Uuid) -> Result<Option<QrisCode>, AppError>;
    async fn create_qris(&self, draft: &QrisDraft) -> Result<QrisCode, AppError>;
    async fn update_qris(&self, id: Uuid, update: &QrisUpdate)
        -> Result<Option<QrisCode>, AppError>;
    async fn delete_qris(&self, id: Uuid) -> Result<bool, AppError>;
    async fn count_products_using_qris(&self, id: Uuid) -> Result<i64, AppError>;
}

/// Orders and their line items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order and all of its items atomically.
    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<OrderWithItems, AppError>;
    /// Newest first.
    async fn list_orders(&self) -> Result<Vec<OrderWithItems>, AppError>;
    async fn find_order(&self, id: Uuid) -> Result<Option<OrderWithItems>, AppError>;
    /// Orders whose customer phone or email equals `identifier`, newest first.
    async fn orders_for_customer(&self, identifier: &str)
        -> Result<Vec<OrderWithItems>, AppError>;
    async fn count_with_status(&self, status: &str) -> Result<i64, AppError>;
    async fn update_status(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<Order>, AppError>;
    async fn delete_order(&self, id: Uuid) -> Result<bool, AppError>;
    /// Removes orders in any of `statuses` cancelled before `cutoff`.
    async fn purge_cancelled(
        &self,
        statuses: &[&'static str],
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}

pub struct DbOperations {
    pool: PgPool,
}

impl DbOperations {
    /// Builds a pool that connects on first use, so the server can start
    /// while the database is still unreachable.
    pub fn new_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;

        Ok(Self { pool })
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, phone, role, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn attach_variants(&self, products: &mut [Product]) -> Result<(), AppError> {
        if products.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants \
             WHERE product_id = ANY($1) ORDER BY created_at"
        );
        let variants = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_product: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
        for variant in variants {
            by_product.entry(variant.product_id).or_default().push(variant);
        }
        for product in products.iter_mut() {
            product.variants = by_product.remove(&product.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn insert_variants(
        transaction: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        draft: &ProductDraft,
    ) -> Result<(), AppError> {
        for variant in &draft.variants {
            sqlx::query(
                "INSERT INTO product_variants \
                 (id, product_id, name, price, stock, is_available, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())",
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(&variant.name)
            .bind(variant.price)
            .bind(variant.stock)
            .bind(variant.is_available.unwrap_or(true))
            .execute(&mut **transaction)
            .await?;
        }
        Ok(())
    }

    async fn attach_items(&self, orders: Vec<Order>) -> Result<Vec<OrderWithItems>, AppError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let sql = format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items \
             WHERE order_id = ANY($1) ORDER BY created_at"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

#[async_trait]
impl UserDirectory for DbOperations {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.get_user_by_email(email).await
    }
}

#[async_trait]
impl CatalogStore for DbOperations {
    async fn list_products(&self, only_available: bool) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1 = FALSE OR is_available) ORDER BY created_at DESC"
        );
        let mut products = sqlx::query_as::<_, Product>(&sql)
            .bind(only_available)
            .fetch_all(&self.pool)
            .await?;

        self.attach_variants(&mut products).await?;
        Ok(products)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match product {
            Some(product) => {
                let mut found = [product];
                self.attach_variants(&mut found).await?;
                let [product] = found;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let sql = format!(
            "INSERT INTO products (id, name, short_description, description, price, category, \
             tag, tag_color, image_url_1, image_url_2, image_url_3, stock, is_available, \
             min_order, min_order_tb, min_order_luar_tb, available_days_tb, \
             available_days_luar_tb, conditions, addons, qris_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, NOW(), NOW()) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.name)
            .bind(&draft.short_description)
            .bind(&draft.description)
            .bind(draft.price)
            .bind(&draft.category)
            .bind(&draft.tag)
            .bind(&draft.tag_color)
            .bind(&draft.image_url_1)
            .bind(&draft.image_url_2)
            .bind(&draft.image_url_3)
            .bind(draft.stock)
            .bind(draft.is_available.unwrap_or(true))
            .bind(draft.min_order)
            .bind(draft.min_order_tb)
            .bind(draft.min_order_luar_tb)
            .bind(&draft.available_days_tb)
            .bind(&draft.available_days_luar_tb)
            .bind(serde_json::Value::from(draft.conditions.clone()))
            .bind(serde_json::Value::from(draft.addons.clone()))
            .bind(draft.qris_id)
            .fetch_one(&mut *transaction)
            .await?;

        Self::insert_variants(&mut transaction, product.id, draft).await?;
        transaction.commit().await?;

        let mut created = [product];
        self.attach_variants(&mut created).await?;
        let [product] = created;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let sql = format!(
            "UPDATE products SET name = $2, short_description = $3, description = $4, \
             price = $5, category = $6, tag = $7, tag_color = $8, image_url_1 = $9, \
             image_url_2 = $10, image_url_3 = $11, stock = $12, \
             is_available = COALESCE($13, is_available), min_order = $14, min_order_tb = $15, \
             min_order_luar_tb = $16, available_days_tb = $17, available_days_luar_tb = $18, \
             conditions = $19, addons = $20, qris_id = $21, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&draft.name)
            .bind(&draft.short_description)
            .bind(&draft.description)
            .bind(draft.price)
            .bind(&draft.category)
            .bind(&draft.tag)
            .bind(&draft.tag_color)
            .bind(&draft.image_url_1)
            .bind(&draft.image_url_2)
            .bind(&draft.image_url_3)
            .bind(draft.stock)
            .bind(draft.is_available)
            .bind(draft.min_order)
            .bind(draft.min_order_tb)
            .bind(draft.min_order_luar_tb)
            .bind(&draft.available_days_tb)
            .bind(&draft.available_days_luar_tb)
            .bind(serde_json::Value::from(draft.conditions.clone()))
            .bind(serde_json::Value::from(draft.addons.clone()))
            .bind(draft.qris_id)
            .fetch_optional(&mut *transaction)
            .await?;

        let Some(product) = updated else {
            transaction.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        Self::insert_variants(&mut transaction, id, draft).await?;
        transaction.commit().await?;

        let mut updated = [product];
        self.attach_variants(&mut updated).await?;
        let [product] = updated;
        Ok(Some(product))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, AppError> {
        let mut transaction = self.begin_transaction().await?;
        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let sql = format!(
            "UPDATE products SET is_available = NOT is_available, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match product {
            Some(product) => {
                let mut toggled = [product];
                self.attach_variants(&mut toggled).await?;
                let [product] = toggled;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    async fn list_qris(&self) -> Result<Vec<QrisCode>, AppError> {
        let sql = format!("SELECT {QRIS_COLUMNS} FROM qris_codes ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, QrisCode>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_qris(&self, id: Uuid) -> Result<Option<QrisCode>, AppError> {
        let sql = format!("SELECT {QRIS_COLUMNS} FROM qris_codes WHERE id = $1");
        Ok(sqlx::query_as::<_, QrisCode>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_qris(&self, draft: &QrisDraft) -> Result<QrisCode, AppError> {
        let sql = format!(
            "INSERT INTO qris_codes (id, name, image_url, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, TRUE, NOW(), NOW()) RETURNING {QRIS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, QrisCode>(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.name)
            .bind(&draft.image_url)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_qris(
        &self,
        id: Uuid,
        update: &QrisUpdate,
    ) -> Result<Option<QrisCode>, AppError> {
        let sql = format!(
            "UPDATE qris_codes SET name = COALESCE($2, name), \
             image_url = COALESCE($3, image_url), is_active = COALESCE($4, is_active), \
             updated_at = NOW() WHERE id = $1 RETURNING {QRIS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, QrisCode>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.image_url)
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_qris(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM qris_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_products_using_qris(&self, id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE qris_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl OrderStore for DbOperations {
    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<OrderWithItems, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let sql = format!(
            "INSERT INTO orders (id, order_number, customer_name, customer_email, \
             customer_phone, delivery_address, delivery_location, delivery_date, subtotal, \
             delivery_fee, total, payment_method, payment_status, payment_proof, order_status, \
             delivery_photo, appreciation_message, cancellation_reason, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             '', '', '', NOW(), NOW()) \
             RETURNING {ORDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(Uuid::new_v4())
            .bind(&order.order_number)
            .bind(&order.customer_name)
            .bind(&order.customer_email)
            .bind(&order.customer_phone)
            .bind(&order.delivery_address)
            .bind(&order.delivery_location)
            .bind(order.delivery_date)
            .bind(order.subtotal)
            .bind(order.delivery_fee)
            .bind(order.total)
            .bind(&order.payment_method)
            .bind(&order.payment_status)
            .bind(&order.payment_proof)
            .bind(&order.order_status)
            .fetch_one(&mut *transaction)
            .await?;

        let item_sql = format!(
            "INSERT INTO order_items (id, order_id, product_id, product_name, product_price, \
             product_image, quantity, subtotal, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             RETURNING {ORDER_ITEM_COLUMNS}"
        );
        let mut written = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(&item_sql)
                .bind(Uuid::new_v4())
                .bind(created.id)
                .bind(item.product_id)
                .bind(&item.product_name)
                .bind(item.product_price)
                .bind(&item.product_image)
                .bind(item.quantity)
                .bind(item.subtotal)
                .fetch_one(&mut *transaction)
                .await?;
            written.push(row);
        }

        transaction.commit().await?;
        Ok(OrderWithItems {
            order: created,
            items: written,
        })
    }

    async fn list_orders(&self) -> Result<Vec<OrderWithItems>, AppError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(orders).await
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<OrderWithItems>, AppError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn orders_for_customer(
        &self,
        identifier: &str,
    ) -> Result<Vec<OrderWithItems>, AppError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE customer_phone = $1 OR customer_email = $1 ORDER BY created_at DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(identifier)
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(orders).await
    }

    async fn count_with_status(&self, status: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_status(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<Order>, AppError> {
        let sql = format!(
            "UPDATE orders SET order_status = $2, \
             cancellation_reason = COALESCE($3, cancellation_reason), \
             cancelled_at = COALESCE($4, cancelled_at), \
             delivery_photo = COALESCE($5, delivery_photo), \
             appreciation_message = COALESCE($6, appreciation_message), \
             updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(&change.order_status)
            .bind(&change.cancellation_reason)
            .bind(change.cancelled_at)
            .bind(&change.delivery_photo)
            .bind(&change.appreciation_message)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, AppError> {
        let mut transaction = self.begin_transaction().await?;
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_cancelled(
        &self,
        statuses: &[&'static str],
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let mut transaction = self.begin_transaction().await?;
        sqlx::query(
            "DELETE FROM order_items WHERE order_id IN \
             (SELECT id FROM orders WHERE order_status = ANY($1) AND cancelled_at < $2)",
        )
        .bind(&statuses)
        .bind(cutoff)
        .execute(&mut *transaction)
        .await?;
        let result = sqlx::query(
            "DELETE FROM orders WHERE order_status = ANY($1) AND cancelled_at < $2",
        )
        .bind(&statuses)
        .bind(cutoff)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;

        Ok(result.rows_affected())
    }
}
