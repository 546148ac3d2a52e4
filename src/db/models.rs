use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_ROLE: &str = "customer";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            phone: String::new(),
            role: DEFAULT_ROLE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub tag: String,
    pub tag_color: String,
    pub image_url_1: String,
    pub image_url_2: String,
    pub image_url_3: String,
    pub stock: i64,
    pub is_available: bool,
    pub min_order: i64,
    pub min_order_tb: i64,
    pub min_order_luar_tb: i64,
    pub available_days_tb: Vec<String>,
    pub available_days_luar_tb: Vec<String>,
    pub conditions: serde_json::Value,
    pub addons: serde_json::Value,
    pub qris_id: Option<Uuid>,
    #[sqlx(skip)]
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields as submitted by the admin dashboard, for both create and
/// full update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProductDraft {
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub tag: String,
    pub tag_color: String,
    pub image_url_1: String,
    pub image_url_2: String,
    pub image_url_3: String,
    pub stock: i64,
    /// `None` keeps the current availability on update.
    pub is_available: Option<bool>,
    pub min_order: i64,
    pub min_order_tb: i64,
    pub min_order_luar_tb: i64,
    pub available_days_tb: Vec<String>,
    pub available_days_luar_tb: Vec<String>,
    pub conditions: Vec<serde_json::Value>,
    pub addons: Vec<serde_json::Value>,
    pub qris_id: Option<Uuid>,
    pub variants: Vec<VariantDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VariantDraft {
    pub name: String,
    pub price: f64,
    pub stock: i64,
    pub is_available: Option<bool>,
}

/// Payment QR code image that products can point customers to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QrisCode {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrisDraft {
    pub name: String,
    pub image_url: String,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrisUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub delivery_location: String,
    pub delivery_date: Option<NaiveDate>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_proof: String,
    pub order_status: String,
    pub delivery_photo: String,
    pub appreciation_message: String,
    pub cancellation_reason: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_price: f64,
    pub product_image: String,
    pub quantity: i64,
    pub subtotal: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Checked, normalised order ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub delivery_location: String,
    pub delivery_date: Option<NaiveDate>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_proof: String,
    pub order_status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_price: f64,
    pub product_image: String,
    pub quantity: i64,
    pub subtotal: f64,
}

/// Column changes that go with an order status transition. `None` leaves a
/// column as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusChange {
    pub order_status: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub delivery_photo: Option<String>,
    pub appreciation_message: Option<String>,
}
