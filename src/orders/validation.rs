//! Checks and clean-up applied to order payloads before anything is stored.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{NewOrder, NewOrderItem, StatusChange};
use crate::error::AppError;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_ADDRESS_LENGTH: usize = 500;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("HTML tag pattern");
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email pattern");
    // Indonesian numbers: +62, 62 or 0 followed by 9 to 12 digits.
    static ref PHONE: Regex = Regex::new(r"^(\+62|62|0)[0-9]{9,12}$").expect("phone pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    OnDelivery,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Every spelling a cancelled order may be stored under.
    pub const CANCELLED_ALIASES: [&'static str; 2] = ["cancelled", "dibatalkan"];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnDelivery => "on_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on_delivery" => Ok(OrderStatus::OnDelivery),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" | "dibatalkan" => Ok(OrderStatus::Cancelled),
            _ => Err(AppError::ValidationError("Invalid order status".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderRequest {
    pub order: OrderInput,
    pub items: Vec<ItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderInput {
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
    pub payment_proof: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemInput {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_price: f64,
    pub product_image: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    pub status: String,
    pub cancellation_reason: String,
    pub delivery_photo: String,
    pub appreciation_message: String,
}

fn invalid(reason: &str) -> AppError {
    AppError::ValidationError(format!("Validation error: {}", reason))
}

/// Drops markup and surrounding whitespace from free text.
pub fn sanitize(input: &str) -> String {
    HTML_TAG.replace_all(input, "").trim().to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE.is_match(&digits)
}

/// `ORD-YYYYMMDD-XXXXXX`, the suffix being random upper-case letters and
/// digits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

/// Cleans and checks a checkout payload. The returned order has no number
/// yet; new orders start paid and processing.
pub fn check_order(request: OrderRequest) -> Result<(NewOrder, Vec<NewOrderItem>), AppError> {
    let input = request.order;
    let order = NewOrder {
        order_number: String::new(),
        customer_name: sanitize(&input.customer_name),
        customer_email: sanitize(&input.customer_email),
        customer_phone: sanitize(&input.customer_phone),
        delivery_address: sanitize(&input.delivery_address),
        delivery_location: sanitize(&input.delivery_location),
        delivery_date: input.delivery_date,
        subtotal: input.subtotal,
        delivery_fee: input.delivery_fee,
        total: input.total,
        payment_method: sanitize(&input.payment_method),
        payment_status: "paid".to_string(),
        payment_proof: input.payment_proof.trim().to_string(),
        order_status: OrderStatus::Processing.as_str().to_string(),
    };

    if order.customer_name.is_empty() {
        return Err(invalid("customer name is required"));
    }
    if order.customer_name.chars().count() > MAX_NAME_LENGTH {
        return Err(invalid("customer name is too long"));
    }
    if !is_valid_email(&order.customer_email) {
        return Err(invalid("invalid email format"));
    }
    if !is_valid_phone(&order.customer_phone) {
        return Err(invalid("invalid phone number format"));
    }
    if order.delivery_address.is_empty() {
        return Err(invalid("delivery address is required"));
    }
    if order.delivery_address.chars().count() > MAX_ADDRESS_LENGTH {
        return Err(invalid("delivery address is too long"));
    }
    if order.total <= 0.0 {
        return Err(invalid("invalid order total"));
    }

    if request.items.is_empty() {
        return Err(AppError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }

    let items = request
        .items
        .into_iter()
        .map(|item| {
            let product_name = sanitize(&item.product_name);
            if product_name.is_empty() {
                return Err(invalid("item name is required"));
            }
            if item.quantity < 1 {
                return Err(invalid("item quantity must be at least 1"));
            }
            if item.product_price < 0.0 {
                return Err(invalid("item price cannot be negative"));
            }
            Ok(NewOrderItem {
                product_id: item.product_id,
                product_name,
                product_price: item.product_price,
                product_image: item.product_image.trim().to_string(),
                quantity: item.quantity,
                subtotal: item.product_price * item.quantity as f64,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((order, items))
}

/// Turns a status request into the columns to write.
pub fn status_change(update: StatusUpdate, now: DateTime<Utc>) -> Result<StatusChange, AppError> {
    let status: OrderStatus = update.status.parse()?;
    let mut change = StatusChange {
        order_status: status.as_str().to_string(),
        ..Default::default()
    };

    match status {
        OrderStatus::Cancelled => {
            let reason = sanitize(&update.cancellation_reason);
            if reason.is_empty() {
                return Err(AppError::ValidationError(
                    "Cancellation reason is required".to_string(),
                ));
            }
            change.cancellation_reason = Some(reason);
            change.cancelled_at = Some(now);
        }
        OrderStatus::Completed => {
            let photo = update.delivery_photo.trim();
            if !photo.is_empty() {
                change.delivery_photo = Some(photo.to_string());
            }
            let message = sanitize(&update.appreciation_message);
            if !message.is_empty() {
                change.appreciation_message = Some(message);
            }
        }
        _ => {}
    }

    Ok(change)
}
