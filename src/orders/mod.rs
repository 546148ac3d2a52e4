//! Order placement and the order lifecycle: listing, status changes,
//! customer lookups and retention of cancelled orders.

pub mod handlers;
mod service;
pub mod validation;

pub use service::OrderService;
pub use validation::{OrderRequest, OrderStatus, StatusUpdate};
