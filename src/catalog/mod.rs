//! Product catalog: products with their variants, and the QRIS payment
//! codes products can be linked to.

pub mod handlers;
mod service;

pub use service::{CatalogService, DEFAULT_STOCK};
