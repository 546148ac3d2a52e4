//! Database module for the pre-order server
//!
//! Row models plus the repository traits the services depend on, all
//! implemented over one PostgreSQL pool by [`DbOperations`].

pub mod models;
pub mod operations;

pub use models::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, Product, ProductDraft,
    ProductVariant, QrisCode, QrisDraft, QrisUpdate, StatusChange, User, VariantDraft,
};
pub use operations::{CatalogStore, DbOperations, OrderStore, UserDirectory};
