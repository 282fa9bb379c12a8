//! SeaORM entities for the persistent user store.

pub mod auth_provider;
pub mod user;
