//! Application services: listings, authoring, accounts and subscriptions.

pub mod auth;
pub mod error;
pub mod follows;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod repos;
