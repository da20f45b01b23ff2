//! Yatube: a server-rendered social blogging site.
//!
//! Users publish posts, file them under groups, comment on them and follow
//! other authors. The index listing is served through a time-bounded page
//! cache that data mutations never invalidate.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
