//! # vellum_core
//!
//! Core domain logic for Vellum: typed document models over a pluggable
//! document store, JWT issuance and verification, and the OAuth
//! authorization-code exchange.

pub mod auth;
pub mod config;
pub mod documents;
pub mod id;
pub mod migrate;
pub mod models;
pub mod oauth;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
