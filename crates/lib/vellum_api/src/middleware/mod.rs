//! Request middleware and auth extractors.

pub mod auth;
