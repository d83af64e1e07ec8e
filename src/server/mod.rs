//! HTTP server exposing a cascade of JSON documents.
//!
//! - [`document`]: the item type served over HTTP
//! - [`api`]: routes, query options and handlers

pub mod api;
pub mod document;
