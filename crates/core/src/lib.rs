//! Stockroom Core - Shared types library.
//!
//! This crate provides the domain types used across all Stockroom components:
//! - `server` - Catalog store, authentication and the HTTP API
//! - `cli` - Operator tooling over the snapshot file
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no persistence. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, products, users, filters and the snapshot image

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
