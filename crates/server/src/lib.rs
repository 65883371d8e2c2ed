//! Stockroom server library.
//!
//! The embedded catalog store, the bearer-token gateway and the HTTP routes,
//! exposed as a library so the binary, the CLI and the integration tests
//! share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
