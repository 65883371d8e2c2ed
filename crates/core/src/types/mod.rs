//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for the catalog domain.

pub mod filter;
pub mod id;
pub mod product;
pub mod snapshot;
pub mod user;
pub mod username;

pub use filter::{FilterDefaults, FilterError, ProductFilter, ResolvedFilter};
pub use id::*;
pub use product::{Product, ProductDraft, ProductError};
pub use snapshot::Snapshot;
pub use user::{PublicUser, User};
pub use username::{Username, UsernameError};
