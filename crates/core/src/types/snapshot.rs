//! The durable image of the catalog store.

use serde::{Deserialize, Serialize};

use super::product::Product;
use super::user::User;

/// Full store state as written to the snapshot file.
///
/// Missing collections load as empty and a missing flag loads as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub has_started: bool,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Snapshot {
    /// Drop every product and clear the bootstrap flag. Users are kept.
    ///
    /// Returns the number of products removed.
    pub fn empty_catalog(&mut self) -> usize {
        let removed = self.products.len();
        self.products.clear();
        self.has_started = false;
        removed
    }
}
